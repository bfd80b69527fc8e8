//! Criterion benchmarks for the capability fold.
//!
//! Snapshots are built in memory so the numbers cover only the rule table
//! walk and the override pass.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sc_core::aggregate::{CapabilityFold, GlobalContext};
use sc_core::probe::udf::{UdfCapabilitySnapshot, UdfExtension};
use sc_core::snapshot::NodeCapabilitySnapshot;

fn cluster(size: usize) -> Vec<NodeCapabilitySnapshot> {
    (0..size)
        .map(|i| {
            let version = if i % 7 == 0 { "5.7.44" } else { "8.0.32" };
            NodeCapabilitySnapshot::builder(version)
                .global_timestamp(true)
                .global_timestamp_heartbeat(i % 3 != 0)
                .commit_timestamp_tx(true)
                .open_ssl(true)
                .performance_schema(true)
                .metadata_lock_select_privilege(true)
                .metadata_lock_instrumentation(i % 5 != 0)
                .lower_case_table_name_mode(1)
                .udf(UdfExtension::Present(UdfCapabilitySnapshot {
                    major_version: 1,
                    minor_version: 1,
                    status: "ACTIVE".to_string(),
                    registered_functions: ["bloomfilter", "hyperloglog"]
                        .iter()
                        .map(|f| f.to_string())
                        .collect(),
                }))
                .build()
        })
        .collect()
}

fn bench_fold(c: &mut Criterion) {
    let ctx = GlobalContext {
        read_only: false,
        metadata_extended_protocol: true,
    };
    let mut group = c.benchmark_group("capability_fold");

    for size in [1usize, 16, 256] {
        let nodes = cluster(size);
        group.bench_with_input(BenchmarkId::new("fold_finish", size), &nodes, |b, nodes| {
            b.iter(|| {
                let fold: CapabilityFold = black_box(nodes).iter().collect();
                black_box(fold.finish(&ctx));
            });
        });
    }

    let nodes = cluster(256);
    let (left, right) = nodes.split_at(128);
    group.bench_function("merge_halves/256", |b| {
        b.iter(|| {
            let mut fold: CapabilityFold = black_box(left).iter().collect();
            let other: CapabilityFold = black_box(right).iter().collect();
            fold.merge(&other);
            black_box(fold.finish(&ctx));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fold);
criterion_main!(benches);
