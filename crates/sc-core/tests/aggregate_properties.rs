//! Property-based tests for the capability fold.

use proptest::prelude::*;
use sc_core::aggregate::{CapabilityFold, FoldOp, GlobalContext, RULES};
use sc_core::probe::udf::{UdfCapabilitySnapshot, UdfExtension};
use sc_core::snapshot::{EngineKind, NodeCapabilitySnapshot};

const VERSIONS: [&str; 6] = [
    "5.5.62-log",
    "5.6.10",
    "5.7.44",
    "8.0.32",
    "8.0.3-X-Cluster",
    "10.4.1-MariaDB",
];

const FUNCTIONS: [&str; 3] = ["bloomfilter", "hyperloglog", "hashcheck"];

fn udf_strategy() -> impl Strategy<Value = UdfExtension> {
    prop_oneof![
        Just(UdfExtension::Absent),
        (
            0i32..3,
            0i32..3,
            prop::bool::ANY,
            prop::collection::vec(prop::bool::ANY, FUNCTIONS.len()),
        )
            .prop_map(|(major, minor, active, mask)| {
                UdfExtension::Present(UdfCapabilitySnapshot {
                    major_version: major,
                    minor_version: minor,
                    status: if active { "ACTIVE" } else { "DISABLED" }.to_string(),
                    registered_functions: FUNCTIONS
                        .iter()
                        .zip(mask)
                        .filter(|(_, on)| *on)
                        .map(|(f, _)| f.to_string())
                        .collect(),
                })
            }),
    ]
}

fn snapshot_strategy() -> impl Strategy<Value = NodeCapabilitySnapshot> {
    (
        prop::sample::select(VERSIONS.to_vec()),
        prop::bool::ANY,
        prop::collection::vec(prop::bool::ANY, 10),
        0i32..3,
        udf_strategy(),
    )
        .prop_map(|(version, xengine, flags, lower, udf)| {
            NodeCapabilitySnapshot::builder(version)
                .engine_kind(if xengine {
                    EngineKind::XEngine
                } else {
                    EngineKind::Generic
                })
                .global_timestamp(flags[0])
                .global_timestamp_heartbeat(flags[1])
                .commit_timestamp_tx(flags[2])
                .shared_read_view(flags[3])
                .open_ssl(flags[4])
                .performance_schema(flags[5])
                .metadata_lock_select_privilege(flags[6])
                .metadata_lock_instrumentation(flags[7])
                .returning(flags[8])
                .lower_case_table_name_mode(lower)
                .udf(udf)
                .build()
        })
}

fn context_strategy() -> impl Strategy<Value = GlobalContext> {
    (prop::bool::ANY, prop::bool::ANY).prop_map(|(read_only, metadata_extended_protocol)| {
        GlobalContext {
            read_only,
            metadata_extended_protocol,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_fold_matches_per_rule_reduction(nodes in prop::collection::vec(snapshot_strategy(), 0..8)) {
        let fold: CapabilityFold = nodes.iter().collect();
        for rule in RULES.iter() {
            let expected = match rule.fold {
                FoldOp::All => nodes.iter().all(|n| (rule.predicate)(n)),
                FoldOp::Any => nodes.iter().any(|n| (rule.predicate)(n)),
            };
            prop_assert_eq!(fold.raw(rule.capability), expected, "{}", rule.capability);
        }
        prop_assert_eq!(fold.node_count(), nodes.len());
    }

    #[test]
    fn test_fold_ignores_order(
        nodes in prop::collection::vec(snapshot_strategy(), 0..8),
        ctx in context_strategy(),
    ) {
        let forward: CapabilityFold = nodes.iter().collect();
        let backward: CapabilityFold = nodes.iter().rev().collect();
        prop_assert_eq!(forward.finish(&ctx), backward.finish(&ctx));
    }

    #[test]
    fn test_merge_equals_single_fold(
        nodes in prop::collection::vec(snapshot_strategy(), 0..8),
        split in 0usize..8,
    ) {
        let split = split.min(nodes.len());
        let whole: CapabilityFold = nodes.iter().collect();
        let mut left: CapabilityFold = nodes[..split].iter().collect();
        let right: CapabilityFold = nodes[split..].iter().collect();
        left.merge(&right);
        prop_assert_eq!(left, whole);
    }

    #[test]
    fn test_read_only_disables_distributed_tx(nodes in prop::collection::vec(snapshot_strategy(), 0..8)) {
        let fold: CapabilityFold = nodes.iter().collect();
        let caps = fold.finish(&GlobalContext { read_only: true, metadata_extended_protocol: false });
        prop_assert!(caps.read_only);
        prop_assert!(!caps.supports_distributed_tx);
    }

    #[test]
    fn test_legacy_member_disables_distributed_tx(
        nodes in prop::collection::vec(snapshot_strategy(), 1..8),
        ctx in context_strategy(),
    ) {
        let fold: CapabilityFold = nodes.iter().collect();
        let caps = fold.finish(&ctx);
        if caps.legacy_version {
            prop_assert!(!caps.supports_distributed_tx);
        }
    }

    #[test]
    fn test_heartbeat_needs_extended_metadata(nodes in prop::collection::vec(snapshot_strategy(), 0..8)) {
        let fold: CapabilityFold = nodes.iter().collect();
        let caps = fold.finish(&GlobalContext::default());
        prop_assert!(!caps.supports_global_timestamp_heartbeat);
    }

    #[test]
    fn test_adding_a_node_never_enables_and_flags(
        nodes in prop::collection::vec(snapshot_strategy(), 0..6),
        extra in snapshot_strategy(),
        ctx in context_strategy(),
    ) {
        let before = nodes.iter().collect::<CapabilityFold>().finish(&ctx);
        let after = nodes.iter().chain(std::iter::once(&extra)).collect::<CapabilityFold>().finish(&ctx);
        for rule in RULES.iter().filter(|r| r.fold == FoldOp::All && r.capability.is_public()) {
            let was = before.get(rule.capability).unwrap_or(false);
            let now = after.get(rule.capability).unwrap_or(false);
            prop_assert!(was || !now, "{} enabled by adding a node", rule.capability);
        }
    }

    #[test]
    fn test_lower_case_ignores_gates(
        nodes in prop::collection::vec(snapshot_strategy(), 0..8),
        ctx in context_strategy(),
    ) {
        let caps = nodes.iter().collect::<CapabilityFold>().finish(&ctx);
        let expected = nodes.iter().all(|n| n.lower_case_table_name_mode() != 0);
        prop_assert_eq!(caps.lower_case_table_names, expected);
    }
}

#[test]
fn test_empty_topology_is_fold_identity() {
    let caps = CapabilityFold::new().finish(&GlobalContext::default());
    assert!(caps.supports_distributed_tx);
    assert!(caps.supports_commit_timestamp_tx);
    assert!(caps.supports_global_timestamp);
    assert!(caps.lower_case_table_names);
    assert!(!caps.legacy_version);
    assert!(!caps.read_only);
}
