//! Fuzz target for topology transcript parsing in all three formats.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sc_core::topology::TopologyProvider;
use sc_core::transcript::{TranscriptFormat, TranscriptTopology};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    for format in [
        TranscriptFormat::Toml,
        TranscriptFormat::Yaml,
        TranscriptFormat::Json,
    ] {
        if let Ok(topology) = TranscriptTopology::parse(s, format) {
            let nodes = topology.nodes().unwrap_or_default();
            assert_eq!(nodes.len(), topology.len());
        }
    }
});
