//! JSON Schema generation for sc-core output and input types.
//!
//! ```bash
//! sc-core schema --list
//! sc-core schema ProbeReport
//! sc-core schema --all
//! ```

use schemars::schema_for;
use serde_json::Value;
use std::collections::BTreeMap;

pub use crate::aggregate::rules::RuleDescription;
pub use crate::aggregate::ClusterCapabilities;
pub use crate::probe::udf::UdfExtension;
pub use crate::report::{NodeReport, ProbeReport};
pub use crate::snapshot::NodeCapabilityReport;
pub use crate::transcript::TranscriptFile;
pub use sc_common::{NodeName, PassId};
pub use sc_config::{CapabilityConfig, ConfigSnapshot};

/// Schema types with their descriptions.
pub fn available_schemas() -> Vec<(&'static str, &'static str)> {
    vec![
        ("NodeName", "Backend storage node name"),
        ("PassId", "Aggregation pass identifier"),
        ("ClusterCapabilities", "Cluster-wide capability flags"),
        (
            "NodeCapabilityReport",
            "Raw and derived capability values for one node",
        ),
        ("UdfExtension", "UDF extension state on one node"),
        ("NodeReport", "Named node capability report"),
        ("ProbeReport", "Output of 'sc-core probe'"),
        ("RuleDescription", "One row of the fold rule table"),
        ("CapabilityConfig", "Contents of capabilities.{toml,json}"),
        ("ConfigSnapshot", "Provenance of the loaded configuration"),
        ("TranscriptFile", "Offline topology file"),
    ]
}

/// Schema for a type by name, or `None` if the name is unknown.
pub fn generate_schema(type_name: &str) -> Option<Value> {
    let schema = match type_name {
        "NodeName" => schema_for!(NodeName),
        "PassId" => schema_for!(PassId),
        "ClusterCapabilities" => schema_for!(ClusterCapabilities),
        "NodeCapabilityReport" => schema_for!(NodeCapabilityReport),
        "UdfExtension" => schema_for!(UdfExtension),
        "NodeReport" => schema_for!(NodeReport),
        "ProbeReport" => schema_for!(ProbeReport),
        "RuleDescription" => schema_for!(RuleDescription),
        "CapabilityConfig" => schema_for!(CapabilityConfig),
        "ConfigSnapshot" => schema_for!(ConfigSnapshot),
        "TranscriptFile" => schema_for!(TranscriptFile),
        _ => return None,
    };
    serde_json::to_value(schema).ok()
}

pub fn generate_all_schemas() -> BTreeMap<String, Value> {
    available_schemas()
        .into_iter()
        .filter_map(|(name, _)| generate_schema(name).map(|s| (name.to_string(), s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_schemas_generate() {
        for (name, _desc) in available_schemas() {
            assert!(generate_schema(name).is_some(), "schema for '{}'", name);
        }
    }

    #[test]
    fn test_unknown_schema_returns_none() {
        assert!(generate_schema("Plan").is_none());
        assert!(generate_schema("").is_none());
    }

    #[test]
    fn test_cluster_schema_lists_flags() {
        let schema = generate_schema("ClusterCapabilities").unwrap();
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("supports_distributed_tx"));
        assert!(props.contains_key("lower_case_table_names"));
        assert_eq!(props.len(), 15);
    }

    #[test]
    fn test_generate_all() {
        let all = generate_all_schemas();
        assert_eq!(all.len(), available_schemas().len());
        assert!(all.contains_key("ProbeReport"));
    }
}
