//! Renderable reports for the CLI.
//!
//! A [`ProbeReport`] is assembled from a manager after a pass and rendered in
//! any [`OutputFormat`]. The JSON form is the stable contract; the Markdown
//! and summary forms are for people.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::aggregate::rules::RuleDescription;
use crate::aggregate::{CapabilityError, ClusterCapabilities};
use crate::manager::StorageCapabilityManager;
use crate::snapshot::{NodeCapabilityReport, NodeCapabilitySnapshot};
use sc_common::{NodeName, OutputFormat, PassId, SCHEMA_VERSION};
use sc_config::ConfigSnapshot;

/// Capability report for one named node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeReport {
    pub name: NodeName,
    #[serde(flatten)]
    pub capabilities: NodeCapabilityReport,
}

impl NodeReport {
    pub fn new(name: NodeName, snapshot: &NodeCapabilitySnapshot) -> Self {
        NodeReport {
            name,
            capabilities: snapshot.to_report(),
        }
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => to_json(self),
            OutputFormat::Summary => format!(
                "{}: version={} engine={} legacy={} distributed_tx={}",
                self.name,
                self.capabilities.version,
                engine_label(self),
                yes_no(self.capabilities.legacy_version),
                yes_no(self.capabilities.supports_distributed_tx),
            ),
            OutputFormat::Md => {
                let mut out = String::new();
                let _ = writeln!(out, "# Node {}", self.name);
                let _ = writeln!(out);
                let _ = writeln!(out, "Version: {}", self.capabilities.version);
                let _ = writeln!(out, "Engine: {}", engine_label(self));
                let _ = writeln!(
                    out,
                    "lower_case_table_names: {}",
                    self.capabilities.lower_case_table_name_mode
                );
                let _ = writeln!(out);
                flag_table(&mut out, &node_flags(&self.capabilities));
                out
            }
        }
    }
}

/// Output of a full pass.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProbeReport {
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_id: Option<PassId>,
    pub generated_at: DateTime<Utc>,
    pub capabilities: ClusterCapabilities,
    pub nodes: Vec<NodeReport>,
    /// Non-SQL nodes that did not take part in the fold.
    pub skipped: Vec<NodeName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSnapshot>,
}

impl ProbeReport {
    /// Collect the published state of `manager`, running the first pass if
    /// it has not run yet.
    pub fn collect(manager: &StorageCapabilityManager) -> Result<Self, CapabilityError> {
        let capabilities = manager.capabilities()?;
        let nodes = manager
            .node_snapshots()
            .into_iter()
            .map(|(name, snapshot)| NodeReport::new(name, &snapshot))
            .collect();
        Ok(ProbeReport {
            schema_version: SCHEMA_VERSION.to_string(),
            pass_id: manager.last_pass_id(),
            generated_at: Utc::now(),
            capabilities: *capabilities,
            nodes,
            skipped: manager.skipped_nodes().to_vec(),
            config: None,
        })
    }

    pub fn with_config(mut self, snapshot: ConfigSnapshot) -> Self {
        self.config = Some(snapshot);
        self
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => to_json(self),
            OutputFormat::Summary => self.summary_line(),
            OutputFormat::Md => self.markdown(),
        }
    }

    fn pass_label(&self) -> String {
        self.pass_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    fn summary_line(&self) -> String {
        let enabled: Vec<&str> = self
            .capabilities
            .flags()
            .into_iter()
            .filter(|(_, value)| *value)
            .map(|(name, _)| name)
            .collect();
        format!(
            "[{}] probe: {} nodes, {} skipped; enabled: {}",
            self.pass_label(),
            self.nodes.len(),
            self.skipped.len(),
            if enabled.is_empty() {
                "none".to_string()
            } else {
                enabled.join(",")
            }
        )
    }

    fn markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# sc-core probe");
        let _ = writeln!(out);
        let _ = writeln!(out, "Pass: {}", self.pass_label());
        let _ = writeln!(out, "Nodes: {}", self.nodes.len());
        if !self.skipped.is_empty() {
            let skipped: Vec<&str> = self.skipped.iter().map(NodeName::as_str).collect();
            let _ = writeln!(out, "Skipped: {}", skipped.join(", "));
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "## Cluster");
        let _ = writeln!(out);
        flag_table(&mut out, &self.capabilities.flags());

        if !self.nodes.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Nodes");
            let _ = writeln!(out);
            let _ = writeln!(out, "| Node | Version | Engine | Legacy | Distributed TX |");
            let _ = writeln!(out, "|---|---|---|---|---|");
            for node in &self.nodes {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} |",
                    node.name,
                    node.capabilities.version,
                    engine_label(node),
                    yes_no(node.capabilities.legacy_version),
                    yes_no(node.capabilities.supports_distributed_tx),
                );
            }
        }
        if let Some(config) = &self.config {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Config: {} ({})",
                config.config_path.as_deref().unwrap_or("built-in defaults"),
                config.config_source
            );
        }
        out
    }
}

/// Render the fold rule table.
pub fn render_rules(rules: &[RuleDescription], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(&rules),
        OutputFormat::Summary => {
            let published = rules.iter().filter(|r| r.published).count();
            format!("{} rules, {} published", rules.len(), published)
        }
        OutputFormat::Md => {
            let mut out = String::new();
            let _ = writeln!(out, "| Capability | Node condition | Fold | Override | Published |");
            let _ = writeln!(out, "|---|---|---|---|---|");
            for rule in rules {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} |",
                    rule.capability,
                    rule.node_condition,
                    match rule.fold {
                        crate::aggregate::FoldOp::All => "AND",
                        crate::aggregate::FoldOp::Any => "OR",
                    },
                    rule.overrides.describe(),
                    yes_no(rule.published),
                );
            }
            out
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn engine_label(node: &NodeReport) -> &'static str {
    match node.capabilities.engine_kind {
        crate::snapshot::EngineKind::Generic => "generic",
        crate::snapshot::EngineKind::XEngine => "xengine",
    }
}

fn flag_table(out: &mut String, flags: &[(&str, bool)]) {
    let _ = writeln!(out, "| Capability | Supported |");
    let _ = writeln!(out, "|---|---|");
    for (name, value) in flags {
        let _ = writeln!(out, "| {} | {} |", name, yes_no(*value));
    }
}

fn node_flags(report: &NodeCapabilityReport) -> Vec<(&'static str, bool)> {
    vec![
        ("supports_distributed_tx", report.supports_distributed_tx),
        ("supports_global_timestamp", report.supports_global_timestamp),
        (
            "supports_global_timestamp_heartbeat",
            report.supports_global_timestamp_heartbeat,
        ),
        ("supports_commit_timestamp_tx", report.supports_commit_timestamp_tx),
        ("supports_shared_read_view", report.supports_shared_read_view),
        ("supports_open_ssl", report.supports_open_ssl),
        ("supports_performance_schema", report.supports_performance_schema),
        (
            "has_metadata_lock_select_privilege",
            report.has_metadata_lock_select_privilege,
        ),
        (
            "metadata_lock_instrumentation_enabled",
            report.metadata_lock_instrumentation_enabled,
        ),
        ("supports_deadlock_detection", report.supports_deadlock_detection),
        ("supports_mdl_deadlock_detection", report.supports_mdl_deadlock_detection),
        ("supports_returning", report.supports_returning),
        ("supports_bloom_filter", report.supports_bloom_filter),
        ("supports_hyper_log_log", report.supports_hyper_log_log),
        ("supports_fast_checksum", report.supports_fast_checksum),
        ("legacy_version", report.legacy_version),
    ]
}
