//! The generic capability fold.
//!
//! Every rule is AND or OR, so partial folds over disjoint node sets can be
//! merged in any order and grouping.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::rules::{Capability, GlobalContext, RULES};
use crate::snapshot::NodeCapabilitySnapshot;

/// Cluster-wide capability flags. All `false` until the first pass publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClusterCapabilities {
    pub supports_distributed_tx: bool,
    pub supports_global_timestamp: bool,
    pub supports_global_timestamp_heartbeat: bool,
    pub supports_commit_timestamp_tx: bool,
    pub supports_deadlock_detection: bool,
    pub supports_mdl_deadlock_detection: bool,
    pub supports_bloom_filter: bool,
    pub supports_hyper_log_log: bool,
    pub supports_fast_checksum: bool,
    pub supports_open_ssl: bool,
    pub supports_shared_read_view: bool,
    pub supports_returning: bool,
    pub legacy_version: bool,
    pub read_only: bool,
    pub lower_case_table_names: bool,
}

impl ClusterCapabilities {
    /// Published value of a node-derived capability. `None` for internal rows.
    pub fn get(&self, capability: Capability) -> Option<bool> {
        Some(match capability {
            Capability::DistributedTx => self.supports_distributed_tx,
            Capability::GlobalTimestamp => self.supports_global_timestamp,
            Capability::GlobalTimestampHeartbeat => self.supports_global_timestamp_heartbeat,
            Capability::CommitTimestampTx => self.supports_commit_timestamp_tx,
            Capability::DeadlockDetection => self.supports_deadlock_detection,
            Capability::MdlDeadlockDetection => self.supports_mdl_deadlock_detection,
            Capability::BloomFilter => self.supports_bloom_filter,
            Capability::HyperLogLog => self.supports_hyper_log_log,
            Capability::FastChecksum => self.supports_fast_checksum,
            Capability::OpenSsl => self.supports_open_ssl,
            Capability::SharedReadView => self.supports_shared_read_view,
            Capability::Returning => self.supports_returning,
            Capability::LowerCaseTableNames => self.lower_case_table_names,
            Capability::LegacyVersion => self.legacy_version,
            Capability::TargetVersionLine => return None,
        })
    }

    fn set(&mut self, capability: Capability, value: bool) {
        let slot = match capability {
            Capability::DistributedTx => &mut self.supports_distributed_tx,
            Capability::GlobalTimestamp => &mut self.supports_global_timestamp,
            Capability::GlobalTimestampHeartbeat => &mut self.supports_global_timestamp_heartbeat,
            Capability::CommitTimestampTx => &mut self.supports_commit_timestamp_tx,
            Capability::DeadlockDetection => &mut self.supports_deadlock_detection,
            Capability::MdlDeadlockDetection => &mut self.supports_mdl_deadlock_detection,
            Capability::BloomFilter => &mut self.supports_bloom_filter,
            Capability::HyperLogLog => &mut self.supports_hyper_log_log,
            Capability::FastChecksum => &mut self.supports_fast_checksum,
            Capability::OpenSsl => &mut self.supports_open_ssl,
            Capability::SharedReadView => &mut self.supports_shared_read_view,
            Capability::Returning => &mut self.supports_returning,
            Capability::LowerCaseTableNames => &mut self.lower_case_table_names,
            Capability::LegacyVersion => &mut self.legacy_version,
            Capability::TargetVersionLine => return,
        };
        *slot = value;
    }

    /// Flag name and value pairs in rule order, followed by `read_only`.
    pub fn flags(&self) -> Vec<(&'static str, bool)> {
        let mut flags: Vec<_> = RULES
            .iter()
            .filter_map(|rule| {
                self.get(rule.capability)
                    .map(|value| (rule.capability.name(), value))
            })
            .collect();
        flags.push(("read_only", self.read_only));
        flags
    }
}

/// Running fold over node snapshots, before overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityFold {
    values: [bool; Capability::COUNT],
    nodes: usize,
}

impl Default for CapabilityFold {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityFold {
    pub fn new() -> Self {
        let mut values = [false; Capability::COUNT];
        for rule in RULES.iter() {
            values[rule.capability.index()] = rule.fold.identity();
        }
        CapabilityFold { values, nodes: 0 }
    }

    pub fn absorb(&mut self, node: &NodeCapabilitySnapshot) {
        for rule in RULES.iter() {
            let idx = rule.capability.index();
            self.values[idx] = rule.fold.apply(self.values[idx], (rule.predicate)(node));
        }
        self.nodes += 1;
    }

    /// `None` is a skipped node and leaves the fold unchanged.
    pub fn absorb_optional(&mut self, node: Option<&NodeCapabilitySnapshot>) {
        if let Some(node) = node {
            self.absorb(node);
        }
    }

    pub fn merge(&mut self, other: &CapabilityFold) {
        for rule in RULES.iter() {
            let idx = rule.capability.index();
            self.values[idx] = rule.fold.apply(self.values[idx], other.values[idx]);
        }
        self.nodes += other.nodes;
    }

    /// Folded value before overrides.
    pub fn raw(&self, capability: Capability) -> bool {
        self.values[capability.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes
    }

    pub fn finish(&self, ctx: &GlobalContext) -> ClusterCapabilities {
        let target_line = self.raw(Capability::TargetVersionLine);
        let mut caps = ClusterCapabilities {
            read_only: ctx.read_only,
            ..ClusterCapabilities::default()
        };
        for rule in RULES.iter() {
            let value = rule
                .overrides
                .apply(self.raw(rule.capability), ctx, target_line);
            caps.set(rule.capability, value);
        }
        caps
    }
}

impl<'a> FromIterator<&'a NodeCapabilitySnapshot> for CapabilityFold {
    fn from_iter<I: IntoIterator<Item = &'a NodeCapabilitySnapshot>>(iter: I) -> Self {
        let mut fold = CapabilityFold::new();
        for node in iter {
            fold.absorb(node);
        }
        fold
    }
}
