//! Per-capability fold rules.
//!
//! Each cluster flag is one row: a per-node predicate, a fold operator, and
//! an optional deployment-wide override applied after the fold.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::snapshot::{NodeCapabilitySnapshot, TIMESTAMP_VERSION_LINE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    DistributedTx,
    GlobalTimestamp,
    GlobalTimestampHeartbeat,
    CommitTimestampTx,
    DeadlockDetection,
    MdlDeadlockDetection,
    BloomFilter,
    HyperLogLog,
    FastChecksum,
    OpenSsl,
    SharedReadView,
    Returning,
    LowerCaseTableNames,
    LegacyVersion,
    /// Every node is on the timestamp version line. Feeds the global
    /// timestamp override and is never published.
    TargetVersionLine,
}

impl Capability {
    pub const COUNT: usize = 15;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::DistributedTx => "distributed_tx",
            Capability::GlobalTimestamp => "global_timestamp",
            Capability::GlobalTimestampHeartbeat => "global_timestamp_heartbeat",
            Capability::CommitTimestampTx => "commit_timestamp_tx",
            Capability::DeadlockDetection => "deadlock_detection",
            Capability::MdlDeadlockDetection => "mdl_deadlock_detection",
            Capability::BloomFilter => "bloom_filter",
            Capability::HyperLogLog => "hyper_log_log",
            Capability::FastChecksum => "fast_checksum",
            Capability::OpenSsl => "open_ssl",
            Capability::SharedReadView => "shared_read_view",
            Capability::Returning => "returning",
            Capability::LowerCaseTableNames => "lower_case_table_names",
            Capability::LegacyVersion => "legacy_version",
            Capability::TargetVersionLine => "target_version_line",
        }
    }

    /// Published in `ClusterCapabilities`.
    pub fn is_public(self) -> bool {
        self != Capability::TargetVersionLine
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FoldOp {
    /// Logical AND, identity `true`.
    All,
    /// Logical OR, identity `false`.
    Any,
}

impl FoldOp {
    pub fn identity(self) -> bool {
        match self {
            FoldOp::All => true,
            FoldOp::Any => false,
        }
    }

    pub fn apply(self, acc: bool, value: bool) -> bool {
        match self {
            FoldOp::All => acc && value,
            FoldOp::Any => acc || value,
        }
    }
}

impl std::fmt::Display for FoldOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FoldOp::All => write!(f, "all"),
            FoldOp::Any => write!(f, "any"),
        }
    }
}

/// Deployment-wide facts consulted after folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalContext {
    pub read_only: bool,
    pub metadata_extended_protocol: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Override {
    None,
    /// `∧ ¬read_only`
    NotReadOnly,
    /// `∧ metadata_extended_protocol`
    ExtendedProtocol,
    /// `∧ (metadata_extended_protocol ∨ target_version_line)`
    ExtendedProtocolOrTargetLine,
}

impl Override {
    pub fn apply(self, folded: bool, ctx: &GlobalContext, target_version_line: bool) -> bool {
        match self {
            Override::None => folded,
            Override::NotReadOnly => folded && !ctx.read_only,
            Override::ExtendedProtocol => folded && ctx.metadata_extended_protocol,
            Override::ExtendedProtocolOrTargetLine => {
                folded && (ctx.metadata_extended_protocol || target_version_line)
            }
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Override::None => "-",
            Override::NotReadOnly => "and not read_only",
            Override::ExtendedProtocol => "and metadata extended protocol",
            Override::ExtendedProtocolOrTargetLine => {
                "and (metadata extended protocol or every node on 8.0)"
            }
        }
    }
}

pub type NodePredicate = fn(&NodeCapabilitySnapshot) -> bool;

#[derive(Clone, Copy)]
pub struct Rule {
    pub capability: Capability,
    pub predicate: NodePredicate,
    pub fold: FoldOp,
    pub overrides: Override,
    pub node_condition: &'static str,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("capability", &self.capability)
            .field("fold", &self.fold)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// Printable form of a [`Rule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleDescription {
    pub capability: Capability,
    pub node_condition: String,
    pub fold: FoldOp,
    pub overrides: Override,
    pub published: bool,
}

impl Rule {
    pub fn describe(&self) -> RuleDescription {
        RuleDescription {
            capability: self.capability,
            node_condition: self.node_condition.to_string(),
            fold: self.fold,
            overrides: self.overrides,
            published: self.capability.is_public(),
        }
    }
}

fn on_timestamp_version_line(node: &NodeCapabilitySnapshot) -> bool {
    node.on_version_line(TIMESTAMP_VERSION_LINE)
}

/// One row per [`Capability`], in declaration order.
pub const RULES: [Rule; Capability::COUNT] = [
    Rule {
        capability: Capability::DistributedTx,
        predicate: NodeCapabilitySnapshot::supports_distributed_tx,
        fold: FoldOp::All,
        overrides: Override::NotReadOnly,
        node_condition: "version not 5.6/5.5 and engine is not xengine",
    },
    Rule {
        capability: Capability::GlobalTimestamp,
        predicate: NodeCapabilitySnapshot::supports_global_timestamp,
        fold: FoldOp::All,
        overrides: Override::ExtendedProtocolOrTargetLine,
        node_condition: "innodb_commit_seq present",
    },
    Rule {
        capability: Capability::GlobalTimestampHeartbeat,
        predicate: NodeCapabilitySnapshot::supports_global_timestamp_heartbeat,
        fold: FoldOp::All,
        overrides: Override::ExtendedProtocol,
        node_condition: "innodb_heartbeat_seq present",
    },
    Rule {
        capability: Capability::CommitTimestampTx,
        predicate: NodeCapabilitySnapshot::supports_commit_timestamp_tx,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "innodb_cts_transaction present",
    },
    Rule {
        capability: Capability::DeadlockDetection,
        predicate: NodeCapabilitySnapshot::supports_deadlock_detection,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "version starts with 5.",
    },
    Rule {
        capability: Capability::MdlDeadlockDetection,
        predicate: NodeCapabilitySnapshot::supports_mdl_deadlock_detection,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "performance_schema on, MDL views readable and MDL instrument enabled",
    },
    Rule {
        capability: Capability::BloomFilter,
        predicate: NodeCapabilitySnapshot::supports_bloom_filter,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "UDF >= 1.1 ACTIVE with bloomfilter",
    },
    Rule {
        capability: Capability::HyperLogLog,
        predicate: NodeCapabilitySnapshot::supports_hyper_log_log,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "UDF >= 1.1 ACTIVE with hyperloglog",
    },
    Rule {
        capability: Capability::FastChecksum,
        predicate: NodeCapabilitySnapshot::supports_fast_checksum,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "UDF >= 1.1 ACTIVE with hashcheck",
    },
    Rule {
        capability: Capability::OpenSsl,
        predicate: NodeCapabilitySnapshot::supports_open_ssl,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "Rsa_public_key status present",
    },
    Rule {
        capability: Capability::SharedReadView,
        predicate: NodeCapabilitySnapshot::supports_shared_read_view,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "innodb_transaction_group present",
    },
    Rule {
        capability: Capability::Returning,
        predicate: NodeCapabilitySnapshot::supports_returning,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "dbms_trans.returning registered",
    },
    Rule {
        capability: Capability::LowerCaseTableNames,
        predicate: NodeCapabilitySnapshot::lower_case_table_names_enabled,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "lower_case_table_names != 0",
    },
    Rule {
        capability: Capability::LegacyVersion,
        predicate: NodeCapabilitySnapshot::is_legacy_version,
        fold: FoldOp::Any,
        overrides: Override::None,
        node_condition: "version starts with 5.6 or 5.5",
    },
    Rule {
        capability: Capability::TargetVersionLine,
        predicate: on_timestamp_version_line,
        fold: FoldOp::All,
        overrides: Override::None,
        node_condition: "version starts with 8.0",
    },
];

pub fn rule_for(capability: Capability) -> &'static Rule {
    &RULES[capability.index()]
}

pub fn describe_rules() -> Vec<RuleDescription> {
    RULES.iter().map(Rule::describe).collect()
}
