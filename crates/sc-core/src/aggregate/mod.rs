//! Cluster-wide capability aggregation.
//!
//! - [`rules`]: the per-capability rule table
//! - [`fold`]: the generic fold and the published [`ClusterCapabilities`]
//! - [`aggregator`]: one pass over the topology

pub mod aggregator;
pub mod fold;
pub mod rules;

pub use aggregator::{AggregationOutcome, CapabilityAggregator, CapabilityError};
pub use fold::{CapabilityFold, ClusterCapabilities};
pub use rules::{describe_rules, Capability, FoldOp, GlobalContext, Override, Rule, RULES};
