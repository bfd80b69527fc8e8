//! Storage Capability Core Library
//!
//! This library decides which optional storage-engine features a cluster
//! of backend nodes can be trusted to support:
//! - Per-node probes against a small SQL catalogue
//! - A conservative fold of node facts into cluster flags
//! - A lazily initialized, lifecycle-gated accessor
//! - Offline topologies loaded from transcript files
//!
//! The binary entry point is in `main.rs`.

pub mod aggregate;
pub mod exit_codes;
pub mod logging;
pub mod manager;
pub mod probe;
pub mod report;
pub mod schema;
pub mod snapshot;
pub mod topology;
pub mod transcript;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_node;

pub use aggregate::{CapabilityAggregator, CapabilityError, ClusterCapabilities};
pub use manager::{LifecycleState, StorageCapabilityManager};
pub use snapshot::{NodeCapabilitySnapshot, ProbeOptions};
pub use topology::{NodeDescriptor, TopologyError, TopologyProvider};
