//! Per-node capability probes.
//!
//! - [`executor`]: the connection seam ([`NodeConnection`]) and its row/error types
//! - [`sql`]: canonical probe statements
//! - [`set`]: one function per capability probe
//! - [`udf`]: optional UDF extension discovery and its derived predicates

pub mod executor;
pub mod set;
pub mod sql;
pub mod udf;

pub use executor::{ExecError, NodeConnection, ReadRoute, Row, SqlError};
pub use set::{Probe, ProbeError};
pub use udf::{UdfCapabilitySnapshot, UdfExtension};
