//! Storage capability common types, IDs, and errors.
//!
//! This crate provides foundational types shared across sc-core modules:
//! - Node and pass identity types
//! - Common error types with stable codes
//! - Output format selection
//! - Schema versioning

pub mod error;
pub mod id;
pub mod output;
pub mod schema;

pub use error::{Error, ErrorCategory, Result};
pub use id::{NodeName, PassId};
pub use output::OutputFormat;
pub use schema::SCHEMA_VERSION;
