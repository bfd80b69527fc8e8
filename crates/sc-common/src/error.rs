//! Error types for storage capability aggregation.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Probe Failed
//!   Reason: probe 'version' failed on node dn-2: connection reset
//!   Fix: Check the node is reachable, then run 'sc-core probe' again.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 30,
//!   "category": "probe",
//!   "message": "probe 'version' failed on node dn-2: connection reset",
//!   "recoverable": true,
//!   "suggested_action": "retry",
//!   "context": { "node": "dn-2", "probe": "version" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for storage capability operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Topology discovery and connection errors.
    Topology,
    /// Per-node capability probe errors.
    Probe,
    /// Initialization lifecycle errors.
    Lifecycle,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Topology => write!(f, "topology"),
            ErrorCategory::Probe => write!(f, "probe"),
            ErrorCategory::Lifecycle => write!(f, "lifecycle"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for agents to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Run a validation command.
    RunCheck,
    /// Re-read the topology.
    Rediscover,
    /// Abort the operation.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::Rediscover => write!(f, "rediscover"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for storage capability aggregation.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    // Topology errors (20-29)
    #[error("topology discovery failed: {0}")]
    Topology(String),

    #[error("node {node} not found in topology")]
    NodeNotFound { node: String },

    #[error("connection to node {node} unavailable: {message}")]
    ConnectionUnavailable { node: String, message: String },

    // Probe errors (30-39)
    #[error("probe '{probe}' failed on node {node}: {message}")]
    ProbeFailed {
        node: String,
        probe: String,
        message: String,
    },

    #[error("probe '{probe}' on node {node} returned malformed data: {message}")]
    MalformedResponse {
        node: String,
        probe: String,
        message: String,
    },

    // Lifecycle errors (40-49)
    #[error("capability initialization failed: {0}")]
    InitializationFailed(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Topology errors
    /// - 30-39: Probe errors
    /// - 40-49: Lifecycle errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::SchemaValidation(_) => 12,
            Error::Topology(_) => 20,
            Error::NodeNotFound { .. } => 21,
            Error::ConnectionUnavailable { .. } => 22,
            Error::ProbeFailed { .. } => 30,
            Error::MalformedResponse { .. } => 31,
            Error::InitializationFailed(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) | Error::SchemaValidation(_) => {
                ErrorCategory::Config
            }

            Error::Topology(_)
            | Error::NodeNotFound { .. }
            | Error::ConnectionUnavailable { .. } => ErrorCategory::Topology,

            Error::ProbeFailed { .. } | Error::MalformedResponse { .. } => ErrorCategory::Probe,

            Error::InitializationFailed(_) => ErrorCategory::Lifecycle,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// Capability state is never partially published, so every probe or
    /// connection failure can be retried with a fresh pass.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::InvalidConfig(_) => true,
            Error::SchemaValidation(_) => true,

            Error::Topology(_) => true,
            Error::NodeNotFound { .. } => false,
            Error::ConnectionUnavailable { .. } => true,

            Error::ProbeFailed { .. } => true,
            // A node answering garbage will keep answering garbage.
            Error::MalformedResponse { .. } => false,

            Error::InitializationFailed(_) => true,

            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns the suggested action for agents.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) => SuggestedAction::RunCheck,
            Error::InvalidConfig(_) => SuggestedAction::RunCheck,
            Error::SchemaValidation(_) => SuggestedAction::RunCheck,

            Error::Topology(_) => SuggestedAction::Rediscover,
            Error::NodeNotFound { .. } => SuggestedAction::Rediscover,
            Error::ConnectionUnavailable { .. } => SuggestedAction::Retry,

            Error::ProbeFailed { .. } => SuggestedAction::Retry,
            Error::MalformedResponse { .. } => SuggestedAction::ManualIntervention,

            Error::InitializationFailed(_) => SuggestedAction::Retry,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'sc-core config validate' to check the configuration file."
            }
            Error::InvalidConfig(_) => {
                "Fix the reported field, or remove the file to fall back to built-in defaults."
            }
            Error::SchemaValidation(_) => {
                "Ensure the configuration declares a supported schema_version (1.x)."
            }

            Error::Topology(_) => {
                "Check the topology source is readable and lists at least the expected nodes."
            }
            Error::NodeNotFound { .. } => {
                "List known nodes with 'sc-core probe --format summary' and check the name."
            }
            Error::ConnectionUnavailable { .. } => {
                "Check the node is reachable and the connection pool is not exhausted, then retry."
            }

            Error::ProbeFailed { .. } => {
                "Check the node is reachable, then run 'sc-core probe' again."
            }
            Error::MalformedResponse { .. } => {
                "The node answered a capability query with unexpected data. Inspect the node's server version and variables."
            }

            Error::InitializationFailed(_) => {
                "Capability flags were left unchanged. Retry once the failing node is healthy."
            }

            Error::Io(_) => "Check file permissions and that the path exists. Retry the operation.",
            Error::Json(_) => {
                "Invalid JSON in file. Check syntax with 'jq . <file>' or restore from backup."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig(_) => "Invalid Configuration",
            Error::SchemaValidation(_) => "Schema Validation Failed",

            Error::Topology(_) => "Topology Error",
            Error::NodeNotFound { .. } => "Node Not Found",
            Error::ConnectionUnavailable { .. } => "Connection Unavailable",

            Error::ProbeFailed { .. } => "Probe Failed",
            Error::MalformedResponse { .. } => "Malformed Node Response",

            Error::InitializationFailed(_) => "Initialization Failed",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for agents.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., node, probe).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::NodeNotFound { node } | Error::ConnectionUnavailable { node, .. } => {
                context.insert("node".to_string(), serde_json::json!(node));
            }
            Error::ProbeFailed { node, probe, .. } | Error::MalformedResponse { node, probe, .. } => {
                context.insert("node".to_string(), serde_json::json!(node));
                context.insert("probe".to_string(), serde_json::json!(probe));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_failed() -> Error {
        Error::ProbeFailed {
            node: "dn-2".into(),
            probe: "version".into(),
            message: "connection reset".into(),
        }
    }

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Config("test".into()).code(), 10);
        assert_eq!(Error::NodeNotFound { node: "x".into() }.code(), 21);
        assert_eq!(probe_failed().code(), 30);
        assert_eq!(Error::InitializationFailed("x".into()).code(), 40);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::InvalidConfig("x".into()).category(), ErrorCategory::Config);
        assert_eq!(Error::Topology("x".into()).category(), ErrorCategory::Topology);
        assert_eq!(probe_failed().category(), ErrorCategory::Probe);
        assert_eq!(
            Error::InitializationFailed("x".into()).category(),
            ErrorCategory::Lifecycle
        );
    }

    #[test]
    fn test_codes_fall_in_category_ranges() {
        let errors = vec![
            Error::Config("a".into()),
            Error::SchemaValidation("a".into()),
            Error::ConnectionUnavailable {
                node: "n".into(),
                message: "m".into(),
            },
            Error::MalformedResponse {
                node: "n".into(),
                probe: "p".into(),
                message: "m".into(),
            },
            Error::InitializationFailed("a".into()),
        ];
        for err in errors {
            let expected = match err.category() {
                ErrorCategory::Config => 10..20,
                ErrorCategory::Topology => 20..30,
                ErrorCategory::Probe => 30..40,
                ErrorCategory::Lifecycle => 40..50,
                ErrorCategory::Io => 60..70,
            };
            assert!(expected.contains(&err.code()), "{err} has code {}", err.code());
        }
    }

    #[test]
    fn test_malformed_response_not_recoverable() {
        let err = Error::MalformedResponse {
            node: "n".into(),
            probe: "version".into(),
            message: "no rows".into(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.suggested_action(), SuggestedAction::ManualIntervention);
    }

    #[test]
    fn test_structured_error_context() {
        let structured = StructuredError::from(&probe_failed());
        assert_eq!(structured.code, 30);
        assert_eq!(structured.context.get("node"), Some(&serde_json::json!("dn-2")));
        assert_eq!(
            structured.context.get("probe"),
            Some(&serde_json::json!("version"))
        );

        let json = structured.with_context("pass_id", "sc-x").to_json();
        assert!(json.contains("\"category\":\"probe\""));
        assert!(json.contains("\"suggested_action\":\"retry\""));
        assert!(json.contains("pass_id"));
    }

    #[test]
    fn test_format_error_human_plain() {
        let text = format_error_human(&probe_failed(), false);
        assert!(text.starts_with("✗ Probe Failed"));
        assert!(text.contains("Reason: probe 'version' failed on node dn-2"));
        assert!(text.contains("Fix: Check the node is reachable"));
        assert!(!text.contains("\x1b["));
    }

    #[test]
    fn test_display_snake_case() {
        assert_eq!(ErrorCategory::Lifecycle.to_string(), "lifecycle");
        assert_eq!(
            SuggestedAction::ManualIntervention.to_string(),
            "manual_intervention"
        );
    }
}
