//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::capabilities::CapabilityConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound on concurrently probed nodes.
pub const MAX_PARALLELISM: usize = 64;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Validate a parsed configuration semantically.
pub fn validate_config(config: &CapabilityConfig) -> ValidationResult<()> {
    let expected_major = major_of(crate::CONFIG_SCHEMA_VERSION);
    if major_of(&config.schema_version) != expected_major {
        return Err(ValidationError::VersionMismatch {
            expected: format!("{}.x", expected_major.unwrap_or_default()),
            actual: config.schema_version.clone(),
        });
    }

    validate_identifier("udf.plugin_name", &config.udf.plugin_name)?;
    validate_identifier(
        "udf.function_list_variable",
        &config.udf.function_list_variable,
    )?;

    let parallelism = config.probe.parallelism;
    if parallelism == 0 || parallelism > MAX_PARALLELISM {
        return Err(ValidationError::InvalidValue {
            field: "probe.parallelism".to_string(),
            message: format!("Must be in [1, {}], got {}", MAX_PARALLELISM, parallelism),
        });
    }

    Ok(())
}

fn major_of(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

/// Names interpolated into probe SQL must be plain identifiers.
fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "Must not be empty".to_string(),
        });
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must contain only [A-Za-z0-9_], got {:?}", value),
        });
    }
    Ok(())
}
