//! Storage capability configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for `capabilities.{toml,json}`
//! - Config resolution (CLI → env → XDG → /etc → defaults)
//! - Semantic validation
//! - Config snapshots recorded alongside each probe report

pub mod capabilities;
pub mod resolve;
pub mod snapshot;
pub mod validate;

use std::path::Path;

pub use capabilities::{
    CapabilityConfig, DeploymentConfig, DeploymentMode, ProbeConfig, ProtocolConfig, UdfConfig,
};
pub use resolve::{resolve_config, ConfigPath, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// A validated configuration plus the provenance needed to reproduce it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: CapabilityConfig,
    pub snapshot: ConfigSnapshot,
}

/// Resolve, parse, and validate the capability configuration.
///
/// Falls back to [`CapabilityConfig::default`] when no file is found at any
/// resolution step. An explicit CLI path that does not exist is an error.
pub fn load_config(cli_path: Option<&Path>) -> ValidationResult<LoadedConfig> {
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(ValidationError::IoError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    }

    let resolved = resolve_config(cli_path);
    let Some(path) = resolved.path.as_deref() else {
        return Ok(LoadedConfig {
            config: CapabilityConfig::default(),
            snapshot: ConfigSnapshot::defaults_only(),
        });
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let config = CapabilityConfig::parse(&content, capabilities::detect_format(path)?)?;
    validate_config(&config)?;

    let snapshot = ConfigSnapshot::new(&config, &resolved, &content);
    Ok(LoadedConfig { config, snapshot })
}
