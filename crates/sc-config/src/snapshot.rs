//! Configuration snapshots for probe reports.
//!
//! A snapshot captures the exact configuration used for a pass, so a report
//! can be traced back to the file that produced it.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::capabilities::CapabilityConfig;
use crate::resolve::{ConfigPath, ConfigSource};

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// SHA-256 hash of the config file content.
    #[serde(default)]
    pub config_hash: Option<String>,

    /// Path the config was loaded from.
    #[serde(default)]
    pub config_path: Option<String>,

    /// Source of the configuration.
    pub config_source: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSummary {
    pub deployment_mode: String,
    pub fast_mock: bool,
    pub extended_protocol: bool,
    pub metadata_extended_protocol: bool,
    pub udf_plugin: String,
    pub parallelism: usize,
}

impl ConfigSnapshot {
    /// Create a snapshot from a loaded configuration and its raw content.
    pub fn new(config: &CapabilityConfig, resolved: &ConfigPath, content: &str) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            config_hash: Some(hash_content(content)),
            config_path: resolved.path.as_ref().map(|p| p.display().to_string()),
            config_source: resolved.source.to_string(),
            summary: ConfigSummary::from(config),
        }
    }

    /// Create a snapshot with only defaults (no config file loaded).
    pub fn defaults_only() -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            config_hash: None,
            config_path: None,
            config_source: ConfigSource::BuiltinDefault.to_string(),
            summary: ConfigSummary::from(&CapabilityConfig::default()),
        }
    }
}

impl From<&CapabilityConfig> for ConfigSummary {
    fn from(config: &CapabilityConfig) -> Self {
        ConfigSummary {
            deployment_mode: config.deployment.mode.to_string(),
            fast_mock: config.deployment.fast_mock,
            extended_protocol: config.protocol.extended_protocol,
            metadata_extended_protocol: config.protocol.metadata_extended_protocol,
            udf_plugin: config.udf.plugin_name.clone(),
            parallelism: config.probe.parallelism,
        }
    }
}

/// Compute SHA-256 hash of content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_hash_content_is_stable_hex() {
        let hash = hash_content("test content");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_content("test content"));
        assert_ne!(hash, hash_content("test content\n"));
    }

    #[test]
    fn test_defaults_only() {
        let snapshot = ConfigSnapshot::defaults_only();
        assert!(snapshot.config_hash.is_none());
        assert_eq!(snapshot.config_source, "builtin default");
        assert_eq!(snapshot.summary.deployment_mode, "master");
        assert_eq!(snapshot.summary.parallelism, 1);
    }

    #[test]
    fn test_snapshot_records_provenance() {
        let resolved = ConfigPath {
            path: Some(PathBuf::from("/tmp/capabilities.toml")),
            source: ConfigSource::CliArgument,
        };
        let mut config = CapabilityConfig::default();
        config.protocol.metadata_extended_protocol = true;

        let snapshot = ConfigSnapshot::new(&config, &resolved, "[protocol]\n");
        assert_eq!(snapshot.config_path.as_deref(), Some("/tmp/capabilities.toml"));
        assert_eq!(snapshot.config_source, "CLI argument");
        assert_eq!(snapshot.config_hash, Some(hash_content("[protocol]\n")));
        assert!(snapshot.summary.metadata_extended_protocol);
    }
}
