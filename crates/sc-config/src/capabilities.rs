//! Capability configuration types.
//!
//! Every section is optional in the file; missing sections take the defaults
//! below, so an empty file is a valid configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::validate::{ValidationError, ValidationResult};

/// Complete capability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CapabilityConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub deployment: DeploymentConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub udf: UdfConfig,

    #[serde(default)]
    pub probe: ProbeConfig,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            deployment: DeploymentConfig::default(),
            protocol: ProtocolConfig::default(),
            udf: UdfConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

/// Whether this instance serves writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    #[default]
    Master,
    ReadOnly,
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentMode::Master => write!(f, "master"),
            DeploymentMode::ReadOnly => write!(f, "read_only"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub mode: DeploymentMode,

    /// Skip all node queries and report a fixed synthetic snapshot per node.
    #[serde(default)]
    pub fast_mock: bool,
}

impl DeploymentConfig {
    pub fn is_read_only(&self) -> bool {
        self.mode == DeploymentMode::ReadOnly
    }
}

/// Connection protocol flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProtocolConfig {
    /// Data nodes are reached over the extended (pluggable) protocol.
    /// Native procedure calls are unavailable there, so RETURNING is reported unsupported.
    #[serde(default)]
    pub extended_protocol: bool,

    /// The metadata service is reached over the extended protocol.
    #[serde(default)]
    pub metadata_extended_protocol: bool,
}

/// Server-side UDF extension lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UdfConfig {
    #[serde(default = "default_plugin_name")]
    pub plugin_name: String,

    #[serde(default = "default_function_list_variable")]
    pub function_list_variable: String,
}

fn default_plugin_name() -> String {
    "polarx_udf".to_string()
}

fn default_function_list_variable() -> String {
    "polarx_udf_function_list".to_string()
}

impl Default for UdfConfig {
    fn default() -> Self {
        Self {
            plugin_name: default_plugin_name(),
            function_list_variable: default_function_list_variable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProbeConfig {
    /// Number of nodes probed concurrently. 1 probes sequentially.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

fn default_parallelism() -> usize {
    1
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

/// Pick a parser from the file extension.
pub fn detect_format(path: &Path) -> ValidationResult<ConfigFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "toml" => Ok(ConfigFormat::Toml),
        "json" => Ok(ConfigFormat::Json),
        _ => Err(ValidationError::ParseError(format!(
            "unsupported config format: {:?}",
            ext
        ))),
    }
}

impl CapabilityConfig {
    /// Read and parse a config file. Does not validate.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content, detect_format(path)?)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> ValidationResult<Self> {
        match format {
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e))),
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e))),
        }
    }
}
