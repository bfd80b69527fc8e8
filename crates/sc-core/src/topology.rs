//! What the aggregator needs from the outside world: the node list, a way to
//! reach each node, and two deployment-wide facts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::probe::executor::NodeConnection;
use sc_common::NodeName;
use sc_config::CapabilityConfig;

/// Storage engine family of a topology node. Only SQL nodes are probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    #[default]
    Sql,
    Columnar,
    Other,
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineType::Sql => write!(f, "sql"),
            EngineType::Columnar => write!(f, "columnar"),
            EngineType::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeDescriptor {
    pub name: NodeName,
    pub engine_type: EngineType,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<NodeName>, engine_type: EngineType) -> Self {
        NodeDescriptor {
            name: name.into(),
            engine_type,
        }
    }

    pub fn sql(name: impl Into<NodeName>) -> Self {
        Self::new(name, EngineType::Sql)
    }

    pub fn is_sql(&self) -> bool {
        self.engine_type == EngineType::Sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("topology unavailable: {0}")]
    Unavailable(String),

    #[error("node '{0}' is not part of the topology")]
    UnknownNode(NodeName),

    #[error("cannot acquire connection to '{node}': {message}")]
    Connection { node: NodeName, message: String },

    #[error("invalid topology: {0}")]
    Invalid(String),
}

/// Enumerates backend nodes and hands out connections to them.
pub trait TopologyProvider: Send + Sync {
    fn nodes(&self) -> Result<Vec<NodeDescriptor>, TopologyError>;

    fn connect(&self, node: &NodeName) -> Result<Arc<dyn NodeConnection>, TopologyError>;
}

/// Whether the metadata store is reached over the extended protocol.
pub trait MetadataProtocolDetector: Send + Sync {
    fn uses_extended_protocol(&self) -> bool;
}

pub trait DeploymentModeProvider: Send + Sync {
    fn is_read_only(&self) -> bool;
}

impl<T: TopologyProvider + ?Sized> TopologyProvider for Arc<T> {
    fn nodes(&self) -> Result<Vec<NodeDescriptor>, TopologyError> {
        (**self).nodes()
    }

    fn connect(&self, node: &NodeName) -> Result<Arc<dyn NodeConnection>, TopologyError> {
        (**self).connect(node)
    }
}

/// Deployment facts fixed at startup, taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StaticDeployment {
    pub read_only: bool,
    pub metadata_extended_protocol: bool,
}

impl From<&CapabilityConfig> for StaticDeployment {
    fn from(config: &CapabilityConfig) -> Self {
        StaticDeployment {
            read_only: config.deployment.is_read_only(),
            metadata_extended_protocol: config.protocol.metadata_extended_protocol,
        }
    }
}

impl MetadataProtocolDetector for StaticDeployment {
    fn uses_extended_protocol(&self) -> bool {
        self.metadata_extended_protocol
    }
}

impl DeploymentModeProvider for StaticDeployment {
    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
