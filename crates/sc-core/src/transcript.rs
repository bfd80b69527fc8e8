//! Offline topologies described by a file.
//!
//! A transcript lists nodes and how each one answers the probe catalogue.
//! [`TranscriptTopology`] serves those answers through the normal
//! [`TopologyProvider`] seam, so a full pass runs without a live cluster.
//!
//! ```toml
//! [[nodes]]
//! name = "dn-0"
//! version = "8.0.32-X-Cluster"
//! lower_case_table_names = 1
//! variables = { innodb_commit_seq = "ON" }
//! status = { Rsa_public_key = "-----BEGIN PUBLIC KEY-----" }
//! native_procedures = [{ schema = "dbms_trans", name = "returning" }]
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::probe::executor::{ExecError, NodeConnection, ReadRoute, Row, SqlError};
use crate::probe::sql;
use crate::topology::{EngineType, NodeDescriptor, TopologyError, TopologyProvider};
use sc_common::NodeName;

const DEFAULT_UDF_PLUGIN: &str = "polarx_udf";
const DEFAULT_UDF_FUNCTION_LIST: &str = "polarx_udf_function_list";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NativeProcedure {
    pub schema: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UdfProfile {
    #[serde(default = "default_udf_plugin")]
    pub plugin_name: String,
    pub version: String,
    pub status: String,
    #[serde(default = "default_udf_function_list")]
    pub function_list_variable: String,
    /// Comma-separated, as the server reports it.
    #[serde(default)]
    pub functions: String,
}

fn default_udf_plugin() -> String {
    DEFAULT_UDF_PLUGIN.to_string()
}

fn default_udf_function_list() -> String {
    DEFAULT_UDF_FUNCTION_LIST.to_string()
}

/// An injected failure for every statement containing `matches`.
///
/// With `sql_state` set the node raises a SQL error, otherwise the
/// connection drops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Fault {
    pub matches: String,
    #[serde(default)]
    pub sql_state: Option<String>,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Fault {
    pub fn error(&self) -> ExecError {
        match &self.sql_state {
            Some(state) => ExecError::Sql(SqlError::new(state.clone(), self.code, self.message.clone())),
            None => ExecError::ConnectionLost(self.message.clone()),
        }
    }
}

/// How one node answers the probe catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeProfile {
    pub name: NodeName,
    #[serde(default)]
    pub engine: EngineType,
    /// `None` answers `SELECT @@version` with NULL.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub status: BTreeMap<String, String>,
    #[serde(default)]
    pub lower_case_table_names: i32,
    #[serde(default)]
    pub udf: Option<UdfProfile>,
    /// `None` means `dbms_admin.show_native_procedure` does not exist.
    #[serde(default)]
    pub native_procedures: Option<Vec<NativeProcedure>>,
    #[serde(default)]
    pub mdl_privilege: bool,
    #[serde(default)]
    pub mdl_instrumentation: bool,
    #[serde(default)]
    pub faults: Vec<Fault>,
    #[serde(default)]
    pub unreachable: bool,
}

impl NodeProfile {
    pub fn new(name: impl Into<NodeName>) -> Self {
        NodeProfile {
            name: name.into(),
            engine: EngineType::Sql,
            version: None,
            variables: BTreeMap::new(),
            status: BTreeMap::new(),
            lower_case_table_names: 0,
            udf: None,
            native_procedures: None,
            mdl_privilege: false,
            mdl_instrumentation: false,
            faults: Vec::new(),
            unreachable: false,
        }
    }

    pub fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.name.clone(), self.engine)
    }

    /// Answer one statement the way the described node would.
    pub fn answer(&self, statement: &str) -> Result<Vec<Row>, ExecError> {
        if let Some(fault) = self.faults.iter().find(|f| statement.contains(&f.matches)) {
            return Err(fault.error());
        }

        match statement {
            sql::SELECT_VERSION => Ok(vec![Row::new(vec![self.version.clone()])]),
            sql::SELECT_LOWER_CASE_TABLE_NAMES => {
                Ok(vec![Row::from_strs([self.lower_case_table_names.to_string()])])
            }
            sql::SHOW_NATIVE_PROCEDURES => match &self.native_procedures {
                Some(procs) => Ok(procs
                    .iter()
                    .map(|p| Row::from_strs([p.schema.as_str(), p.name.as_str()]))
                    .collect()),
                None => Err(ExecError::Sql(SqlError::new(
                    "42000",
                    1305,
                    "PROCEDURE dbms_admin.show_native_procedure does not exist",
                ))),
            },
            sql::SELECT_MDL_PRIVILEGE if self.mdl_privilege => Ok(Vec::new()),
            sql::SELECT_MDL_PRIVILEGE => Err(ExecError::Sql(SqlError::new(
                "42000",
                1142,
                "SELECT command denied to user for table 'metadata_locks'",
            ))),
            sql::SELECT_MDL_INSTRUMENT => {
                let flag = if self.mdl_instrumentation { "YES" } else { "NO" };
                Ok(vec![Row::from_strs([flag, flag])])
            }
            _ => self.answer_lookup(statement),
        }
    }

    fn answer_lookup(&self, statement: &str) -> Result<Vec<Row>, ExecError> {
        if let Some(plugin) = sql::plugin_target(statement) {
            return Ok(self
                .udf
                .iter()
                .filter(|udf| udf.plugin_name == plugin)
                .map(|udf| Row::from_strs([udf.version.as_str(), udf.status.as_str()]))
                .collect());
        }

        let Some(name) = sql::like_target(statement) else {
            return Err(ExecError::Sql(SqlError::new(
                "42000",
                1064,
                "You have an error in your SQL syntax",
            )));
        };

        let value = if statement.starts_with("SHOW STATUS") {
            self.status.get(name).cloned()
        } else {
            self.variables.get(name).cloned().or_else(|| {
                self.udf
                    .as_ref()
                    .filter(|udf| udf.function_list_variable == name)
                    .map(|udf| udf.functions.clone())
            })
        };
        Ok(value
            .map(|v| vec![Row::from_strs([name.to_string(), v])])
            .unwrap_or_default())
    }
}

/// A [`NodeConnection`] that answers from a [`NodeProfile`].
#[derive(Debug, Clone)]
pub struct ProfileConnection {
    profile: Arc<NodeProfile>,
}

impl ProfileConnection {
    pub fn new(profile: Arc<NodeProfile>) -> Self {
        ProfileConnection { profile }
    }
}

impl NodeConnection for ProfileConnection {
    fn query(&self, statement: &str, _route: ReadRoute) -> Result<Vec<Row>, ExecError> {
        self.profile.answer(statement)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    Toml,
    Yaml,
    Json,
}

impl TranscriptFormat {
    pub fn from_path(path: &Path) -> Result<Self, TopologyError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(TranscriptFormat::Toml),
            Some("yaml") | Some("yml") => Ok(TranscriptFormat::Yaml),
            Some("json") => Ok(TranscriptFormat::Json),
            _ => Err(TopologyError::Invalid(format!(
                "unsupported topology file extension: {}",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptFile {
    #[serde(default)]
    pub nodes: Vec<NodeProfile>,
}

/// File-backed topology.
#[derive(Debug, Clone, Default)]
pub struct TranscriptTopology {
    nodes: Vec<Arc<NodeProfile>>,
}

impl TranscriptTopology {
    pub fn from_profiles(profiles: Vec<NodeProfile>) -> Result<Self, TopologyError> {
        let mut seen = HashSet::new();
        for profile in &profiles {
            if profile.name.as_str().trim().is_empty() {
                return Err(TopologyError::Invalid("node with empty name".into()));
            }
            if !seen.insert(profile.name.clone()) {
                return Err(TopologyError::Invalid(format!(
                    "duplicate node name '{}'",
                    profile.name
                )));
            }
        }
        Ok(TranscriptTopology {
            nodes: profiles.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn parse(content: &str, format: TranscriptFormat) -> Result<Self, TopologyError> {
        let file: TranscriptFile = match format {
            TranscriptFormat::Toml => {
                toml::from_str(content).map_err(|e| TopologyError::Invalid(e.to_string()))?
            }
            TranscriptFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| TopologyError::Invalid(e.to_string()))?
            }
            TranscriptFormat::Json => {
                serde_json::from_str(content).map_err(|e| TopologyError::Invalid(e.to_string()))?
            }
        };
        Self::from_profiles(file.nodes)
    }

    pub fn from_path(path: &Path) -> Result<Self, TopologyError> {
        let format = TranscriptFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            TopologyError::Unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content, format)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &NodeProfile> {
        self.nodes.iter().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl TopologyProvider for TranscriptTopology {
    fn nodes(&self) -> Result<Vec<NodeDescriptor>, TopologyError> {
        Ok(self.nodes.iter().map(|p| p.descriptor()).collect())
    }

    fn connect(&self, node: &NodeName) -> Result<Arc<dyn NodeConnection>, TopologyError> {
        let profile = self
            .nodes
            .iter()
            .find(|p| &p.name == node)
            .ok_or_else(|| TopologyError::UnknownNode(node.clone()))?;
        if profile.unreachable {
            return Err(TopologyError::Connection {
                node: node.clone(),
                message: "no connection available in pool".into(),
            });
        }
        Ok(Arc::new(ProfileConnection::new(Arc::clone(profile))))
    }
}
