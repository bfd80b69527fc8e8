//! Per-node capability snapshot.
//!
//! A snapshot is the result of running the whole probe set once against one
//! node. It is immutable after construction except for the heartbeat flag,
//! which [`NodeCapabilitySnapshot::refine_heartbeat`] may update in place.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::probe::executor::NodeConnection;
use crate::probe::set::{self, ProbeError};
use crate::probe::udf::{self, UdfExtension};
use sc_config::CapabilityConfig;

/// Version prefixes that predate distributed transaction support.
pub const LEGACY_VERSION_PREFIXES: [&str; 2] = ["5.6", "5.5"];

/// Version line that carries global timestamps without the extended metadata protocol.
pub const TIMESTAMP_VERSION_LINE: &str = "8.0";

/// Version line on which deadlock detection is supported.
pub const DEADLOCK_DETECTION_VERSION_LINE: &str = "5.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Generic,
    XEngine,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Generic => write!(f, "generic"),
            EngineKind::XEngine => write!(f, "xengine"),
        }
    }
}

/// Inputs to a node probe that come from configuration rather than the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub extended_protocol: bool,
    pub fast_mock: bool,
    pub udf_plugin: String,
    pub udf_function_list_variable: String,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions::from(&CapabilityConfig::default())
    }
}

impl From<&CapabilityConfig> for ProbeOptions {
    fn from(config: &CapabilityConfig) -> Self {
        ProbeOptions {
            extended_protocol: config.protocol.extended_protocol,
            fast_mock: config.deployment.fast_mock,
            udf_plugin: config.udf.plugin_name.clone(),
            udf_function_list_variable: config.udf.function_list_variable.clone(),
        }
    }
}

/// Raw probe results for one backend node.
#[derive(Debug)]
pub struct NodeCapabilitySnapshot {
    version: String,
    engine_kind: EngineKind,
    supports_distributed_tx: bool,
    supports_global_timestamp: bool,
    supports_global_timestamp_heartbeat: AtomicBool,
    supports_commit_timestamp_tx: bool,
    supports_shared_read_view: bool,
    supports_open_ssl: bool,
    supports_performance_schema: bool,
    has_metadata_lock_select_privilege: bool,
    metadata_lock_instrumentation_enabled: bool,
    supports_returning: bool,
    lower_case_table_name_mode: i32,
    udf: UdfExtension,
}

impl Clone for NodeCapabilitySnapshot {
    fn clone(&self) -> Self {
        NodeCapabilitySnapshot {
            version: self.version.clone(),
            engine_kind: self.engine_kind,
            supports_distributed_tx: self.supports_distributed_tx,
            supports_global_timestamp: self.supports_global_timestamp,
            supports_global_timestamp_heartbeat: AtomicBool::new(
                self.supports_global_timestamp_heartbeat(),
            ),
            supports_commit_timestamp_tx: self.supports_commit_timestamp_tx,
            supports_shared_read_view: self.supports_shared_read_view,
            supports_open_ssl: self.supports_open_ssl,
            supports_performance_schema: self.supports_performance_schema,
            has_metadata_lock_select_privilege: self.has_metadata_lock_select_privilege,
            metadata_lock_instrumentation_enabled: self.metadata_lock_instrumentation_enabled,
            supports_returning: self.supports_returning,
            lower_case_table_name_mode: self.lower_case_table_name_mode,
            udf: self.udf.clone(),
        }
    }
}

impl NodeCapabilitySnapshot {
    /// Start building a snapshot for a node reporting `version`.
    pub fn builder(version: impl Into<String>) -> SnapshotBuilder {
        SnapshotBuilder::new(version)
    }

    /// Run the full probe set against one node.
    ///
    /// Probes run in a fixed order; the first fatal error aborts the node.
    pub fn probe(conn: &dyn NodeConnection, options: &ProbeOptions) -> Result<Self, ProbeError> {
        if options.fast_mock {
            return Ok(Self::fast_mock());
        }

        let version = set::probe_version(conn)?;
        let global_timestamp = set::probe_global_timestamp(conn)?;
        let heartbeat = set::probe_timestamp_heartbeat(conn)?;
        let performance_schema = set::probe_performance_schema(conn)?;
        let xengine = set::probe_xengine(conn)?;
        let udf = udf::resolve_udf(
            conn,
            &options.udf_plugin,
            &options.udf_function_list_variable,
        );
        let returning = set::probe_returning(conn, options.extended_protocol)?;
        let commit_timestamp_tx = set::probe_commit_timestamp_tx(conn)?;
        let lower_case = set::probe_lower_case_table_names(conn)?;
        let shared_read_view = set::probe_shared_read_view(conn)?;
        let mdl_privilege = set::probe_mdl_privilege(conn);
        let mdl_instrumentation = set::probe_mdl_instrumentation(conn);
        let open_ssl = set::probe_open_ssl(conn)?;

        let snapshot = SnapshotBuilder::new(version)
            .engine_kind(if xengine {
                EngineKind::XEngine
            } else {
                EngineKind::Generic
            })
            .global_timestamp(global_timestamp)
            .global_timestamp_heartbeat(heartbeat)
            .commit_timestamp_tx(commit_timestamp_tx)
            .shared_read_view(shared_read_view)
            .open_ssl(open_ssl)
            .performance_schema(performance_schema)
            .metadata_lock_select_privilege(mdl_privilege)
            .metadata_lock_instrumentation(mdl_instrumentation)
            .returning(returning)
            .lower_case_table_name_mode(lower_case)
            .udf(udf)
            .build();

        debug!(
            version = %snapshot.version,
            engine = %snapshot.engine_kind,
            distributed_tx = snapshot.supports_distributed_tx,
            "node probed"
        );
        Ok(snapshot)
    }

    /// Fixed synthetic snapshot used when node queries are disabled.
    pub fn fast_mock() -> Self {
        SnapshotBuilder::new("5.7")
            .lower_case_table_name_mode(1)
            .build()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.engine_kind
    }

    /// Version is not on a legacy line and the engine is not XEngine.
    pub fn supports_distributed_tx(&self) -> bool {
        self.supports_distributed_tx
    }

    pub fn supports_global_timestamp(&self) -> bool {
        self.supports_global_timestamp
    }

    pub fn supports_global_timestamp_heartbeat(&self) -> bool {
        self.supports_global_timestamp_heartbeat.load(Ordering::Acquire)
    }

    pub fn supports_commit_timestamp_tx(&self) -> bool {
        self.supports_commit_timestamp_tx
    }

    pub fn supports_shared_read_view(&self) -> bool {
        self.supports_shared_read_view
    }

    pub fn supports_open_ssl(&self) -> bool {
        self.supports_open_ssl
    }

    pub fn supports_performance_schema(&self) -> bool {
        self.supports_performance_schema
    }

    pub fn has_metadata_lock_select_privilege(&self) -> bool {
        self.has_metadata_lock_select_privilege
    }

    pub fn metadata_lock_instrumentation_enabled(&self) -> bool {
        self.metadata_lock_instrumentation_enabled
    }

    pub fn supports_returning(&self) -> bool {
        self.supports_returning
    }

    pub fn lower_case_table_name_mode(&self) -> i32 {
        self.lower_case_table_name_mode
    }

    pub fn udf(&self) -> &UdfExtension {
        &self.udf
    }

    pub fn on_version_line(&self, prefix: &str) -> bool {
        self.version.starts_with(prefix)
    }

    pub fn is_legacy_version(&self) -> bool {
        LEGACY_VERSION_PREFIXES
            .iter()
            .any(|prefix| self.on_version_line(prefix))
    }

    pub fn supports_deadlock_detection(&self) -> bool {
        self.on_version_line(DEADLOCK_DETECTION_VERSION_LINE)
    }

    pub fn supports_mdl_deadlock_detection(&self) -> bool {
        self.supports_performance_schema
            && self.has_metadata_lock_select_privilege
            && self.metadata_lock_instrumentation_enabled
    }

    /// Any non-zero mode folds identifiers to lower case.
    pub fn lower_case_table_names_enabled(&self) -> bool {
        self.lower_case_table_name_mode != 0
    }

    pub fn supports_bloom_filter(&self) -> bool {
        udf::supports_bloom_filter(&self.udf)
    }

    pub fn supports_hyper_log_log(&self) -> bool {
        udf::supports_hyper_log_log(&self.udf)
    }

    pub fn supports_fast_checksum(&self) -> bool {
        udf::supports_fast_checksum(&self.udf)
    }

    /// Replace the heartbeat flag, returning the previous value.
    pub fn refine_heartbeat(&self, supported: bool) -> bool {
        self.supports_global_timestamp_heartbeat
            .swap(supported, Ordering::AcqRel)
    }

    pub fn to_report(&self) -> NodeCapabilityReport {
        NodeCapabilityReport {
            version: self.version.clone(),
            engine_kind: self.engine_kind,
            legacy_version: self.is_legacy_version(),
            supports_distributed_tx: self.supports_distributed_tx,
            supports_global_timestamp: self.supports_global_timestamp,
            supports_global_timestamp_heartbeat: self.supports_global_timestamp_heartbeat(),
            supports_commit_timestamp_tx: self.supports_commit_timestamp_tx,
            supports_shared_read_view: self.supports_shared_read_view,
            supports_open_ssl: self.supports_open_ssl,
            supports_performance_schema: self.supports_performance_schema,
            has_metadata_lock_select_privilege: self.has_metadata_lock_select_privilege,
            metadata_lock_instrumentation_enabled: self.metadata_lock_instrumentation_enabled,
            supports_deadlock_detection: self.supports_deadlock_detection(),
            supports_mdl_deadlock_detection: self.supports_mdl_deadlock_detection(),
            supports_returning: self.supports_returning,
            supports_bloom_filter: self.supports_bloom_filter(),
            supports_hyper_log_log: self.supports_hyper_log_log(),
            supports_fast_checksum: self.supports_fast_checksum(),
            lower_case_table_name_mode: self.lower_case_table_name_mode,
            udf: self.udf.clone(),
        }
    }
}

/// Builder for [`NodeCapabilitySnapshot`]. Every capability defaults to unsupported.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    version: String,
    engine_kind: EngineKind,
    global_timestamp: bool,
    global_timestamp_heartbeat: bool,
    commit_timestamp_tx: bool,
    shared_read_view: bool,
    open_ssl: bool,
    performance_schema: bool,
    metadata_lock_select_privilege: bool,
    metadata_lock_instrumentation: bool,
    returning: bool,
    lower_case_table_name_mode: i32,
    udf: UdfExtension,
}

impl SnapshotBuilder {
    pub fn new(version: impl Into<String>) -> Self {
        SnapshotBuilder {
            version: version.into(),
            engine_kind: EngineKind::Generic,
            global_timestamp: false,
            global_timestamp_heartbeat: false,
            commit_timestamp_tx: false,
            shared_read_view: false,
            open_ssl: false,
            performance_schema: false,
            metadata_lock_select_privilege: false,
            metadata_lock_instrumentation: false,
            returning: false,
            lower_case_table_name_mode: 0,
            udf: UdfExtension::Absent,
        }
    }

    pub fn engine_kind(mut self, kind: EngineKind) -> Self {
        self.engine_kind = kind;
        self
    }

    pub fn global_timestamp(mut self, v: bool) -> Self {
        self.global_timestamp = v;
        self
    }

    pub fn global_timestamp_heartbeat(mut self, v: bool) -> Self {
        self.global_timestamp_heartbeat = v;
        self
    }

    pub fn commit_timestamp_tx(mut self, v: bool) -> Self {
        self.commit_timestamp_tx = v;
        self
    }

    pub fn shared_read_view(mut self, v: bool) -> Self {
        self.shared_read_view = v;
        self
    }

    pub fn open_ssl(mut self, v: bool) -> Self {
        self.open_ssl = v;
        self
    }

    pub fn performance_schema(mut self, v: bool) -> Self {
        self.performance_schema = v;
        self
    }

    pub fn metadata_lock_select_privilege(mut self, v: bool) -> Self {
        self.metadata_lock_select_privilege = v;
        self
    }

    pub fn metadata_lock_instrumentation(mut self, v: bool) -> Self {
        self.metadata_lock_instrumentation = v;
        self
    }

    pub fn returning(mut self, v: bool) -> Self {
        self.returning = v;
        self
    }

    pub fn lower_case_table_name_mode(mut self, mode: i32) -> Self {
        self.lower_case_table_name_mode = mode;
        self
    }

    pub fn udf(mut self, udf: UdfExtension) -> Self {
        self.udf = udf;
        self
    }

    pub fn build(self) -> NodeCapabilitySnapshot {
        let legacy = LEGACY_VERSION_PREFIXES
            .iter()
            .any(|prefix| self.version.starts_with(prefix));
        NodeCapabilitySnapshot {
            supports_distributed_tx: !legacy && self.engine_kind != EngineKind::XEngine,
            version: self.version,
            engine_kind: self.engine_kind,
            supports_global_timestamp: self.global_timestamp,
            supports_global_timestamp_heartbeat: AtomicBool::new(self.global_timestamp_heartbeat),
            supports_commit_timestamp_tx: self.commit_timestamp_tx,
            supports_shared_read_view: self.shared_read_view,
            supports_open_ssl: self.open_ssl,
            supports_performance_schema: self.performance_schema,
            has_metadata_lock_select_privilege: self.metadata_lock_select_privilege,
            metadata_lock_instrumentation_enabled: self.metadata_lock_instrumentation,
            supports_returning: self.returning,
            lower_case_table_name_mode: self.lower_case_table_name_mode,
            udf: self.udf,
        }
    }
}

/// Serializable view of a node snapshot, including derived predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeCapabilityReport {
    pub version: String,
    pub engine_kind: EngineKind,
    pub legacy_version: bool,
    pub supports_distributed_tx: bool,
    pub supports_global_timestamp: bool,
    pub supports_global_timestamp_heartbeat: bool,
    pub supports_commit_timestamp_tx: bool,
    pub supports_shared_read_view: bool,
    pub supports_open_ssl: bool,
    pub supports_performance_schema: bool,
    pub has_metadata_lock_select_privilege: bool,
    pub metadata_lock_instrumentation_enabled: bool,
    pub supports_deadlock_detection: bool,
    pub supports_mdl_deadlock_detection: bool,
    pub supports_returning: bool,
    pub supports_bloom_filter: bool,
    pub supports_hyper_log_log: bool,
    pub supports_fast_checksum: bool,
    pub lower_case_table_name_mode: i32,
    pub udf: UdfExtension,
}
