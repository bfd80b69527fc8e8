//! Structured event definitions for logging.
//!
//! Every JSONL line is one [`LogEvent`]. Correlation comes from the enclosing
//! `pass` span (`pass_id`, `stage`) and, during probing, the `node` span.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Phases of a capability pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Config load and manager construction.
    Init,
    /// Enumerating topology nodes.
    Discover,
    /// Running probes against one node.
    Probe,
    /// Folding node snapshots into cluster flags.
    Fold,
    /// Swapping new flags and node cache into place.
    Publish,
    /// Clearing state for re-initialization.
    Reset,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Discover => "discover",
            Stage::Probe => "probe",
            Stage::Fold => "fold",
            Stage::Publish => "publish",
            Stage::Reset => "reset",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable event names, emitted as the `event` field.
pub mod event_names {
    pub const CONFIG_LOADED: &str = "config.loaded";

    pub const PASS_STARTED: &str = "pass.started";
    pub const PASS_FINISHED: &str = "pass.finished";
    pub const PASS_FAILED: &str = "pass.failed";

    pub const NODE_PROBED: &str = "node.probed";
    pub const NODE_SKIPPED: &str = "node.skipped";
    pub const PROBE_NEGATIVE: &str = "probe.negative";
    pub const HEARTBEAT_RECHECKED: &str = "heartbeat.rechecked";

    pub const CLUSTER_FOLDED: &str = "cluster.folded";

    pub const CACHE_RESET: &str = "cache.reset";
}

/// One JSONL log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name, or the tracing target when the event carries none.
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(level: Level, event: impl Into<String>, message: impl Into<String>) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            pass_id: None,
            stage: None,
            node: None,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_pass_id(mut self, pass_id: impl Into<String>) -> Self {
        self.pass_id = Some(pass_id.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}
