//! Lifecycle-gated access to cluster capabilities.
//!
//! The first gated read runs a full pass on the calling thread. Concurrent
//! first readers wait on the pass lock and share its outcome. Reads after
//! that are lock-free: one atomic state load plus an `ArcSwap` load.
//!
//! `is_read_only` and `is_lower_case_table_names` are not gated and return
//! whatever was last published, which is `false` before the first pass.

use arc_swap::{ArcSwap, ArcSwapOption};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn};

use crate::aggregate::{
    AggregationOutcome, CapabilityAggregator, CapabilityError, ClusterCapabilities, GlobalContext,
};
use crate::logging::{event_names, Stage};
use crate::probe::set;
use crate::snapshot::{NodeCapabilitySnapshot, ProbeOptions};
use crate::topology::{
    DeploymentModeProvider, MetadataProtocolDetector, StaticDeployment, TopologyProvider,
};
use sc_common::{NodeName, PassId};
use sc_config::CapabilityConfig;

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            INITIALIZING => LifecycleState::Initializing,
            READY => LifecycleState::Ready,
            _ => LifecycleState::Uninitialized,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "uninitialized"),
            LifecycleState::Initializing => write!(f, "initializing"),
            LifecycleState::Ready => write!(f, "ready"),
        }
    }
}

/// Held for the duration of a pass. Outcome of the most recent pass.
#[derive(Debug, Default)]
struct PassSlot {
    last_error: Option<CapabilityError>,
}

pub struct StorageCapabilityManager {
    aggregator: CapabilityAggregator,
    metadata: Arc<dyn MetadataProtocolDetector>,
    deployment: Arc<dyn DeploymentModeProvider>,
    state: AtomicU8,
    /// Completed passes, successful or not. Bumped under the pass lock.
    generation: AtomicU64,
    pass_lock: Mutex<PassSlot>,
    last_pass: ArcSwapOption<PassId>,
    flags: ArcSwap<ClusterCapabilities>,
    nodes: DashMap<NodeName, Arc<NodeCapabilitySnapshot>>,
    skipped: ArcSwap<Vec<NodeName>>,
}

impl StorageCapabilityManager {
    /// Build a manager whose deployment facts come from `config`.
    pub fn new(topology: Arc<dyn TopologyProvider>, config: &CapabilityConfig) -> Self {
        let deployment = Arc::new(StaticDeployment::from(config));
        Self::from_parts(
            topology,
            deployment.clone(),
            deployment,
            ProbeOptions::from(config),
            config.probe.parallelism,
        )
    }

    pub fn from_parts(
        topology: Arc<dyn TopologyProvider>,
        metadata: Arc<dyn MetadataProtocolDetector>,
        deployment: Arc<dyn DeploymentModeProvider>,
        options: ProbeOptions,
        parallelism: usize,
    ) -> Self {
        StorageCapabilityManager {
            aggregator: CapabilityAggregator::new(topology, options).with_parallelism(parallelism),
            metadata,
            deployment,
            state: AtomicU8::new(UNINITIALIZED),
            generation: AtomicU64::new(0),
            pass_lock: Mutex::new(PassSlot::default()),
            last_pass: ArcSwapOption::empty(),
            flags: ArcSwap::from_pointee(ClusterCapabilities::default()),
            nodes: DashMap::new(),
            skipped: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of passes that have finished, including failed ones.
    pub fn passes(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// ID of the most recent pass, if any has run since construction.
    /// Does not wait for an in-flight pass.
    pub fn last_pass_id(&self) -> Option<PassId> {
        self.last_pass.load_full().map(|id| (*id).clone())
    }

    fn ensure_ready(&self) -> Result<(), CapabilityError> {
        // Generation first: a pass that fails after the state load below must
        // still count as one this caller waited on.
        let seen = self.generation.load(Ordering::Acquire);
        if self.state.load(Ordering::Acquire) == READY {
            return Ok(());
        }

        let mut slot = self.pass_lock.lock();
        if self.state.load(Ordering::Acquire) == READY {
            return Ok(());
        }
        // A pass finished while we waited for the lock and did not publish.
        if self.generation.load(Ordering::Acquire) != seen {
            if let Some(err) = &slot.last_error {
                return Err(err.clone());
            }
        }
        self.run_pass(&mut slot, UNINITIALIZED)
    }

    /// Run one pass with the pass lock held. On failure the state returns to
    /// `restore` and published flags are left untouched.
    fn run_pass(&self, slot: &mut PassSlot, restore: u8) -> Result<(), CapabilityError> {
        let pass_id = PassId::new();
        let span = info_span!("pass", pass_id = %pass_id, stage = %Stage::Probe);
        let _guard = span.enter();

        // A refresh of a ready manager keeps readers on the lock-free path.
        if restore != READY {
            self.state.store(INITIALIZING, Ordering::Release);
        }
        let ctx = GlobalContext {
            read_only: self.deployment.is_read_only(),
            metadata_extended_protocol: self.metadata.uses_extended_protocol(),
        };
        info!(
            event = event_names::PASS_STARTED,
            stage = %Stage::Discover,
            read_only = ctx.read_only,
            metadata_extended_protocol = ctx.metadata_extended_protocol,
            "capability pass started"
        );

        let started = Instant::now();
        let result = self.aggregator.run(&ctx);
        self.last_pass.store(Some(Arc::new(pass_id)));

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    event = event_names::PASS_FAILED,
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "capability pass failed; keeping previous flags"
                );
                self.state.store(restore, Ordering::Release);
                slot.last_error = Some(err.clone());
                self.generation.fetch_add(1, Ordering::AcqRel);
                return Err(err);
            }
        };

        self.publish(outcome);
        slot.last_error = None;
        self.state.store(READY, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        info!(
            event = event_names::PASS_FINISHED,
            stage = %Stage::Publish,
            nodes = self.nodes.len() as u64,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "capability pass finished"
        );
        Ok(())
    }

    fn publish(&self, outcome: AggregationOutcome) {
        let AggregationOutcome {
            capabilities,
            snapshots,
            skipped,
        } = outcome;
        let fresh: std::collections::HashSet<NodeName> =
            snapshots.iter().map(|(name, _)| name.clone()).collect();
        for (name, snapshot) in snapshots {
            self.nodes.insert(name, snapshot);
        }
        self.nodes.retain(|name, _| fresh.contains(name));
        self.skipped.store(Arc::new(skipped));
        self.flags.store(Arc::new(capabilities));
    }

    fn gated(&self, read: impl FnOnce(&ClusterCapabilities) -> bool) -> Result<bool, CapabilityError> {
        self.ensure_ready()?;
        Ok(read(&**self.flags.load()))
    }

    /// The whole aggregate, running the first pass if needed.
    pub fn capabilities(&self) -> Result<Arc<ClusterCapabilities>, CapabilityError> {
        self.ensure_ready()?;
        Ok(self.flags.load_full())
    }

    /// Last published aggregate. Never triggers a pass.
    pub fn cached(&self) -> Arc<ClusterCapabilities> {
        self.flags.load_full()
    }

    pub fn supports_distributed_tx(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_distributed_tx)
    }

    pub fn supports_global_timestamp(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_global_timestamp)
    }

    pub fn supports_global_timestamp_heartbeat(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_global_timestamp_heartbeat)
    }

    pub fn supports_commit_timestamp_tx(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_commit_timestamp_tx)
    }

    pub fn supports_deadlock_detection(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_deadlock_detection)
    }

    pub fn supports_mdl_deadlock_detection(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_mdl_deadlock_detection)
    }

    pub fn supports_bloom_filter(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_bloom_filter)
    }

    pub fn supports_hyper_log_log(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_hyper_log_log)
    }

    pub fn supports_fast_checksum(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_fast_checksum)
    }

    pub fn supports_open_ssl(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_open_ssl)
    }

    pub fn supports_shared_read_view(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_shared_read_view)
    }

    pub fn supports_returning(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.supports_returning)
    }

    pub fn is_legacy_version(&self) -> Result<bool, CapabilityError> {
        self.gated(|c| c.legacy_version)
    }

    /// Not gated: `false` until a pass has published.
    pub fn is_read_only(&self) -> bool {
        self.flags.load().read_only
    }

    /// Not gated: `false` until a pass has published.
    pub fn is_lower_case_table_names(&self) -> bool {
        self.flags.load().lower_case_table_names
    }

    /// Raw probe values for one node.
    pub fn node(&self, name: &NodeName) -> Result<Arc<NodeCapabilitySnapshot>, CapabilityError> {
        self.ensure_ready()?;
        self.nodes
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CapabilityError::NodeNotFound(name.clone()))
    }

    /// Every cached node snapshot, sorted by name.
    pub fn node_snapshots(&self) -> Vec<(NodeName, Arc<NodeCapabilitySnapshot>)> {
        let mut all: Vec<_> = self
            .nodes
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Non-SQL nodes left out of the last published pass.
    pub fn skipped_nodes(&self) -> Arc<Vec<NodeName>> {
        self.skipped.load_full()
    }

    /// Re-run the heartbeat probe on one cached node and update its snapshot.
    /// The cluster flag is not recomputed until the next pass.
    pub fn recheck_heartbeat(&self, name: &NodeName) -> Result<bool, CapabilityError> {
        let snapshot = self.node(name)?;
        let conn = self.aggregator.topology().connect(name)?;
        let supported = set::probe_timestamp_heartbeat(conn.as_ref()).map_err(|source| {
            CapabilityError::Probe {
                node: name.clone(),
                source,
            }
        })?;
        let previous = snapshot.refine_heartbeat(supported);
        info!(
            event = event_names::HEARTBEAT_RECHECKED,
            node = %name,
            previous,
            supported,
            "heartbeat support rechecked"
        );
        Ok(supported)
    }

    /// Run a new pass now. Readers see the old flags until the new ones are
    /// published; on failure the old flags stay.
    pub fn refresh(&self) -> Result<Arc<ClusterCapabilities>, CapabilityError> {
        let mut slot = self.pass_lock.lock();
        let restore = match self.state.load(Ordering::Acquire) {
            READY => READY,
            _ => UNINITIALIZED,
        };
        self.run_pass(&mut slot, restore)?;
        Ok(self.flags.load_full())
    }

    /// Drop the node cache and flags and return to `Uninitialized`.
    /// Waits for an in-flight pass to finish first.
    pub fn reset(&self) {
        let mut slot = self.pass_lock.lock();
        self.nodes.clear();
        self.skipped.store(Arc::new(Vec::new()));
        self.flags.store(Arc::new(ClusterCapabilities::default()));
        slot.last_error = None;
        self.state.store(UNINITIALIZED, Ordering::Release);
        info!(
            event = event_names::CACHE_RESET,
            stage = %Stage::Reset,
            "capability cache reset"
        );
    }
}

impl std::fmt::Debug for StorageCapabilityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCapabilityManager")
            .field("state", &self.state())
            .field("passes", &self.passes())
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}
