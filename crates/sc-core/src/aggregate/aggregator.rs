//! Runs one capability pass over the topology.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, Span};

use super::fold::{CapabilityFold, ClusterCapabilities};
use super::rules::GlobalContext;
use crate::logging::{event_names, Stage};
use crate::probe::set::ProbeError;
use crate::snapshot::{NodeCapabilitySnapshot, ProbeOptions};
use crate::topology::{NodeDescriptor, TopologyError, TopologyProvider};
use sc_common::NodeName;

/// Why a pass (or a point query) failed. `Clone` so every caller waiting on
/// the same pass receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("node '{node}': {source}")]
    Probe {
        node: NodeName,
        #[source]
        source: ProbeError,
    },

    #[error("node '{0}' has no capability snapshot")]
    NodeNotFound(NodeName),

    #[error("capability initialization failed: {0}")]
    Initialization(String),
}

impl From<CapabilityError> for sc_common::Error {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::Topology(TopologyError::Connection { node, message }) => {
                sc_common::Error::ConnectionUnavailable {
                    node: node.to_string(),
                    message,
                }
            }
            CapabilityError::Topology(TopologyError::UnknownNode(node))
            | CapabilityError::NodeNotFound(node) => sc_common::Error::NodeNotFound {
                node: node.to_string(),
            },
            CapabilityError::Topology(other) => sc_common::Error::Topology(other.to_string()),
            CapabilityError::Probe {
                node,
                source: ProbeError::Malformed { probe, message },
            } => sc_common::Error::MalformedResponse {
                node: node.to_string(),
                probe: probe.to_string(),
                message,
            },
            CapabilityError::Probe {
                node,
                source: ProbeError::Exec { probe, source },
            } => sc_common::Error::ProbeFailed {
                node: node.to_string(),
                probe: probe.to_string(),
                message: source.to_string(),
            },
            CapabilityError::Initialization(message) => {
                sc_common::Error::InitializationFailed(message)
            }
        }
    }
}

/// A successful pass: the published flags plus what fed them.
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub capabilities: ClusterCapabilities,
    /// Probed nodes, in topology order.
    pub snapshots: Vec<(NodeName, Arc<NodeCapabilitySnapshot>)>,
    /// Non-SQL nodes that were left out of the fold.
    pub skipped: Vec<NodeName>,
}

#[derive(Clone)]
pub struct CapabilityAggregator {
    topology: Arc<dyn TopologyProvider>,
    options: ProbeOptions,
    parallelism: usize,
}

impl CapabilityAggregator {
    pub fn new(topology: Arc<dyn TopologyProvider>, options: ProbeOptions) -> Self {
        CapabilityAggregator {
            topology,
            options,
            parallelism: 1,
        }
    }

    /// Probe up to `parallelism` nodes at once. Values below 1 mean sequential.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn topology(&self) -> &Arc<dyn TopologyProvider> {
        &self.topology
    }

    /// Connect to one node and build its snapshot.
    pub fn probe_node(&self, name: &NodeName) -> Result<NodeCapabilitySnapshot, CapabilityError> {
        let conn = self.topology.connect(name)?;
        NodeCapabilitySnapshot::probe(conn.as_ref(), &self.options).map_err(|source| {
            CapabilityError::Probe {
                node: name.clone(),
                source,
            }
        })
    }

    /// Probe every SQL node and fold the results.
    ///
    /// The first failure in topology order aborts the pass.
    pub fn run(&self, ctx: &GlobalContext) -> Result<AggregationOutcome, CapabilityError> {
        let descriptors = self.topology.nodes()?;
        let (sql, other): (Vec<NodeDescriptor>, Vec<NodeDescriptor>) =
            descriptors.into_iter().partition(NodeDescriptor::is_sql);

        for node in &other {
            info!(
                event = event_names::NODE_SKIPPED,
                node = %node.name,
                engine = %node.engine_type,
                "non-SQL node left out of the fold"
            );
        }

        let mut fold = CapabilityFold::new();
        let mut snapshots = Vec::with_capacity(sql.len());
        for chunk in sql.chunks(self.parallelism) {
            let probed = if chunk.len() == 1 {
                vec![self.probe_traced(&chunk[0].name)]
            } else {
                self.probe_chunk(chunk)?
            };

            let mut partial = CapabilityFold::new();
            for (descriptor, result) in chunk.iter().zip(probed) {
                let snapshot = Arc::new(result?);
                partial.absorb(&snapshot);
                snapshots.push((descriptor.name.clone(), snapshot));
            }
            fold.merge(&partial);
        }

        let capabilities = fold.finish(ctx);
        debug!(
            event = event_names::CLUSTER_FOLDED,
            stage = %Stage::Fold,
            nodes = fold.node_count() as u64,
            skipped = other.len() as u64,
            "cluster capabilities folded"
        );

        Ok(AggregationOutcome {
            capabilities,
            snapshots,
            skipped: other.into_iter().map(|d| d.name).collect(),
        })
    }

    fn probe_traced(&self, name: &NodeName) -> Result<NodeCapabilitySnapshot, CapabilityError> {
        let span = info_span!("node", node = %name);
        let _guard = span.enter();
        let snapshot = self.probe_node(name)?;
        debug!(
            event = event_names::NODE_PROBED,
            version = snapshot.version(),
            "node probed"
        );
        Ok(snapshot)
    }

    /// One scoped thread per node. Results come back in chunk order.
    fn probe_chunk(
        &self,
        chunk: &[NodeDescriptor],
    ) -> Result<Vec<Result<NodeCapabilitySnapshot, CapabilityError>>, CapabilityError> {
        let parent = Span::current();
        std::thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|descriptor| {
                    let parent = parent.clone();
                    scope.spawn(move || {
                        let _entered = parent.enter();
                        self.probe_traced(&descriptor.name)
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(chunk)
                .map(|(handle, descriptor)| {
                    handle.join().map_err(|_| {
                        CapabilityError::Initialization(format!(
                            "probe thread for '{}' panicked",
                            descriptor.name
                        ))
                    })
                })
                .collect()
        })
    }
}
