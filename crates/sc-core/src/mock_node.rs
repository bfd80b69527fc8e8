//! Canned storage nodes for tests.
//!
//! [`MockNodeBuilder`] describes how a node answers the probe catalogue,
//! [`MockNode`] counts the queries it serves and can be reconfigured between
//! passes, and [`MockTopology`] wires a set of them into a
//! [`TopologyProvider`].

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::probe::executor::{ExecError, NodeConnection, ReadRoute, Row};
use crate::transcript::{Fault, NativeProcedure, NodeProfile, UdfProfile};
use crate::topology::{EngineType, NodeDescriptor, TopologyError, TopologyProvider};
use sc_common::NodeName;

pub const DEFAULT_MOCK_VERSION: &str = "8.0.32";

pub struct MockNodeBuilder {
    profile: NodeProfile,
    injected: Vec<(String, ExecError)>,
    latency: Option<Duration>,
}

impl MockNodeBuilder {
    pub fn new(name: impl Into<NodeName>) -> Self {
        let mut profile = NodeProfile::new(name);
        profile.version = Some(DEFAULT_MOCK_VERSION.to_string());
        MockNodeBuilder {
            profile,
            injected: Vec::new(),
            latency: None,
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.profile.version = Some(version.to_string());
        self
    }

    /// Answer `SELECT @@version` with NULL.
    pub fn null_version(mut self) -> Self {
        self.profile.version = None;
        self
    }

    pub fn variable(mut self, name: &str, value: &str) -> Self {
        self.profile
            .variables
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn status(mut self, name: &str, value: &str) -> Self {
        self.profile.status.insert(name.to_string(), value.to_string());
        self
    }

    pub fn open_ssl(self, enabled: bool) -> Self {
        if enabled {
            self.status("Rsa_public_key", "-----BEGIN PUBLIC KEY-----")
        } else {
            self
        }
    }

    pub fn lower_case_table_names(mut self, mode: i32) -> Self {
        self.profile.lower_case_table_names = mode;
        self
    }

    pub fn udf(mut self, version: &str, status: &str, functions: &str) -> Self {
        self.profile.udf = Some(UdfProfile {
            plugin_name: "polarx_udf".to_string(),
            version: version.to_string(),
            status: status.to_string(),
            function_list_variable: "polarx_udf_function_list".to_string(),
            functions: functions.to_string(),
        });
        self
    }

    pub fn native_procedure(mut self, schema: &str, name: &str) -> Self {
        self.profile
            .native_procedures
            .get_or_insert_with(Vec::new)
            .push(NativeProcedure {
                schema: schema.to_string(),
                name: name.to_string(),
            });
        self
    }

    pub fn mdl_privilege(mut self, granted: bool) -> Self {
        self.profile.mdl_privilege = granted;
        self
    }

    pub fn mdl_instrumentation(mut self, enabled: bool) -> Self {
        self.profile.mdl_instrumentation = enabled;
        self
    }

    /// Fail every statement containing `fragment`.
    pub fn fail_on(mut self, fragment: &str, error: ExecError) -> Self {
        self.injected.push((fragment.to_string(), error));
        self
    }

    pub fn fault(mut self, fault: Fault) -> Self {
        self.profile.faults.push(fault);
        self
    }

    /// Connection acquisition fails.
    pub fn unreachable(mut self) -> Self {
        self.profile.unreachable = true;
        self
    }

    /// Sleep before answering each query.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn profile(&self) -> &NodeProfile {
        &self.profile
    }

    pub fn build(self) -> MockNode {
        MockNode {
            unreachable: AtomicBool::new(self.profile.unreachable),
            profile: RwLock::new(self.profile),
            injected: Mutex::new(self.injected),
            latency: self.latency,
            queries: AtomicUsize::new(0),
        }
    }
}

pub struct MockNode {
    profile: RwLock<NodeProfile>,
    injected: Mutex<Vec<(String, ExecError)>>,
    unreachable: AtomicBool,
    latency: Option<Duration>,
    queries: AtomicUsize,
}

impl MockNode {
    pub fn name(&self) -> NodeName {
        self.profile.read().name.clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn is_unreachable(&self) -> bool {
        self.unreachable.load(Ordering::SeqCst)
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Replace how the node answers. The name is kept.
    pub fn reconfigure(&self, builder: MockNodeBuilder) {
        let mut profile = self.profile.write();
        let name = profile.name.clone();
        *profile = builder.profile;
        profile.name = name;
        *self.injected.lock() = builder.injected;
    }

    pub fn inject(&self, fragment: &str, error: ExecError) {
        self.injected.lock().push((fragment.to_string(), error));
    }

    pub fn clear_faults(&self) {
        self.injected.lock().clear();
        self.profile.write().faults.clear();
    }
}

impl NodeConnection for MockNode {
    fn query(&self, sql: &str, _route: ReadRoute) -> Result<Vec<Row>, ExecError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if let Some((_, err)) = self
            .injected
            .lock()
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            return Err(err.clone());
        }
        self.profile.read().answer(sql)
    }
}

#[derive(Default)]
pub struct MockTopology {
    nodes: Vec<(EngineType, Arc<MockNode>)>,
    discovery_error: Mutex<Option<TopologyError>>,
    discoveries: AtomicUsize,
}

impl MockTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(self, node: MockNode) -> Self {
        self.node_with_engine(node, EngineType::Sql)
    }

    pub fn node_with_engine(mut self, node: MockNode, engine: EngineType) -> Self {
        self.nodes.push((engine, Arc::new(node)));
        self
    }

    pub fn handle(&self, name: &str) -> Option<Arc<MockNode>> {
        self.nodes
            .iter()
            .find(|(_, n)| n.name().as_str() == name)
            .map(|(_, n)| Arc::clone(n))
    }

    /// Make `nodes()` fail until cleared with `None`.
    pub fn set_discovery_error(&self, err: Option<TopologyError>) {
        *self.discovery_error.lock() = err;
    }

    /// How many times `nodes()` was called.
    pub fn discoveries(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }

    pub fn total_queries(&self) -> usize {
        self.nodes.iter().map(|(_, n)| n.query_count()).sum()
    }
}

impl TopologyProvider for MockTopology {
    fn nodes(&self) -> Result<Vec<NodeDescriptor>, TopologyError> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.discovery_error.lock().clone() {
            return Err(err);
        }
        Ok(self
            .nodes
            .iter()
            .map(|(engine, n)| NodeDescriptor::new(n.name(), *engine))
            .collect())
    }

    fn connect(&self, node: &NodeName) -> Result<Arc<dyn NodeConnection>, TopologyError> {
        let (_, found) = self
            .nodes
            .iter()
            .find(|(_, n)| &n.name() == node)
            .ok_or_else(|| TopologyError::UnknownNode(node.clone()))?;
        if found.is_unreachable() {
            return Err(TopologyError::Connection {
                node: node.clone(),
                message: "connection refused".into(),
            });
        }
        Ok(Arc::clone(found) as Arc<dyn NodeConnection>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::sql;

    #[test]
    fn test_counts_queries() {
        let node = MockNodeBuilder::new("dn-0").build();
        node.query(sql::SELECT_VERSION, ReadRoute::Master).unwrap();
        node.query(sql::SHOW_RSA_PUBLIC_KEY, ReadRoute::Any).unwrap();
        assert_eq!(node.query_count(), 2);
    }

    #[test]
    fn test_injected_error_wins() {
        let node = MockNodeBuilder::new("dn-0")
            .fail_on("@@version", ExecError::ConnectionLost("gone".into()))
            .build();
        assert!(node.query(sql::SELECT_VERSION, ReadRoute::Master).is_err());
        node.clear_faults();
        assert!(node.query(sql::SELECT_VERSION, ReadRoute::Master).is_ok());
    }

    #[test]
    fn test_reconfigure_keeps_name() {
        let node = MockNodeBuilder::new("dn-0").build();
        node.reconfigure(MockNodeBuilder::new("other").version("5.6.10"));
        assert_eq!(node.name().as_str(), "dn-0");
        let rows = node.query(sql::SELECT_VERSION, ReadRoute::Master).unwrap();
        assert_eq!(rows[0].get(0), Some("5.6.10"));
    }

    #[test]
    fn test_topology_discovery_error() {
        let topology = MockTopology::new().node(MockNodeBuilder::new("dn-0").build());
        topology.set_discovery_error(Some(TopologyError::Unavailable("metadb down".into())));
        assert!(topology.nodes().is_err());
        topology.set_discovery_error(None);
        assert_eq!(topology.nodes().unwrap().len(), 1);
        assert_eq!(topology.discoveries(), 2);
    }

    #[test]
    fn test_unreachable_toggle() {
        let topology = MockTopology::new().node(MockNodeBuilder::new("dn-0").build());
        let handle = topology.handle("dn-0").unwrap();
        handle.set_unreachable(true);
        assert!(topology.connect(&"dn-0".into()).is_err());
        handle.set_unreachable(false);
        assert!(topology.connect(&"dn-0".into()).is_ok());
    }
}
