//! Graph model — nodes, typed connections, and the derived lookup indices
//! the execution loop queries.
//!
//! A [`Graph`] is immutable once built. Both directional indices (by-source
//! and by-destination) are derived from the same connection list at build
//! time, so they cannot drift apart, and every connection endpoint is
//! verified against the node set before any run starts.

pub mod traversal;
pub mod types;

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};

use crate::error::{WorkflowError, WorkflowResult};
use crate::nodes::NodeExecutorRegistry;

pub use types::{Connection, ConnectionSpec, Node, PortConnections};

#[derive(Debug)]
pub struct Graph {
    nodes: HashMap<String, Node>,
    /// Insertion order, for deterministic start-node ordering.
    node_order: Vec<String>,
    by_source: HashMap<String, PortConnections>,
    by_destination: HashMap<String, PortConnections>,
    dag: StableDiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl Graph {
    /// Build a graph from nodes and connections. Dangling endpoint references
    /// are configuration errors raised here, before any execution.
    pub fn new(nodes: Vec<Node>, connections: Vec<ConnectionSpec>) -> WorkflowResult<Self> {
        let mut node_map = HashMap::new();
        let mut node_order = Vec::with_capacity(nodes.len());
        let mut dag = StableDiGraph::new();
        let mut indices = HashMap::new();

        for node in nodes {
            if node_map.contains_key(&node.name) {
                return Err(WorkflowError::GraphBuildError(format!(
                    "duplicate node name \"{}\"",
                    node.name
                )));
            }
            let idx = dag.add_node(node.name.clone());
            indices.insert(node.name.clone(), idx);
            node_order.push(node.name.clone());
            node_map.insert(node.name.clone(), node);
        }

        let mut by_source: HashMap<String, PortConnections> = HashMap::new();
        let mut by_destination: HashMap<String, PortConnections> = HashMap::new();

        for spec in connections {
            if !node_map.contains_key(&spec.source) {
                return Err(WorkflowError::GraphBuildError(format!(
                    "connection references unknown source node \"{}\"",
                    spec.source
                )));
            }
            if !node_map.contains_key(&spec.destination) {
                return Err(WorkflowError::DanglingConnection {
                    source_node: spec.source,
                    destination: spec.destination,
                });
            }

            slot_mut(
                &mut by_source,
                &spec.source,
                &spec.source_port,
                spec.source_index,
            )
            .push(Connection {
                node: spec.destination.clone(),
                port: spec.destination_port.clone(),
                index: spec.destination_index,
            });

            slot_mut(
                &mut by_destination,
                &spec.destination,
                &spec.destination_port,
                spec.destination_index,
            )
            .push(Connection {
                node: spec.source.clone(),
                port: spec.source_port.clone(),
                index: spec.source_index,
            });

            dag.add_edge(indices[&spec.source], indices[&spec.destination], ());
        }

        Ok(Self {
            nodes: node_map,
            node_order,
            by_source,
            by_destination,
            dag,
            indices,
        })
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.node_order.iter().map(String::as_str)
    }

    /// Outgoing edges of a node: `port -> output branch -> destinations`.
    pub fn source_connections(&self, name: &str) -> Option<&PortConnections> {
        self.by_source.get(name)
    }

    /// Incoming edges of a node: `port -> input branch -> sources`.
    pub fn destination_connections(&self, name: &str) -> Option<&PortConnections> {
        self.by_destination.get(name)
    }

    /// Incoming `main` input slots of a node, indexed by input branch.
    pub fn main_inputs(&self, name: &str) -> Option<&Vec<Vec<Connection>>> {
        self.by_destination.get(name)?.get(crate::data::MAIN_PORT)
    }

    pub fn has_main_input(&self, name: &str) -> bool {
        self.main_inputs(name).is_some_and(|slots| !slots.is_empty())
    }

    /// Valid entry points for a run. Without a destination these are the
    /// graph roots; with one, the root frontier of the destination's
    /// ancestor closure (the destination itself if that frontier is empty).
    pub fn start_nodes(&self, destination: Option<&str>) -> WorkflowResult<Vec<&Node>> {
        let names = traversal::start_node_names(self, destination)?;
        Ok(names
            .into_iter()
            .map(|name| &self.nodes[&name])
            .collect())
    }

    /// Full upstream closure of a node (the node itself excluded).
    pub fn parent_nodes(&self, name: &str) -> WorkflowResult<Vec<String>> {
        traversal::parent_nodes(self, name)
    }

    /// Enabled topmost sources feeding one input slot. An empty result means
    /// every upstream chain into the slot is disabled, so the slot can never
    /// receive data and the loop treats it as satisfied.
    pub fn highest_enabled_sources(
        &self,
        name: &str,
        port: &str,
        input_index: Option<usize>,
    ) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.collect_highest(name, port, input_index, &mut visited, &mut out);
        out
    }

    fn collect_highest(
        &self,
        name: &str,
        port: &str,
        input_index: Option<usize>,
        visited: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }
        let Some(slots) = self.by_destination.get(name).and_then(|ports| ports.get(port)) else {
            return;
        };

        let chosen: Vec<&Connection> = match input_index {
            Some(index) => slots
                .get(index)
                .map(|slot| slot.iter().collect())
                .unwrap_or_default(),
            None => slots.iter().flatten().collect(),
        };

        for conn in chosen {
            let Some(source) = self.nodes.get(&conn.node) else {
                continue;
            };
            let before = out.len();
            self.collect_highest(&conn.node, port, None, visited, out);
            if out.len() == before && !source.disabled && !out.contains(&conn.node) {
                out.push(conn.node.clone());
            }
        }
    }

    /// Verify every enabled node's type resolves to a registered executor.
    /// Raised before the loop starts; an unresolvable type is never retried.
    pub fn check_ready(&self, registry: &NodeExecutorRegistry) -> WorkflowResult<()> {
        for name in &self.node_order {
            let node = &self.nodes[name];
            if !node.disabled && registry.get(&node.node_type).is_none() {
                return Err(WorkflowError::ExecutorNotFound(node.node_type.clone()));
            }
        }
        Ok(())
    }

    pub(crate) fn dag(&self) -> &StableDiGraph<String, ()> {
        &self.dag
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.indices.get(name).copied()
    }
}

fn slot_mut<'a>(
    map: &'a mut HashMap<String, PortConnections>,
    node: &str,
    port: &str,
    index: usize,
) -> &'a mut Vec<Connection> {
    let slots = map
        .entry(node.to_string())
        .or_default()
        .entry(port.to_string())
        .or_default();
    if slots.len() <= index {
        slots.resize_with(index + 1, Vec::new);
    }
    &mut slots[index]
}
