use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A unit of work in the graph. Immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique within a graph.
    pub name: String,

    /// Registry key resolving to a [`NodeExecutor`](crate::nodes::NodeExecutor).
    #[serde(rename = "type")]
    pub node_type: String,

    /// Arbitrary executor-specific parameters.
    #[serde(default)]
    pub parameters: Value,

    /// Disabled nodes do not count as valid upstream sources.
    #[serde(default)]
    pub disabled: bool,

    /// On error, pass the first main input batch through instead of halting.
    #[serde(default)]
    pub continue_on_fail: bool,
}

impl Node {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            parameters: Value::Object(serde_json::Map::new()),
            disabled: false,
            continue_on_fail: false,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn continue_on_fail(mut self) -> Self {
        self.continue_on_fail = true;
        self
    }
}

/// One end of an edge as seen from the opposite side: in the by-source index
/// this names the destination (and its input slot), in the by-destination
/// index it names the source (and its output branch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub node: String,
    pub port: String,
    pub index: usize,
}

/// Connections per port, indexed by branch: `port -> branch index -> edges`.
pub type PortConnections = HashMap<String, Vec<Vec<Connection>>>;

/// A directed edge as supplied by the caller when building a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    pub source: String,
    pub source_port: String,
    pub source_index: usize,
    pub destination: String,
    pub destination_port: String,
    pub destination_index: usize,
}

impl ConnectionSpec {
    /// An edge on the first `main` branch of both ends.
    pub fn main(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(source, 0, destination, 0)
    }

    /// A `main`-port edge between the given branch indices.
    pub fn new(
        source: impl Into<String>,
        source_index: usize,
        destination: impl Into<String>,
        destination_index: usize,
    ) -> Self {
        Self {
            source: source.into(),
            source_port: crate::data::MAIN_PORT.to_string(),
            source_index,
            destination: destination.into(),
            destination_port: crate::data::MAIN_PORT.to_string(),
            destination_index,
        }
    }
}
