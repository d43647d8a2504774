use async_trait::async_trait;
use std::collections::HashMap;

use super::builtin;
use crate::core::runtime_context::RuntimeContext;
use crate::data::{DataBundle, ItemBatch};
use crate::error::NodeResult;
use crate::graph::Node;

/// What a node run produces: one [`ItemBatch`] per output branch, or `None`
/// for an explicit empty success — the branch ends, nothing propagates.
pub type NodeOutput = Option<Vec<ItemBatch>>;

/// The plugin boundary to node implementations. Given the node's parameters
/// and an assembled input bundle, produce outputs or an error; the engine
/// never looks inside.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        node: &Node,
        input: &DataBundle,
        context: &RuntimeContext,
    ) -> NodeResult<NodeOutput>;
}

/// Registry of node executors by node type string. Populated from a static
/// manifest at startup and injected into the engine; no dynamic discovery.
pub struct NodeExecutorRegistry {
    executors: HashMap<String, Box<dyn NodeExecutor>>,
}

impl NodeExecutorRegistry {
    /// An empty registry, for hosts that supply every executor themselves.
    pub fn empty() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// A registry pre-loaded with the built-in executors.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("no-op", Box::new(builtin::NoOpExecutor));
        registry.register("set", Box::new(builtin::SetExecutor));
        registry.register("if", Box::new(builtin::IfExecutor));
        registry.register("fail", Box::new(builtin::FailExecutor));
        registry.register("drop", Box::new(builtin::DropExecutor));
        registry
    }

    pub fn register(&mut self, node_type: &str, executor: Box<dyn NodeExecutor>) {
        self.executors.insert(node_type.to_string(), executor);
    }

    pub fn get(&self, node_type: &str) -> Option<&dyn NodeExecutor> {
        self.executors.get(node_type).map(|e| e.as_ref())
    }
}

impl Default for NodeExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
