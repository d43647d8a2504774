//! Built-in executors. Deliberately small: real integrations live behind the
//! [`NodeExecutor`](super::NodeExecutor) boundary in host applications; these
//! cover wiring, demos, and tests.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::runtime_context::RuntimeContext;
use crate::data::{DataBundle, ExecutionRecord};
use crate::error::{NodeError, NodeResult};
use crate::graph::Node;

use super::executor::{NodeExecutor, NodeOutput};

fn input_batch(input: &DataBundle) -> Vec<ExecutionRecord> {
    input.first_main_batch().cloned().unwrap_or_default()
}

/// `no-op` — passes the first main input batch through unchanged.
pub struct NoOpExecutor;

#[async_trait]
impl NodeExecutor for NoOpExecutor {
    async fn execute(
        &self,
        _node: &Node,
        input: &DataBundle,
        _context: &RuntimeContext,
    ) -> NodeResult<NodeOutput> {
        Ok(Some(vec![input_batch(input)]))
    }
}

/// `set` — merges the object under `parameters.values` into every record.
pub struct SetExecutor;

#[async_trait]
impl NodeExecutor for SetExecutor {
    async fn execute(
        &self,
        node: &Node,
        input: &DataBundle,
        _context: &RuntimeContext,
    ) -> NodeResult<NodeOutput> {
        let values = node
            .parameters
            .get("values")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                NodeError::ConfigError("set node requires an object parameter \"values\"".into())
            })?;

        let mut batch = input_batch(input);
        if batch.is_empty() {
            batch.push(ExecutionRecord::empty());
        }
        for record in &mut batch {
            let Value::Object(map) = &mut record.json else {
                return Err(NodeError::TypeError(
                    "set node requires object-shaped records".into(),
                ));
            };
            for (key, value) in values {
                map.insert(key.clone(), value.clone());
            }
        }
        Ok(Some(vec![batch]))
    }
}

/// `if` — routes each record to output branch 0 (truthy) or 1 (falsy) based
/// on the field named by `parameters.field`. Both branches always exist.
pub struct IfExecutor;

#[async_trait]
impl NodeExecutor for IfExecutor {
    async fn execute(
        &self,
        node: &Node,
        input: &DataBundle,
        _context: &RuntimeContext,
    ) -> NodeResult<NodeOutput> {
        let field = node
            .parameters
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                NodeError::ConfigError("if node requires a string parameter \"field\"".into())
            })?;

        let mut truthy = Vec::new();
        let mut falsy = Vec::new();
        for record in input_batch(input) {
            let hit = match record.json.get(field) {
                Some(Value::Bool(b)) => *b,
                Some(Value::Null) | None => false,
                Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
                Some(Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            };
            if hit {
                truthy.push(record);
            } else {
                falsy.push(record);
            }
        }
        Ok(Some(vec![truthy, falsy]))
    }
}

/// `fail` — always errors, with `parameters.message` if given. Exists to
/// exercise error policy paths.
pub struct FailExecutor;

#[async_trait]
impl NodeExecutor for FailExecutor {
    async fn execute(
        &self,
        node: &Node,
        _input: &DataBundle,
        _context: &RuntimeContext,
    ) -> NodeResult<NodeOutput> {
        let message = node
            .parameters
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("fail node executed");
        Err(NodeError::ExecutionError(message.to_string()))
    }
}

/// `drop` — explicit empty success: the branch ends here.
pub struct DropExecutor;

#[async_trait]
impl NodeExecutor for DropExecutor {
    async fn execute(
        &self,
        _node: &Node,
        _input: &DataBundle,
        _context: &RuntimeContext,
    ) -> NodeResult<NodeOutput> {
        Ok(None)
    }
}
