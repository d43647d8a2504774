//! Node Invoker — runs one node's business logic and applies its error
//! policy.

use std::sync::Arc;

use crate::core::runtime_context::RuntimeContext;
use crate::data::{DataBundle, ItemBatch};
use crate::error::{ExecutionError, NodeError};
use crate::graph::Node;

use super::executor::NodeExecutorRegistry;

/// Outcome of one invocation, after error policy is applied.
#[derive(Debug)]
pub enum NodeRunResult {
    /// Success with one batch per output branch.
    Output(Vec<ItemBatch>),
    /// Explicit empty success: the branch ends, nothing propagates.
    End,
    /// The node failed but carries `continue_on_fail`: the error is recorded
    /// and the first main input batch passes through as the output.
    Recovered {
        error: ExecutionError,
        output: Option<Vec<ItemBatch>>,
    },
    /// The node failed and the run must halt at this checkpoint.
    Failed(ExecutionError),
}

/// One timed invocation record, consumed by the Run Controller to build the
/// node's TaskData.
#[derive(Debug)]
pub struct Invocation {
    pub start_time: i64,
    pub execution_time: i64,
    pub result: NodeRunResult,
}

pub struct NodeInvoker {
    registry: Arc<NodeExecutorRegistry>,
}

impl NodeInvoker {
    pub fn new(registry: Arc<NodeExecutorRegistry>) -> Self {
        Self { registry }
    }

    /// Invoke `node` with `input`. Never returns an `Err`: failures are
    /// folded into the [`NodeRunResult`] according to the node's policy.
    /// Graph validation resolves executors up front, so a missing executor
    /// here is a hard failure regardless of `continue_on_fail`.
    pub async fn invoke(
        &self,
        node: &Node,
        input: &DataBundle,
        context: &RuntimeContext,
    ) -> Invocation {
        let start_time = context.time_provider.now_millis();

        if node.disabled {
            // A disabled node is a transparent wire: its first main input
            // batch passes through untouched, or the branch ends when empty.
            let result = match input.first_main_batch() {
                Some(batch) => NodeRunResult::Output(vec![batch.clone()]),
                None => NodeRunResult::End,
            };
            return Invocation {
                start_time,
                execution_time: context.time_provider.now_millis() - start_time,
                result,
            };
        }

        let result = match self.registry.get(&node.node_type) {
            None => NodeRunResult::Failed(ExecutionError::from(NodeError::ConfigError(format!(
                "no executor registered for node type \"{}\"",
                node.node_type
            )))),
            Some(executor) => match executor.execute(node, input, context).await {
                Ok(Some(output)) => NodeRunResult::Output(output),
                Ok(None) => NodeRunResult::End,
                Err(e) if node.continue_on_fail => NodeRunResult::Recovered {
                    error: ExecutionError::from(&e),
                    output: input.first_main_batch().cloned().map(|batch| vec![batch]),
                },
                Err(e) => NodeRunResult::Failed(ExecutionError::from(&e)),
            },
        };

        Invocation {
            start_time,
            execution_time: context.time_provider.now_millis() - start_time,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ExecutionRecord;
    use serde_json::json;

    fn invoker() -> NodeInvoker {
        NodeInvoker::new(Arc::new(NodeExecutorRegistry::new()))
    }

    #[tokio::test]
    async fn test_failure_without_policy_halts() {
        let node = Node::new("f", "fail").with_parameters(json!({"message": "nope"}));
        let outcome = invoker()
            .invoke(
                &node,
                &DataBundle::single_main(vec![ExecutionRecord::empty()]),
                &RuntimeContext::default(),
            )
            .await;
        match outcome.result {
            NodeRunResult::Failed(error) => assert!(error.message.contains("nope")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_continue_on_fail_passes_input_through() {
        let node = Node::new("f", "fail").continue_on_fail();
        let input = DataBundle::single_main(vec![ExecutionRecord::from_json(json!({"keep": 1}))]);
        let outcome = invoker()
            .invoke(&node, &input, &RuntimeContext::default())
            .await;
        match outcome.result {
            NodeRunResult::Recovered { error, output } => {
                assert!(!error.message.is_empty());
                let output = output.unwrap();
                assert_eq!(output[0][0].json, json!({"keep": 1}));
            }
            other => panic!("expected Recovered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_continue_on_fail_without_input_recovers_empty() {
        let node = Node::new("f", "fail").continue_on_fail();
        let outcome = invoker()
            .invoke(&node, &DataBundle::new(), &RuntimeContext::default())
            .await;
        match outcome.result {
            NodeRunResult::Recovered { output, .. } => assert!(output.is_none()),
            other => panic!("expected Recovered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disabled_node_passes_input_through() {
        let node = Node::new("f", "fail")
            .with_parameters(json!({"message": "must never run"}))
            .disabled();
        let input = DataBundle::single_main(vec![ExecutionRecord::from_json(json!({"keep": 1}))]);
        let outcome = invoker()
            .invoke(&node, &input, &RuntimeContext::default())
            .await;
        match outcome.result {
            NodeRunResult::Output(output) => assert_eq!(output[0][0].json, json!({"keep": 1})),
            other => panic!("expected Output, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_executor_fails_even_with_continue_on_fail() {
        let node = Node::new("x", "does-not-exist").continue_on_fail();
        let outcome = invoker()
            .invoke(&node, &DataBundle::new(), &RuntimeContext::default())
            .await;
        assert!(matches!(outcome.result, NodeRunResult::Failed(_)));
    }
}
