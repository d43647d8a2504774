//! Workflow-level error types.

use super::NodeError;
use thiserror::Error;

/// Workflow-level errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Graph build error: {0}")]
    GraphBuildError(String),
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    #[error("Node executor not found for type: {0}")]
    ExecutorNotFound(String),
    #[error("Node \"{source_node}\" connects to unknown node \"{destination}\"")]
    DanglingConnection {
        source_node: String,
        destination: String,
    },
    #[error("Execution stopped because it seems to be in an endless loop (node \"{node}\", run {run_index})")]
    EndlessLoop { node: String, run_index: usize },
    #[error("Max steps exceeded: {0}")]
    MaxStepsExceeded(u64),
    #[error("Execution timeout")]
    ExecutionTimeout,
    #[error("No prior run data for node \"{node}\" to resume from")]
    MissingRunData { node: String },
    #[error("Node error: {0}")]
    NodeError(Box<NodeError>),
}

impl From<NodeError> for WorkflowError {
    fn from(value: NodeError) -> Self {
        WorkflowError::NodeError(Box::new(value))
    }
}
