//! The serializable error record attached to task and run results.

use serde::{Deserialize, Serialize};

use super::{NodeError, WorkflowError};

/// Error captured against a node invocation or a whole run. Unlike
/// [`NodeError`]/[`WorkflowError`] this is plain data: it survives
/// serialization of [`RunExecutionData`](crate::core::run_data::RunExecutionData)
/// and is what callers and observers see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<&NodeError> for ExecutionError {
    fn from(e: &NodeError) -> Self {
        ExecutionError::new(e.to_string())
    }
}

impl From<NodeError> for ExecutionError {
    fn from(e: NodeError) -> Self {
        ExecutionError::from(&e)
    }
}

impl From<&WorkflowError> for ExecutionError {
    fn from(e: &WorkflowError) -> Self {
        ExecutionError::new(e.to_string())
    }
}

impl From<WorkflowError> for ExecutionError {
    fn from(e: WorkflowError) -> Self {
        ExecutionError::from(&e)
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
