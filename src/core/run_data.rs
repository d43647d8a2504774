//! Durable run state — the unit that gets checkpointed, resumed, and
//! returned to callers.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::waiting::WaitingExecution;
use crate::data::DataBundle;
use crate::error::ExecutionError;

/// Unique identifier of one run, assigned by the Active-Run Registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub String);

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What triggered a run. Carried on the final [`Run`] and the registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Manual,
    Trigger,
    Webhook,
    Retry,
    Internal,
}

/// One queued invocation unit: a node plus its assembled input bundle.
/// Consumed exactly once by the Node Invoker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteData {
    pub node: String,
    pub data: DataBundle,
}

/// Record of one node invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskData {
    /// Epoch milliseconds at invocation start.
    pub start_time: i64,
    /// Elapsed wall-clock milliseconds.
    pub execution_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    /// Output bundle on success (also set for recovered continue-on-fail runs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataBundle>,
}

/// Completed tasks per node name, one entry per repetition (run index).
pub type RunData = HashMap<String, Vec<TaskData>>;

/// How the run was seeded and scoped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartData {
    /// Propagation stops growing past this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_node: Option<String>,
    /// Whitelist of node names eligible to execute, used for partial runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_node_filter: Option<Vec<String>>,
}

/// Results accumulated while the loop runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultData {
    #[serde(default)]
    pub run_data: RunData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_node_executed: Option<String>,
    /// Terminal node failure that halted the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

/// The engine's working memory: pending work plus partially-satisfied joins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub node_execution_stack: VecDeque<ExecuteData>,
    #[serde(default)]
    pub waiting_execution: WaitingExecution,
}

/// The resumable state of one execution — the sole state the Run Controller
/// loop mutates, and the payload exchanged with the persistence boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunExecutionData {
    #[serde(default)]
    pub start_data: StartData,
    #[serde(default)]
    pub result_data: ResultData,
    #[serde(default)]
    pub execution_data: ExecutionState,
}

impl RunExecutionData {
    /// Repetition count for a node: how many times it has already completed.
    pub fn run_index(&self, node: &str) -> usize {
        self.result_data
            .run_data
            .get(node)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn record_task(&mut self, node: &str, task: TaskData) {
        self.result_data
            .run_data
            .entry(node.to_string())
            .or_default()
            .push(task);
    }
}

/// Final result of a run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub data: RunExecutionData,
    pub mode: ExecutionMode,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    /// True only when the run drained cleanly with no terminal error.
    pub finished: bool,
    /// Engine fault (stall, dangling reference mid-run, exceeded limits).
    /// Node failures live in `data.result_data.error` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}
