//! Push-notification channel for UI observers.
//!
//! [`PushHook`] bridges the hook dispatcher onto a tokio mpsc channel of
//! serializable [`ExecutionEvent`]s; transport beyond the channel (websocket,
//! SSE) is the consumer's concern.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use async_trait::async_trait;

use crate::core::hooks::{HookResult, LifecycleHook};
use crate::core::run_data::{ExecutionId, Run, TaskData};
use crate::core::runtime_context::TimeProvider;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutionEvent {
    ExecutionStarted {
        execution_id: ExecutionId,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        execution_id: ExecutionId,
        node_name: String,
        timestamp: DateTime<Utc>,
    },
    NodeFinished {
        execution_id: ExecutionId,
        node_name: String,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    ExecutionFinished {
        execution_id: ExecutionId,
        finished: bool,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

pub type EventSender = mpsc::UnboundedSender<ExecutionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Forwards lifecycle hook calls as [`ExecutionEvent`]s. Send failures mean
/// the receiver is gone; they surface as hook errors and get logged, never
/// propagated into the run.
pub struct PushHook {
    tx: EventSender,
    time_provider: Arc<dyn TimeProvider>,
}

impl PushHook {
    pub fn new(tx: EventSender, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { tx, time_provider }
    }

    fn send(&self, event: ExecutionEvent) -> HookResult {
        self.tx
            .send(event)
            .map_err(|e| crate::core::hooks::HookError(e.to_string()))
    }
}

#[async_trait]
impl LifecycleHook for PushHook {
    async fn workflow_execute_before(&self, execution_id: &ExecutionId) -> HookResult {
        self.send(ExecutionEvent::ExecutionStarted {
            execution_id: execution_id.clone(),
            timestamp: self.time_provider.now_utc(),
        })
    }

    async fn node_execute_before(
        &self,
        execution_id: &ExecutionId,
        node_name: &str,
    ) -> HookResult {
        self.send(ExecutionEvent::NodeStarted {
            execution_id: execution_id.clone(),
            node_name: node_name.to_string(),
            timestamp: self.time_provider.now_utc(),
        })
    }

    async fn node_execute_after(
        &self,
        execution_id: &ExecutionId,
        node_name: &str,
        task: &TaskData,
    ) -> HookResult {
        self.send(ExecutionEvent::NodeFinished {
            execution_id: execution_id.clone(),
            node_name: node_name.to_string(),
            error: task.error.as_ref().map(|e| e.message.clone()),
            timestamp: self.time_provider.now_utc(),
        })
    }

    async fn workflow_execute_after(&self, run: &Run, execution_id: &ExecutionId) -> HookResult {
        let error = run
            .error
            .as_ref()
            .or(run.data.result_data.error.as_ref())
            .map(|e| e.message.clone());
        self.send(ExecutionEvent::ExecutionFinished {
            execution_id: execution_id.clone(),
            finished: run.finished,
            error,
            timestamp: self.time_provider.now_utc(),
        })
    }
}
