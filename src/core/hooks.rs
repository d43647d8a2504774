//! Lifecycle hook dispatch.
//!
//! Observers implement [`LifecycleHook`] and are invoked in registration
//! order at the four lifecycle points. A failing hook is logged and skipped;
//! it can never abort the run or starve the next observer.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::run_data::{ExecutionId, Run, TaskData};
use crate::data::ItemBatch;

#[derive(Debug, Error)]
#[error("hook failed: {0}")]
pub struct HookError(pub String);

pub type HookResult = Result<(), HookError>;

/// Observer callbacks for run lifecycle events. All methods default to
/// no-ops so implementors subscribe only to what they need.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    async fn workflow_execute_before(&self, _execution_id: &ExecutionId) -> HookResult {
        Ok(())
    }

    async fn node_execute_before(
        &self,
        _execution_id: &ExecutionId,
        _node_name: &str,
    ) -> HookResult {
        Ok(())
    }

    async fn node_execute_after(
        &self,
        _execution_id: &ExecutionId,
        _node_name: &str,
        _task: &TaskData,
    ) -> HookResult {
        Ok(())
    }

    async fn workflow_execute_after(&self, _run: &Run, _execution_id: &ExecutionId) -> HookResult {
        Ok(())
    }

    /// Optional seed data, consulted only when the caller starts a run
    /// without any.
    fn seed_data(&self) -> Option<ItemBatch> {
        None
    }
}

/// Ordered list of registered hooks with per-callback failure isolation.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn fire_workflow_execute_before(&self, execution_id: &ExecutionId) {
        for hook in &self.hooks {
            if let Err(e) = hook.workflow_execute_before(execution_id).await {
                tracing::warn!(execution_id = %execution_id, error = %e, "workflowExecuteBefore hook failed");
            }
        }
    }

    pub async fn fire_node_execute_before(&self, execution_id: &ExecutionId, node_name: &str) {
        for hook in &self.hooks {
            if let Err(e) = hook.node_execute_before(execution_id, node_name).await {
                tracing::warn!(execution_id = %execution_id, node = node_name, error = %e, "nodeExecuteBefore hook failed");
            }
        }
    }

    pub async fn fire_node_execute_after(
        &self,
        execution_id: &ExecutionId,
        node_name: &str,
        task: &TaskData,
    ) {
        for hook in &self.hooks {
            if let Err(e) = hook.node_execute_after(execution_id, node_name, task).await {
                tracing::warn!(execution_id = %execution_id, node = node_name, error = %e, "nodeExecuteAfter hook failed");
            }
        }
    }

    pub async fn fire_workflow_execute_after(&self, run: &Run, execution_id: &ExecutionId) {
        for hook in &self.hooks {
            if let Err(e) = hook.workflow_execute_after(run, execution_id).await {
                tracing::warn!(execution_id = %execution_id, error = %e, "workflowExecuteAfter hook failed");
            }
        }
    }

    /// First seed offered by any hook, in registration order.
    pub fn seed_data(&self) -> Option<ItemBatch> {
        self.hooks.iter().find_map(|hook| hook.seed_data())
    }
}
