//! Active-Run Registry — the process-wide table of live runs.
//!
//! Each run owns its `RunExecutionData` exclusively; the registry keeps only
//! a read reference (for snapshots), the cooperative stop token, and the
//! completion channel. It is the single piece of cross-run shared state, so
//! it lives in a `DashMap` safe for interleaved cooperative tasks.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::run_data::{ExecutionId, ExecutionMode, Run, RunExecutionData};
use crate::core::runtime_context::IdGenerator;

pub(crate) struct ActiveEntry {
    pub mode: ExecutionMode,
    pub stop: CancellationToken,
    pub data: Arc<RwLock<RunExecutionData>>,
    pub finished_tx: watch::Sender<Option<Arc<Run>>>,
}

#[derive(Default)]
pub struct ActiveExecutions {
    executions: DashMap<ExecutionId, ActiveEntry>,
}

impl ActiveExecutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run and hand back its fresh id, stop token, and a
    /// handle the caller can await completion on.
    pub(crate) fn add(
        &self,
        mode: ExecutionMode,
        data: Arc<RwLock<RunExecutionData>>,
        id_generator: &dyn IdGenerator,
    ) -> (ExecutionId, CancellationToken, ExecutionHandle) {
        let id = ExecutionId(id_generator.next_id());
        let stop = CancellationToken::new();
        let (finished_tx, finished_rx) = watch::channel(None);

        self.executions.insert(
            id.clone(),
            ActiveEntry {
                mode,
                stop: stop.clone(),
                data,
                finished_tx,
            },
        );

        let handle = ExecutionHandle {
            id: id.clone(),
            finished: finished_rx,
        };
        (id, stop.clone(), handle)
    }

    /// Cooperative cancellation: flips the stop token so the run's next loop
    /// iteration finalizes early. Returns false for unknown/finished runs.
    pub fn stop(&self, id: &ExecutionId) -> bool {
        match self.executions.get(id) {
            Some(entry) => {
                entry.stop.cancel();
                true
            }
            None => false,
        }
    }

    pub fn should_be_stopped(&self, id: &ExecutionId) -> bool {
        self.executions
            .get(id)
            .is_some_and(|entry| entry.stop.is_cancelled())
    }

    /// Clone of the run's current state, or None once the run is finished
    /// and removed.
    pub fn snapshot(&self, id: &ExecutionId) -> Option<RunExecutionData> {
        self.executions.get(id).map(|entry| entry.data.read().clone())
    }

    pub fn mode(&self, id: &ExecutionId) -> Option<ExecutionMode> {
        self.executions.get(id).map(|entry| entry.mode)
    }

    pub fn running_ids(&self) -> Vec<ExecutionId> {
        self.executions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }

    /// Remove a finished run and publish its final result to waiters.
    pub(crate) fn finish(&self, id: &ExecutionId, run: Arc<Run>) {
        if let Some((_, entry)) = self.executions.remove(id) {
            let _ = entry.finished_tx.send(Some(run));
        }
    }
}

/// Handle to one live run. The id is available immediately at submission so
/// observers can correlate push events before the first node completes.
#[derive(Debug)]
pub struct ExecutionHandle {
    id: ExecutionId,
    finished: watch::Receiver<Option<Arc<Run>>>,
}

impl ExecutionHandle {
    pub fn id(&self) -> &ExecutionId {
        &self.id
    }

    /// Block until the run finalizes and return the final [`Run`].
    pub async fn wait(mut self) -> Arc<Run> {
        loop {
            if let Some(run) = self.finished.borrow().clone() {
                return run;
            }
            if self.finished.changed().await.is_err() {
                // Sender dropped without publishing: the run task panicked.
                // Surface it rather than spin.
                panic!("execution task dropped without publishing a result");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runtime_context::FakeIdGenerator;
    use chrono::Utc;

    fn empty_data() -> Arc<RwLock<RunExecutionData>> {
        Arc::new(RwLock::new(RunExecutionData::default()))
    }

    #[tokio::test]
    async fn test_add_stop_and_finish() {
        let active = ActiveExecutions::new();
        let ids = FakeIdGenerator::new("exec");
        let (id, token, handle) = active.add(ExecutionMode::Manual, empty_data(), &ids);
        assert_eq!(id.0, "exec-1");
        assert_eq!(active.len(), 1);
        assert!(!active.should_be_stopped(&id));

        assert!(active.stop(&id));
        assert!(token.is_cancelled());
        assert!(active.should_be_stopped(&id));

        let run = Arc::new(Run {
            data: RunExecutionData::default(),
            mode: ExecutionMode::Manual,
            started_at: Utc::now(),
            stopped_at: Utc::now(),
            finished: false,
            error: None,
        });
        active.finish(&id, run);
        assert!(active.is_empty());
        assert!(!active.stop(&id));
        assert!(active.snapshot(&id).is_none());

        let result = handle.wait().await;
        assert!(!result.finished);
    }

    #[tokio::test]
    async fn test_snapshot_reflects_live_state() {
        let active = ActiveExecutions::new();
        let ids = FakeIdGenerator::new("exec");
        let data = empty_data();
        let (id, _token, _handle) = active.add(ExecutionMode::Trigger, data.clone(), &ids);

        data.write().result_data.last_node_executed = Some("a".into());
        let snapshot = active.snapshot(&id).unwrap();
        assert_eq!(snapshot.result_data.last_node_executed.as_deref(), Some("a"));
        assert_eq!(active.mode(&id), Some(ExecutionMode::Trigger));
    }
}
