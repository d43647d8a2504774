//! Workflow dispatcher — the main execution driver.
//!
//! The [`WorkflowDispatcher`] drains the node execution stack: it pops ready
//! invocation units, verifies their input slots are satisfiable, runs them
//! through the [`NodeInvoker`], records per-task results, and propagates
//! outputs to downstream nodes (directly, or through the Waiting Buffer for
//! multi-input joins) until the stack empties, a terminal error occurs, or
//! the stop token flips.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::active_executions::ActiveExecutions;
use crate::core::hooks::HookRegistry;
use crate::core::run_data::{
    ExecuteData, ExecutionId, ExecutionMode, Run, RunExecutionData, TaskData,
};
use crate::core::runtime_context::RuntimeContext;
use crate::data::{DataBundle, ItemBatch, MAIN_PORT};
use crate::error::{ExecutionError, WorkflowError, WorkflowResult};
use crate::graph::Graph;
use crate::nodes::{NodeInvoker, NodeRunResult};

/// Configuration for the execution loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Hard ceiling on loop iterations, a second line of defense behind the
    /// stall detector. 0 disables the check.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
    /// Wall-clock cap on one run. 0 disables the check.
    #[serde(default = "default_max_execution_time_secs")]
    pub max_execution_time_secs: u64,
}

fn default_max_steps() -> u64 {
    10_000
}

fn default_max_execution_time_secs() -> u64 {
    600
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_steps: default_max_steps(),
            max_execution_time_secs: default_max_execution_time_secs(),
        }
    }
}

/// Result of the pre-dispatch phase, decided under the state lock.
enum Dispatch {
    /// Stack is empty; the run drains.
    Drained,
    /// Node excluded by the partial-run whitelist; item discarded.
    Skipped,
    /// Input slots not yet satisfiable; item pushed back for a later pass.
    Requeued,
    /// Same `(node, run index)` dequeued twice in a row with no progress.
    Stalled { node: String, run_index: usize },
    /// Ready to invoke.
    Execute { item: ExecuteData, run_index: usize },
}

/// The state machine driving one run to completion.
pub struct WorkflowDispatcher {
    graph: Arc<Graph>,
    data: Arc<RwLock<RunExecutionData>>,
    invoker: NodeInvoker,
    hooks: Arc<HookRegistry>,
    context: Arc<RuntimeContext>,
    config: EngineConfig,
    active: Arc<ActiveExecutions>,
    execution_id: ExecutionId,
    mode: ExecutionMode,
    stop: CancellationToken,
}

impl WorkflowDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        graph: Arc<Graph>,
        data: Arc<RwLock<RunExecutionData>>,
        invoker: NodeInvoker,
        hooks: Arc<HookRegistry>,
        context: Arc<RuntimeContext>,
        config: EngineConfig,
        active: Arc<ActiveExecutions>,
        execution_id: ExecutionId,
        mode: ExecutionMode,
        stop: CancellationToken,
    ) -> Self {
        Self {
            graph,
            data,
            invoker,
            hooks,
            context,
            config,
            active,
            execution_id,
            mode,
            stop,
        }
    }

    /// Drive the run to completion and publish the final [`Run`].
    ///
    /// Node failures land in `result_data.error`; engine faults (stall,
    /// exceeded limits) in the run's top-level `error`. Either way the caller
    /// receives a `Run`, never a raw error.
    pub async fn run(self) -> Arc<Run> {
        // Yield before the first iteration so the execution id reaches the
        // caller before any node executes and push observers can correlate.
        tokio::task::yield_now().await;

        let started_at = self.context.time_provider.now_utc();
        tracing::debug!(execution_id = %self.execution_id, "execution loop starting");

        let mut stopped = false;
        let fault = match self.execute_loop(&mut stopped).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(execution_id = %self.execution_id, error = %e, "execution failed with engine fault");
                Some(ExecutionError::from(&e))
            }
        };

        let data = self.data.read().clone();
        let finished = !stopped && fault.is_none() && data.result_data.error.is_none();
        let run = Arc::new(Run {
            data,
            mode: self.mode,
            started_at,
            stopped_at: self.context.time_provider.now_utc(),
            finished,
            error: fault,
        });

        self.active.finish(&self.execution_id, run.clone());
        self.hooks
            .fire_workflow_execute_after(&run, &self.execution_id)
            .await;
        tracing::debug!(execution_id = %self.execution_id, finished = run.finished, "execution loop ended");
        run
    }

    async fn execute_loop(&self, stopped: &mut bool) -> WorkflowResult<()> {
        let loop_start = self.context.time_provider.now_millis();
        let mut steps: u64 = 0;
        // Key of the previous dequeue that got pushed back unprogressed.
        // History depth of one is deliberate: it bounds spinning at a single
        // extra iteration and is a documented compatibility limit.
        let mut last_try: Option<(String, usize)> = None;

        loop {
            // One yield per outer iteration keeps sibling runs interleaving.
            tokio::task::yield_now().await;

            if self.stop.is_cancelled() {
                *stopped = true;
                return Ok(());
            }

            steps += 1;
            if self.config.max_steps > 0 && steps > self.config.max_steps {
                return Err(WorkflowError::MaxStepsExceeded(self.config.max_steps));
            }
            if self.config.max_execution_time_secs > 0 {
                let elapsed = self.context.time_provider.now_millis() - loop_start;
                if elapsed > self.config.max_execution_time_secs as i64 * 1000 {
                    return Err(WorkflowError::ExecutionTimeout);
                }
            }

            let dispatch = self.dispatch_next(&mut last_try);

            let (item, run_index) = match dispatch {
                Dispatch::Drained => return Ok(()),
                Dispatch::Skipped | Dispatch::Requeued => continue,
                Dispatch::Stalled { node, run_index } => {
                    return Err(WorkflowError::EndlessLoop { node, run_index })
                }
                Dispatch::Execute { item, run_index } => (item, run_index),
            };

            let node = self
                .graph
                .get_node(&item.node)
                .ok_or_else(|| WorkflowError::NodeNotFound(item.node.clone()))?;

            self.hooks
                .fire_node_execute_before(&self.execution_id, &node.name)
                .await;

            let invocation = self.invoker.invoke(node, &item.data, &self.context).await;

            match invocation.result {
                NodeRunResult::End => {
                    // Explicit empty success: the branch ends here. No task
                    // is recorded and nothing propagates.
                    continue;
                }
                NodeRunResult::Output(batches) => {
                    let task = TaskData {
                        start_time: invocation.start_time,
                        execution_time: invocation.execution_time,
                        error: None,
                        data: Some(branches_to_bundle(&batches)),
                    };
                    self.complete_node(&item, run_index, task, Some(&batches))
                        .await?;
                }
                NodeRunResult::Recovered { error, output } => {
                    let task = TaskData {
                        start_time: invocation.start_time,
                        execution_time: invocation.execution_time,
                        error: Some(error),
                        data: output.as_ref().map(|batches| branches_to_bundle(batches)),
                    };
                    self.complete_node(&item, run_index, task, output.as_ref())
                        .await?;
                }
                NodeRunResult::Failed(error) => {
                    let task = TaskData {
                        start_time: invocation.start_time,
                        execution_time: invocation.execution_time,
                        error: Some(error.clone()),
                        data: None,
                    };
                    {
                        let mut data = self.data.write();
                        data.record_task(&item.node, task.clone());
                        // Re-queue at the front so a later run-from-nodes can
                        // resume exactly here from the preserved state.
                        data.execution_data.node_execution_stack.push_front(item.clone());
                        data.result_data.error = Some(error);
                    }
                    self.hooks
                        .fire_node_execute_after(&self.execution_id, &item.node, &task)
                        .await;
                    // Checkpoint-and-stop, not a crash: partial state is
                    // preserved and returned.
                    return Ok(());
                }
            }
        }
    }

    /// Pop the next stack item and decide its fate under one lock hold.
    fn dispatch_next(&self, last_try: &mut Option<(String, usize)>) -> Dispatch {
        let mut data = self.data.write();

        let Some(item) = data.execution_data.node_execution_stack.pop_front() else {
            return Dispatch::Drained;
        };

        let run_index = data.run_index(&item.node);
        let current = (item.node.clone(), run_index);
        if Some(&current) == last_try.as_ref() {
            return Dispatch::Stalled {
                node: current.0,
                run_index: current.1,
            };
        }

        if let Some(filter) = &data.start_data.run_node_filter {
            // Skipping here keeps parallel leaves that merely share an
            // ancestor with the destination from executing in partial runs.
            if !filter.iter().any(|name| name == &item.node) {
                return Dispatch::Skipped;
            }
        }

        if let Some(inputs) = self.graph.main_inputs(&item.node) {
            for index in 0..inputs.len() {
                if self
                    .graph
                    .highest_enabled_sources(&item.node, MAIN_PORT, Some(index))
                    .is_empty()
                {
                    // No enabled source can ever feed this slot; treat it as
                    // satisfied-empty.
                    continue;
                }
                let satisfied = item
                    .data
                    .main_slots()
                    .and_then(|slots| slots.get(index))
                    .is_some_and(Option::is_some);
                if !satisfied {
                    // Producers have not run yet; put it back and try later.
                    data.execution_data.node_execution_stack.push_back(item);
                    *last_try = Some(current);
                    return Dispatch::Requeued;
                }
            }
        }

        data.result_data.last_node_executed = Some(item.node.clone());
        Dispatch::Execute { item, run_index }
    }

    /// Record a completed task and hand its outputs to dependents.
    async fn complete_node(
        &self,
        item: &ExecuteData,
        run_index: usize,
        task: TaskData,
        output: Option<&Vec<ItemBatch>>,
    ) -> WorkflowResult<()> {
        let propagate = {
            let mut data = self.data.write();
            data.record_task(&item.node, task.clone());

            let is_destination = data
                .start_data
                .destination_node
                .as_deref()
                .is_some_and(|dest| dest == item.node);
            if is_destination {
                // The requested target completed: this branch stops growing,
                // already-queued independent work still drains.
                false
            } else {
                self.propagate(&mut data, &item.node, run_index, output)?;
                true
            }
        };

        self.hooks
            .fire_node_execute_after(&self.execution_id, &item.node, &task)
            .await;
        tracing::trace!(
            execution_id = %self.execution_id,
            node = %item.node,
            run_index,
            propagated = propagate,
            "node completed"
        );
        Ok(())
    }

    /// Push downstream work for every outgoing `main` connection of the
    /// completed node's output branches.
    fn propagate(
        &self,
        data: &mut RunExecutionData,
        node_name: &str,
        run_index: usize,
        output: Option<&Vec<ItemBatch>>,
    ) -> WorkflowResult<()> {
        let Some(branches) = self
            .graph
            .source_connections(node_name)
            .and_then(|ports| ports.get(MAIN_PORT))
        else {
            return Ok(());
        };

        for (output_index, connections) in branches.iter().enumerate() {
            for conn in connections {
                if self.graph.get_node(&conn.node).is_none() {
                    return Err(WorkflowError::DanglingConnection {
                        source_node: node_name.to_string(),
                        destination: conn.node.clone(),
                    });
                }

                // A null output (or a branch the node never produced) leaves
                // the destination slot permanently empty.
                let batch: Option<ItemBatch> =
                    output.and_then(|batches| batches.get(output_index).cloned());

                let input_count = self
                    .graph
                    .main_inputs(&conn.node)
                    .map(Vec::len)
                    .unwrap_or(0);

                if input_count > 1 {
                    // Join node: fill this branch's slot and promote once all
                    // sibling branches have arrived.
                    let waiting = &mut data.execution_data.waiting_execution;
                    if waiting.contains(&conn.node, run_index) {
                        waiting.fill_slot(&conn.node, run_index, conn.index, batch);
                        if let Some(bundle) =
                            waiting.take_if_complete(&conn.node, run_index, input_count)
                        {
                            data.execution_data.node_execution_stack.push_back(ExecuteData {
                                node: conn.node.clone(),
                                data: bundle,
                            });
                        }
                    } else {
                        waiting.insert(&conn.node, run_index, input_count, conn.index, batch);
                    }
                } else {
                    let mut slots = vec![None; conn.index + 1];
                    slots[conn.index] = batch;
                    data.execution_data.node_execution_stack.push_back(ExecuteData {
                        node: conn.node.clone(),
                        data: DataBundle::main(slots),
                    });
                }
            }
        }

        Ok(())
    }
}

fn branches_to_bundle(batches: &[ItemBatch]) -> DataBundle {
    DataBundle::main(batches.iter().cloned().map(Some).collect())
}
