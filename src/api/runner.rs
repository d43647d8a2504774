//! The engine facade: validates a graph, seeds the execution stack, and
//! spawns the dispatcher, returning a handle the caller can await or stop.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::active_executions::{ActiveExecutions, ExecutionHandle};
use crate::core::dispatcher::{EngineConfig, WorkflowDispatcher};
use crate::core::hooks::HookRegistry;
use crate::core::run_data::{
    ExecuteData, ExecutionId, ExecutionMode, ExecutionState, ResultData, RunData,
    RunExecutionData, StartData,
};
use crate::core::runtime_context::RuntimeContext;
use crate::data::{DataBundle, ExecutionRecord, ItemBatch, MAIN_PORT};
use crate::error::{WorkflowError, WorkflowResult};
use crate::graph::Graph;
use crate::nodes::{NodeExecutorRegistry, NodeInvoker};

/// Options for a fresh run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub mode: ExecutionMode,
    /// Items fed to the start nodes. Falls back to hook-provided seed data,
    /// then to a single empty record.
    pub seed_data: Option<ItemBatch>,
    /// Explicit entry points. When unset the graph's roots are used.
    pub start_nodes: Option<Vec<String>>,
    /// Stop growing branches once this node has executed; nodes outside its
    /// ancestry never run.
    pub destination_node: Option<String>,
}

/// Options for resuming from previously recorded results.
#[derive(Debug, Clone)]
pub struct PartialRunRequest {
    pub mode: ExecutionMode,
    /// Results of earlier runs, keyed by node name. Sources of the start
    /// nodes must appear here.
    pub run_data: RunData,
    /// Nodes to re-execute, fed from `run_data` of their sources.
    pub start_nodes: Vec<String>,
    pub destination_node: Option<String>,
}

/// Shared engine: one instance launches and tracks many concurrent runs.
pub struct WorkflowEngine {
    registry: Arc<NodeExecutorRegistry>,
    hooks: Arc<HookRegistry>,
    context: Arc<RuntimeContext>,
    config: EngineConfig,
    active: Arc<ActiveExecutions>,
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::default()
    }

    /// Registry of in-flight runs, for direct inspection.
    pub fn active_executions(&self) -> &Arc<ActiveExecutions> {
        &self.active
    }

    /// Launch a fresh run of `graph`. Returns once the run is registered and
    /// the before-hooks fired; node execution happens on a spawned task.
    pub async fn run_workflow(
        &self,
        graph: Arc<Graph>,
        request: RunRequest,
    ) -> WorkflowResult<ExecutionHandle> {
        graph.check_ready(&self.registry)?;

        let start_names: Vec<String> = match &request.start_nodes {
            Some(names) => {
                for name in names {
                    if graph.get_node(name).is_none() {
                        return Err(WorkflowError::NodeNotFound(name.clone()));
                    }
                }
                names.clone()
            }
            None => graph
                .start_nodes(request.destination_node.as_deref())?
                .into_iter()
                .map(|node| node.name.clone())
                .collect(),
        };

        let seed = request
            .seed_data
            .or_else(|| self.hooks.seed_data())
            .unwrap_or_else(|| vec![ExecutionRecord::empty()]);

        let stack = start_names
            .into_iter()
            .map(|name| ExecuteData {
                node: name,
                data: DataBundle::single_main(seed.clone()),
            })
            .collect();

        let run_node_filter = match &request.destination_node {
            Some(dest) => Some(ancestry_filter(&graph, dest)?),
            None => None,
        };

        let data = RunExecutionData {
            start_data: StartData {
                destination_node: request.destination_node,
                run_node_filter,
            },
            result_data: ResultData::default(),
            execution_data: ExecutionState {
                node_execution_stack: stack,
                waiting_execution: Default::default(),
            },
        };

        self.launch(graph, data, request.mode).await
    }

    /// Resume execution at `start_nodes`, feeding them from the recorded
    /// outputs of their sources instead of re-running the whole graph.
    pub async fn run_from_nodes(
        &self,
        graph: Arc<Graph>,
        request: PartialRunRequest,
    ) -> WorkflowResult<ExecutionHandle> {
        graph.check_ready(&self.registry)?;

        let mut stack = std::collections::VecDeque::new();
        for name in &request.start_nodes {
            if graph.get_node(name).is_none() {
                return Err(WorkflowError::NodeNotFound(name.clone()));
            }
            let data = match graph.main_inputs(name) {
                Some(inputs) if !inputs.is_empty() => {
                    let mut slots: Vec<Option<ItemBatch>> = vec![None; inputs.len()];
                    for (index, connections) in inputs.iter().enumerate() {
                        for conn in connections {
                            slots[index] = recorded_output(&request.run_data, conn.node.as_str(), conn.index)?;
                        }
                    }
                    DataBundle::main(slots)
                }
                // Root start node: seed with one empty record, same shape as
                // a fresh run.
                _ => DataBundle::single_main(vec![ExecutionRecord::empty()]),
            };
            stack.push_back(ExecuteData {
                node: name.clone(),
                data,
            });
        }

        let mut execution_data = ExecutionState {
            node_execution_stack: stack,
            waiting_execution: Default::default(),
        };

        // Pre-fill the destination's waiting slots from past results, so the
        // branches re-executed now only have to supply their own slot.
        if let Some(dest) = &request.destination_node {
            if !request.start_nodes.contains(dest) {
                if let Some(inputs) = graph.main_inputs(dest) {
                    if inputs.len() > 1 {
                        let run_index = request.run_data.get(dest).map_or(0, Vec::len);
                        for (index, connections) in inputs.iter().enumerate() {
                            let mut batch = None;
                            for conn in connections {
                                if request.run_data.contains_key(&conn.node) {
                                    batch =
                                        recorded_output(&request.run_data, &conn.node, conn.index)?;
                                }
                            }
                            if index == 0 {
                                execution_data.waiting_execution.insert(
                                    dest,
                                    run_index,
                                    inputs.len(),
                                    index,
                                    batch,
                                );
                            } else {
                                execution_data
                                    .waiting_execution
                                    .fill_slot(dest, run_index, index, batch);
                            }
                        }
                    }
                }
            }
        }

        let run_node_filter = match &request.destination_node {
            Some(dest) => Some(ancestry_filter(&graph, dest)?),
            None => None,
        };

        let data = RunExecutionData {
            start_data: StartData {
                destination_node: request.destination_node,
                run_node_filter,
            },
            result_data: ResultData {
                run_data: request.run_data,
                ..Default::default()
            },
            execution_data,
        };

        self.launch(graph, data, request.mode).await
    }

    /// Request a cooperative stop. Returns false for unknown or already
    /// finished executions.
    pub fn stop_execution(&self, id: &ExecutionId) -> bool {
        self.active.stop(id)
    }

    /// Point-in-time copy of a running execution's state.
    pub fn execution_snapshot(&self, id: &ExecutionId) -> Option<RunExecutionData> {
        self.active.snapshot(id)
    }

    async fn launch(
        &self,
        graph: Arc<Graph>,
        data: RunExecutionData,
        mode: ExecutionMode,
    ) -> WorkflowResult<ExecutionHandle> {
        let data = Arc::new(RwLock::new(data));
        let (execution_id, stop, handle) =
            self.active
                .add(mode, data.clone(), self.context.id_generator.as_ref());

        self.hooks.fire_workflow_execute_before(&execution_id).await;
        tracing::info!(execution_id = %execution_id, ?mode, "workflow execution started");

        let dispatcher = WorkflowDispatcher::new(
            graph,
            data,
            NodeInvoker::new(self.registry.clone()),
            self.hooks.clone(),
            self.context.clone(),
            self.config.clone(),
            self.active.clone(),
            execution_id,
            mode,
            stop,
        );
        tokio::spawn(dispatcher.run());

        Ok(handle)
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`WorkflowEngine`]; unset parts fall back to defaults.
#[derive(Default)]
pub struct WorkflowEngineBuilder {
    registry: Option<Arc<NodeExecutorRegistry>>,
    hooks: Option<Arc<HookRegistry>>,
    context: Option<Arc<RuntimeContext>>,
    config: Option<EngineConfig>,
}

impl WorkflowEngineBuilder {
    pub fn registry(mut self, registry: NodeExecutorRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    pub fn context(mut self, context: RuntimeContext) -> Self {
        self.context = Some(Arc::new(context));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> WorkflowEngine {
        WorkflowEngine {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(NodeExecutorRegistry::new())),
            hooks: self.hooks.unwrap_or_default(),
            context: self.context.unwrap_or_default(),
            config: self.config.unwrap_or_default(),
            active: Arc::new(ActiveExecutions::default()),
        }
    }
}

/// Whitelist for destination-scoped runs: the destination plus every node
/// that can reach it.
fn ancestry_filter(graph: &Graph, destination: &str) -> WorkflowResult<Vec<String>> {
    let mut filter = graph.parent_nodes(destination)?;
    filter.push(destination.to_string());
    Ok(filter)
}

/// Output batch a source produced on `output_index` in its most recent run.
fn recorded_output(
    run_data: &RunData,
    source: &str,
    output_index: usize,
) -> WorkflowResult<Option<ItemBatch>> {
    let tasks = run_data
        .get(source)
        .ok_or_else(|| WorkflowError::MissingRunData {
            node: source.to_string(),
        })?;
    let batch = tasks
        .last()
        .and_then(|task| task.data.as_ref())
        .and_then(|bundle| bundle.port(MAIN_PORT))
        .and_then(|slots| slots.get(output_index))
        .and_then(Clone::clone);
    Ok(batch)
}
