//! flowmill — a stack-driven workflow execution engine.
//!
//! A workflow is a directed graph of named nodes wired by ordered `main`
//! connections. The engine drains an explicit execution stack: each node
//! runs once per run index with a fully assembled input bundle, multi-input
//! joins buffer partial arrivals until every branch has reported, and
//! per-node results accumulate in a serializable run-data table that later
//! partial runs can resume from.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowmill::{ConnectionSpec, Graph, Node, RunRequest, WorkflowEngine};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = Arc::new(Graph::new(
//!     vec![Node::new("start", "no-op"), Node::new("end", "no-op")],
//!     vec![ConnectionSpec::main("start", "end")],
//! )?);
//!
//! let engine = WorkflowEngine::new();
//! let handle = engine.run_workflow(graph, RunRequest::default()).await?;
//! let run = handle.wait().await;
//! assert!(run.finished);
//! # Ok(())
//! # }
//! ```
//!
//! Custom node behavior plugs in through [`NodeExecutor`]; run lifecycle
//! observation through [`LifecycleHook`] or the push channel in
//! [`core::event_bus`].

pub mod api;
pub mod core;
pub mod data;
pub mod error;
pub mod graph;
pub mod nodes;

pub use crate::api::{PartialRunRequest, RunRequest, WorkflowEngine, WorkflowEngineBuilder};
pub use crate::core::{
    create_event_channel, EngineConfig, ExecutionEvent, ExecutionHandle, ExecutionId,
    ExecutionMode, FakeIdGenerator, FakeTimeProvider, HookRegistry, LifecycleHook, PushHook, Run,
    RunData, RunExecutionData, RuntimeContext, TaskData,
};
pub use crate::data::{BinaryData, DataBundle, ExecutionRecord, ItemBatch, MAIN_PORT};
pub use crate::error::{ExecutionError, NodeError, WorkflowError, WorkflowResult};
pub use crate::graph::{Connection, ConnectionSpec, Graph, Node};
pub use crate::nodes::{NodeExecutor, NodeExecutorRegistry, NodeOutput};
