//! Error types for the execution engine.
//!
//! - [`NodeError`] — Errors raised inside a single node invocation.
//! - [`WorkflowError`] — Top-level errors for graph construction and running.
//! - [`ExecutionError`] — The serializable error record stored on task and
//!   run results.

pub mod execution_error;
pub mod node_error;
pub mod workflow_error;

pub use execution_error::ExecutionError;
pub use node_error::NodeError;
pub use workflow_error::WorkflowError;

/// Convenience alias for workflow-level results.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
/// Convenience alias for node-level results.
pub type NodeResult<T> = Result<T, NodeError>;
