//! Public entry points for launching and controlling workflow runs.

pub mod runner;

pub use runner::{PartialRunRequest, RunRequest, WorkflowEngine, WorkflowEngineBuilder};
