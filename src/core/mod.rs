//! Execution-side machinery: run state, the dispatcher loop, the waiting
//! buffer for multi-input joins, lifecycle hooks, and the registry of
//! in-flight executions.

pub mod active_executions;
pub mod dispatcher;
pub mod event_bus;
pub mod hooks;
pub mod run_data;
pub mod runtime_context;
pub mod waiting;

pub use active_executions::{ActiveExecutions, ExecutionHandle};
pub use dispatcher::{EngineConfig, WorkflowDispatcher};
pub use event_bus::{create_event_channel, EventReceiver, EventSender, ExecutionEvent, PushHook};
pub use hooks::{HookError, HookRegistry, HookResult, LifecycleHook};
pub use run_data::{
    ExecuteData, ExecutionId, ExecutionMode, ExecutionState, ResultData, Run, RunData,
    RunExecutionData, StartData, TaskData,
};
pub use runtime_context::{
    FakeIdGenerator, FakeTimeProvider, IdGenerator, RealIdGenerator, RealTimeProvider,
    RuntimeContext, TimeProvider,
};
pub use waiting::WaitingExecution;
