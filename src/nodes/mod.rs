//! Node execution: the executor plugin boundary, the built-in executors,
//! and the invoker applying timing and error policy.

pub mod builtin;
pub mod executor;
pub mod invoker;

pub use executor::{NodeExecutor, NodeExecutorRegistry, NodeOutput};
pub use invoker::{Invocation, NodeInvoker, NodeRunResult};
