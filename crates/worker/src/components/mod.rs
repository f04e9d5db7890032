pub mod task_execution;
pub mod worker_lifecycle;

pub use task_execution::{ExecutionOutcomes, TaskExecutionManager};
pub use worker_lifecycle::{WorkerLifecycle, WorkerPool};
