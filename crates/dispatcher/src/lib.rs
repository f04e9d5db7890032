//! # Command Queue Dispatcher
//!
//! 延时调度：命令先登记到待调度列表，到达截止时间后提交给 [`QueueProcessor`]。
//!
//! [`QueueProcessor`]: command_queue_worker::QueueProcessor

pub mod pending;
pub mod scheduler;

pub use pending::PendingTasks;
pub use scheduler::TaskScheduler;
