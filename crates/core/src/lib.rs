//! # Command Queue Core
//!
//! 命令队列引擎的共享基础：错误类型、[`Command`] 接口、数据模型、配置与日志。
//! `command-queue-worker` 与 `command-queue-dispatcher` 都只依赖这里定义的类型。

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::{AdmissionMode, AppConfig, ObservabilityConfig, ProcessorConfig, SchedulerConfig};
pub use errors::{ExecutionError, SchedulerError};
pub use logging::{init_logging, LogConfig, LogLevel, OutputFormat};
pub use models::{
    CommandId, CommandRecord, CommandStatus, Priority, ProcessorStats, QueuedCommand,
    ShutdownPolicy,
};
pub use traits::Command;

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
