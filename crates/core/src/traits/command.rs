//! 命令执行接口定义
//!
//! 引擎对业务逻辑的唯一依赖就是 [`Command`] 特征：可执行、可描述、带优先级。
//! 邮件发送、文件处理、数据库备份等具体动作都由调用方实现，对引擎不透明。
//!
//! ## 使用示例
//!
//! ```rust
//! use async_trait::async_trait;
//! use command_queue_core::{Command, ExecutionError, Priority};
//!
//! struct PingCommand {
//!     host: String,
//! }
//!
//! #[async_trait]
//! impl Command for PingCommand {
//!     async fn execute(&self) -> Result<String, ExecutionError> {
//!         Ok(format!("pong from {}", self.host))
//!     }
//!
//!     fn describe(&self) -> String {
//!         format!("ping {}", self.host)
//!     }
//!
//!     fn priority(&self) -> Priority {
//!         Priority::High
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::errors::ExecutionError;
use crate::models::Priority;

/// 可调度的工作单元
///
/// 引擎保证 `execute` 至多被调用一次，且只由持有该命令的那个 worker 调用。
/// `describe` 不得有副作用，在排队中或执行完成后都可以调用。
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令，返回结果描述
    async fn execute(&self) -> Result<String, ExecutionError>;

    /// 命令的可读描述，用于日志和记录
    fn describe(&self) -> String;

    /// 命令优先级
    fn priority(&self) -> Priority {
        Priority::Normal
    }
}
