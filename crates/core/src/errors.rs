use thiserror::Error;

use crate::models::CommandStatus;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("非法的命令状态迁移: {from} -> {to}")]
    InvalidTransition {
        from: CommandStatus,
        to: CommandStatus,
    },

    #[error("后台任务等待失败: {0}")]
    Join(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(err: tokio::task::JoinError) -> Self {
        SchedulerError::Join(err.to_string())
    }
}

/// 命令执行错误
///
/// 业务命令在 `execute()` 内部产生的唯一错误类型。引擎在单条命令边界捕获它，
/// 只记录到命令的 error 字段与失败统计，不会继续向上传播。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// 由 panic 负载构造执行错误
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new(format!("panicked: {detail}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ExecutionError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ExecutionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for ExecutionError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_from_panic_payloads() {
        let static_payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(
            ExecutionError::from_panic(static_payload.as_ref()).message(),
            "panicked: boom"
        );

        let owned_payload: Box<dyn std::any::Any + Send> = Box::new(String::from("disk full"));
        assert_eq!(
            ExecutionError::from_panic(owned_payload.as_ref()).to_string(),
            "panicked: disk full"
        );

        let opaque_payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert!(ExecutionError::from_panic(opaque_payload.as_ref())
            .message()
            .contains("unknown"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = SchedulerError::InvalidTransition {
            from: CommandStatus::Completed,
            to: CommandStatus::Executing,
        };
        assert_eq!(err.to_string(), "非法的命令状态迁移: completed -> executing");
    }
}
