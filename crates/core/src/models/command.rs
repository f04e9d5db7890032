use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ExecutionError, SchedulerError};
use crate::models::Priority;
use crate::traits::Command;
use crate::SchedulerResult;

/// 进程内单调递增的提交序号，创建时间相同时用于最终排序
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// 命令唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(Uuid);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 前8位，用于日志
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 命令状态
///
/// 只允许 `Pending -> Executing -> {Completed | Failed}`，不可回退。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandStatus::Completed | CommandStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Executing => "executing",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 排队中的命令
///
/// 客户端命令在提交（或被调度器登记）时包装成 `QueuedCommand`，
/// 此时记录创建时间和提交序号。排队期间归就绪队列所有，执行期间归唯一一个
/// worker 所有，状态字段只由持有者修改。
pub struct QueuedCommand {
    id: CommandId,
    command: Arc<dyn Command>,
    priority: Priority,
    created_at: DateTime<Utc>,
    sequence: u64,
    status: CommandStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    execution_time: Option<Duration>,
    result: Option<String>,
    error: Option<String>,
}

impl QueuedCommand {
    pub fn new<C>(command: C) -> Self
    where
        C: Command + 'static,
    {
        Self::from_arc(Arc::new(command))
    }

    pub fn from_boxed(command: Box<dyn Command>) -> Self {
        Self::from_arc(Arc::from(command))
    }

    pub fn from_arc(command: Arc<dyn Command>) -> Self {
        let priority = command.priority();
        Self {
            id: CommandId::new(),
            command,
            priority,
            created_at: Utc::now(),
            sequence: NEXT_SEQUENCE.fetch_add(1, AtomicOrdering::Relaxed),
            status: CommandStatus::Pending,
            started_at: None,
            finished_at: None,
            execution_time: None,
            result: None,
            error: None,
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn status(&self) -> CommandStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn execution_time(&self) -> Option<Duration> {
        self.execution_time
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn describe(&self) -> String {
        self.command.describe()
    }

    pub fn command(&self) -> Arc<dyn Command> {
        Arc::clone(&self.command)
    }

    /// 就绪队列使用的排序键：(优先级, 创建时间, 提交序号)，越小越先出队
    pub fn cmp_ready_order(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }

    pub fn mark_executing(&mut self) -> SchedulerResult<()> {
        self.transition(CommandStatus::Executing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&mut self, result: String, elapsed: Duration) -> SchedulerResult<()> {
        self.transition(CommandStatus::Completed)?;
        self.finish(elapsed);
        self.result = Some(result);
        Ok(())
    }

    pub fn mark_failed(&mut self, error: &ExecutionError, elapsed: Duration) -> SchedulerResult<()> {
        self.transition(CommandStatus::Failed)?;
        self.finish(elapsed);
        let message = error.to_string();
        self.error = Some(if message.is_empty() {
            "execution failed".to_string()
        } else {
            message
        });
        Ok(())
    }

    /// 生成不可变的执行记录
    pub fn to_record(&self) -> CommandRecord {
        CommandRecord {
            id: self.id,
            description: self.describe(),
            priority: self.priority,
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            execution_time: self.execution_time,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    fn transition(&mut self, to: CommandStatus) -> SchedulerResult<()> {
        let allowed = matches!(
            (self.status, to),
            (CommandStatus::Pending, CommandStatus::Executing)
                | (CommandStatus::Executing, CommandStatus::Completed)
                | (CommandStatus::Executing, CommandStatus::Failed)
        );
        if !allowed {
            return Err(SchedulerError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    fn finish(&mut self, elapsed: Duration) {
        self.finished_at = Some(Utc::now());
        self.execution_time = Some(elapsed);
    }
}

impl fmt::Debug for QueuedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedCommand")
            .field("id", &self.id)
            .field("description", &self.describe())
            .field("priority", &self.priority)
            .field("created_at", &self.created_at)
            .field("sequence", &self.sequence)
            .field("status", &self.status)
            .finish()
    }
}

/// 命令执行记录
///
/// 命令进入终态后的只读快照，保存在已完成或失败集合中供查询。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: CommandId,
    pub description: String,
    pub priority: Priority,
    pub status: CommandStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub execution_time: Option<Duration>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl CommandRecord {
    pub fn is_completed(&self) -> bool {
        self.status == CommandStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == CommandStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopCommand(Priority);

    #[async_trait]
    impl Command for NoopCommand {
        async fn execute(&self) -> Result<String, ExecutionError> {
            Ok("noop".to_string())
        }

        fn describe(&self) -> String {
            format!("noop {}", self.0)
        }

        fn priority(&self) -> Priority {
            self.0
        }
    }

    #[test]
    fn test_new_command_is_pending() {
        let queued = QueuedCommand::new(NoopCommand(Priority::High));
        assert_eq!(queued.status(), CommandStatus::Pending);
        assert_eq!(queued.priority(), Priority::High);
        assert!(queued.started_at().is_none());
        assert!(queued.execution_time().is_none());
        assert!(queued.result().is_none());
        assert!(queued.error().is_none());
        assert_eq!(queued.describe(), "noop HIGH");
    }

    #[test]
    fn test_successful_lifecycle() {
        let mut queued = QueuedCommand::new(NoopCommand(Priority::Normal));
        queued.mark_executing().unwrap();
        assert_eq!(queued.status(), CommandStatus::Executing);
        assert!(queued.started_at().is_some());

        queued
            .mark_completed("done".to_string(), Duration::from_millis(5))
            .unwrap();
        let record = queued.to_record();
        assert!(record.is_completed());
        assert_eq!(record.result.as_deref(), Some("done"));
        assert!(record.error.is_none());
        assert_eq!(record.execution_time, Some(Duration::from_millis(5)));
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_failed_lifecycle_records_error() {
        let mut queued = QueuedCommand::new(NoopCommand(Priority::Low));
        queued.mark_executing().unwrap();
        queued
            .mark_failed(&ExecutionError::new("smtp unreachable"), Duration::ZERO)
            .unwrap();
        let record = queued.to_record();
        assert!(record.is_failed());
        assert_eq!(record.error.as_deref(), Some("smtp unreachable"));
        assert!(record.result.is_none());
    }

    #[test]
    fn test_empty_error_message_is_replaced() {
        let mut queued = QueuedCommand::new(NoopCommand(Priority::Low));
        queued.mark_executing().unwrap();
        queued
            .mark_failed(&ExecutionError::new(""), Duration::ZERO)
            .unwrap();
        assert_eq!(queued.error(), Some("execution failed"));
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        let mut queued = QueuedCommand::new(NoopCommand(Priority::Normal));
        assert!(queued
            .mark_completed("early".to_string(), Duration::ZERO)
            .is_err());

        queued.mark_executing().unwrap();
        assert!(queued.mark_executing().is_err());

        queued
            .mark_completed("ok".to_string(), Duration::ZERO)
            .unwrap();
        assert!(queued
            .mark_failed(&ExecutionError::new("late"), Duration::ZERO)
            .is_err());
        assert_eq!(queued.status(), CommandStatus::Completed);
    }

    #[test]
    fn test_ready_order_priority_then_creation() {
        let low = QueuedCommand::new(NoopCommand(Priority::Low));
        let urgent = QueuedCommand::new(NoopCommand(Priority::Urgent));
        let normal_first = QueuedCommand::new(NoopCommand(Priority::Normal));
        let normal_second = QueuedCommand::new(NoopCommand(Priority::Normal));

        assert_eq!(urgent.cmp_ready_order(&low), Ordering::Less);
        assert_eq!(normal_first.cmp_ready_order(&normal_second), Ordering::Less);
        assert_eq!(low.cmp_ready_order(&normal_second), Ordering::Greater);
    }

    #[test]
    fn test_command_id_short_form() {
        let id = CommandId::new();
        assert_eq!(id.short().len(), 8);
        assert!(id.to_string().starts_with(&id.short()));
    }
}
