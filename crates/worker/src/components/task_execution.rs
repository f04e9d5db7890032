use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use command_queue_core::{CommandRecord, ExecutionError, ProcessorStats, QueuedCommand};
use futures::FutureExt;
use metrics::{counter, histogram};
use tracing::{debug, error, info};

use crate::ready_queue::ReadyQueue;

/// 执行结果汇总：统计与两个终态集合放在同一把锁下，任何时刻读取都一致
#[derive(Debug, Default)]
pub struct ExecutionOutcomes {
    inner: Mutex<OutcomesInner>,
}

#[derive(Debug, Default)]
struct OutcomesInner {
    stats: ProcessorStats,
    completed: Vec<CommandRecord>,
    failed: Vec<CommandRecord>,
}

impl ExecutionOutcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ProcessorStats {
        self.lock().stats.clone()
    }

    pub fn completed(&self) -> Vec<CommandRecord> {
        self.lock().completed.clone()
    }

    pub fn failed(&self) -> Vec<CommandRecord> {
        self.lock().failed.clone()
    }

    fn record_completed(&self, record: CommandRecord) {
        let mut inner = self.lock();
        inner
            .stats
            .record_success(record.execution_time.unwrap_or_default());
        inner.completed.push(record);
    }

    fn record_failed(&self, record: CommandRecord) {
        let mut inner = self.lock();
        inner.stats.record_failure();
        inner.failed.push(record);
    }

    fn lock(&self) -> MutexGuard<'_, OutcomesInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 单条命令的执行管理
///
/// 负责状态迁移、调用 `execute()`、捕获失败（含 panic）并写入结果集合。
/// 失败只影响当前命令，不会传播到 worker 循环。
pub struct TaskExecutionManager {
    queue: Arc<ReadyQueue>,
    outcomes: Arc<ExecutionOutcomes>,
}

impl TaskExecutionManager {
    pub fn new(queue: Arc<ReadyQueue>, outcomes: Arc<ExecutionOutcomes>) -> Self {
        Self { queue, outcomes }
    }

    pub async fn handle_command(&self, worker_id: usize, mut command: QueuedCommand) {
        let description = command.describe();
        let command_id = command.id().short();

        if let Err(e) = command.mark_executing() {
            error!("Worker {} 拒绝执行命令 {}: {}", worker_id, command_id, e);
            self.queue.task_done();
            return;
        }

        info!(
            "Worker {} 开始执行: {} (id={}, priority={})",
            worker_id,
            description,
            command_id,
            command.priority()
        );

        let handle = command.command();
        let started = Instant::now();
        let outcome = match AssertUnwindSafe(handle.execute()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(ExecutionError::from_panic(payload.as_ref())),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(result) => {
                if let Err(e) = command.mark_completed(result, elapsed) {
                    error!("命令 {} 状态更新失败: {}", command_id, e);
                }
                info!("Worker {} 完成: {} 用时 {:?}", worker_id, description, elapsed);
                counter!("command_queue_commands_completed_total").increment(1);
                histogram!("command_queue_execution_duration_ms")
                    .record(elapsed.as_secs_f64() * 1000.0);
                self.outcomes.record_completed(command.to_record());
            }
            Err(err) => {
                if let Err(e) = command.mark_failed(&err, elapsed) {
                    error!("命令 {} 状态更新失败: {}", command_id, e);
                }
                error!("Worker {} 失败: {} - {}", worker_id, description, err);
                counter!("command_queue_commands_failed_total").increment(1);
                self.outcomes.record_failed(command.to_record());
            }
        }

        debug!("命令 {} 已处理完毕", command_id);
        self.queue.task_done();
    }
}
