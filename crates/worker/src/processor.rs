use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use command_queue_core::{
    Command, CommandId, CommandRecord, ProcessorConfig, ProcessorStats, QueuedCommand,
    SchedulerError, SchedulerResult, ShutdownPolicy,
};
use metrics::counter;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::components::{ExecutionOutcomes, TaskExecutionManager, WorkerPool};
use crate::ready_queue::ReadyQueue;

/// 命令队列处理器
///
/// 持有就绪队列和固定数量的 worker，提供提交、启停与统计查询。
/// 所有查询方法只在极短的临界区内持锁，不会阻塞 worker。
pub struct QueueProcessor {
    worker_count: usize,
    pop_timeout: Duration,
    stop_timeout: Duration,
    shutdown_policy: ShutdownPolicy,
    queue: Arc<ReadyQueue>,
    outcomes: Arc<ExecutionOutcomes>,
    executor: Arc<TaskExecutionManager>,
    /// 每个 worker 持有一个名额，跨越多次启停
    slots: Arc<Semaphore>,
    pool: Mutex<Option<WorkerPool>>,
}

impl QueueProcessor {
    pub fn new(worker_count: usize) -> SchedulerResult<Self> {
        Self::builder().worker_count(worker_count).build()
    }

    pub fn from_config(config: &ProcessorConfig) -> SchedulerResult<Self> {
        Self::builder()
            .worker_count(config.worker_count)
            .pop_timeout(config.pop_timeout())
            .stop_timeout(config.stop_timeout())
            .shutdown_policy(config.shutdown_policy)
            .build()
    }

    pub fn builder() -> QueueProcessorBuilder {
        QueueProcessorBuilder::default()
    }

    /// 包装并提交命令，立即进入就绪队列
    pub fn add_command<C>(&self, command: C) -> CommandId
    where
        C: Command + 'static,
    {
        self.submit(QueuedCommand::new(command))
    }

    /// 提交已包装的命令，保留其原始创建时间
    pub fn submit(&self, command: QueuedCommand) -> CommandId {
        let id = command.id();
        info!(
            "命令已添加到队列: {} (优先级: {})",
            command.describe(),
            command.priority()
        );
        counter!("command_queue_commands_submitted_total").increment(1);
        self.queue.push(command);
        id
    }

    /// 启动 worker；已在运行时只记录警告
    pub fn start_processing(&self) -> SchedulerResult<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SchedulerError::Internal(
                "start_processing 需要在 tokio 运行时中调用".to_string(),
            ));
        }

        let mut pool = self.lock_pool();
        if pool.is_some() {
            warn!("队列处理器已在运行");
            return Ok(());
        }

        let occupied = self
            .worker_count
            .saturating_sub(self.slots.available_permits());
        if occupied > 0 {
            info!("{} 个上一轮的工作线程仍在执行，新工作线程将在其结束后接替", occupied);
        }

        info!("启动 {} 个工作线程处理命令队列", self.worker_count);
        *pool = Some(WorkerPool::spawn(
            self.worker_count,
            &self.queue,
            &self.executor,
            self.pop_timeout,
            self.shutdown_policy,
            &self.slots,
        ));
        Ok(())
    }

    /// 停止 worker 并等待其退出，总等待时间不超过 `stop_timeout`
    ///
    /// 返回后不会再有命令出队。`ShutdownPolicy::Drop` 下仍在队列中的命令不会执行，
    /// `ShutdownPolicy::Drain` 下截止前没来得及出队的命令同样保留在队列里，
    /// 再次 `start_processing` 后会继续处理。
    pub async fn stop_processing(&self) -> SchedulerResult<()> {
        let pool = self.lock_pool().take();
        let Some(pool) = pool else {
            debug!("队列处理器未在运行");
            return Ok(());
        };

        info!(
            "正在停止命令队列处理器 (策略: {})...",
            self.shutdown_policy
        );
        let lingering = pool.shutdown(self.stop_timeout).await;

        let remaining = self.queue.len();
        if remaining > 0 {
            warn!("停止时队列中仍有 {} 条命令未执行", remaining);
        }
        if lingering > 0 {
            warn!("{} 个工作线程仍在执行当前命令", lingering);
        }

        info!("命令队列处理器已停止");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock_pool().is_some()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn shutdown_policy(&self) -> ShutdownPolicy {
        self.shutdown_policy
    }

    /// 就绪队列中等待执行的命令数
    pub fn get_queue_size(&self) -> usize {
        self.queue.len()
    }

    /// 正在执行的命令数
    pub fn in_flight(&self) -> usize {
        self.queue.unfinished()
    }

    /// 队列为空且没有命令在执行
    pub fn is_drained(&self) -> bool {
        self.queue.is_drained()
    }

    /// 等待处理器排空，超时返回 `false`
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_drained() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn get_stats(&self) -> ProcessorStats {
        self.outcomes.stats()
    }

    pub fn get_completed_commands(&self) -> Vec<CommandRecord> {
        self.outcomes.completed()
    }

    pub fn get_failed_commands(&self) -> Vec<CommandRecord> {
        self.outcomes.failed()
    }

    fn lock_pool(&self) -> MutexGuard<'_, Option<WorkerPool>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for QueueProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProcessor")
            .field("worker_count", &self.worker_count)
            .field("shutdown_policy", &self.shutdown_policy)
            .field("queue_size", &self.get_queue_size())
            .field("running", &self.is_running())
            .finish()
    }
}

/// [`QueueProcessor`] 构建器
#[derive(Debug, Clone)]
pub struct QueueProcessorBuilder {
    worker_count: usize,
    pop_timeout: Duration,
    stop_timeout: Duration,
    shutdown_policy: ShutdownPolicy,
}

impl Default for QueueProcessorBuilder {
    fn default() -> Self {
        let defaults = ProcessorConfig::default();
        Self {
            worker_count: defaults.worker_count,
            pop_timeout: defaults.pop_timeout(),
            stop_timeout: defaults.stop_timeout(),
            shutdown_policy: defaults.shutdown_policy,
        }
    }
}

impl QueueProcessorBuilder {
    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn pop_timeout(mut self, pop_timeout: Duration) -> Self {
        self.pop_timeout = pop_timeout;
        self
    }

    pub fn stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn shutdown_policy(mut self, shutdown_policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = shutdown_policy;
        self
    }

    pub fn build(self) -> SchedulerResult<QueueProcessor> {
        if self.worker_count == 0 {
            return Err(SchedulerError::Configuration(
                "工作线程数必须大于0".to_string(),
            ));
        }
        if self.worker_count > Semaphore::MAX_PERMITS {
            return Err(SchedulerError::Configuration(format!(
                "工作线程数不能超过 {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.pop_timeout.is_zero() {
            return Err(SchedulerError::Configuration(
                "出队等待超时必须大于0".to_string(),
            ));
        }

        let queue = Arc::new(ReadyQueue::new());
        let outcomes = Arc::new(ExecutionOutcomes::new());
        let executor = Arc::new(TaskExecutionManager::new(
            Arc::clone(&queue),
            Arc::clone(&outcomes),
        ));

        Ok(QueueProcessor {
            worker_count: self.worker_count,
            pop_timeout: self.pop_timeout,
            stop_timeout: self.stop_timeout,
            shutdown_policy: self.shutdown_policy,
            queue,
            outcomes,
            executor,
            slots: Arc::new(Semaphore::new(self.worker_count)),
            pool: Mutex::new(None),
        })
    }
}
