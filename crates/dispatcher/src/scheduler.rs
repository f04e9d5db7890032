use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use command_queue_core::{
    AdmissionMode, Command, CommandId, QueuedCommand, SchedulerConfig, SchedulerError,
    SchedulerResult, ShutdownPolicy,
};
use command_queue_worker::QueueProcessor;
use metrics::{counter, gauge};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::pending::PendingTasks;

/// Deadline 模式下待调度列表为空时的最长睡眠，登记新命令会提前唤醒
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// 调度器与准入循环共享的状态
#[derive(Debug, Default)]
struct SchedulerShared {
    pending: PendingTasks,
    wakeup: Notify,
}

struct AdmissionLoop {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// 延时任务调度器
///
/// 直接登记的命令在登记时包装，创建时间为登记时间；已包装的命令保留原有创建时间。
/// 到达截止时间后原样提交给处理器，之后的排序与执行完全由处理器负责。
pub struct TaskScheduler {
    processor: Arc<QueueProcessor>,
    config: SchedulerConfig,
    shared: Arc<SchedulerShared>,
    admission: Mutex<Option<AdmissionLoop>>,
}

impl TaskScheduler {
    pub fn new(processor: Arc<QueueProcessor>) -> Self {
        Self {
            processor,
            config: SchedulerConfig::default(),
            shared: Arc::new(SchedulerShared::default()),
            admission: Mutex::new(None),
        }
    }

    pub fn with_config(
        processor: Arc<QueueProcessor>,
        config: &SchedulerConfig,
    ) -> SchedulerResult<Self> {
        config
            .validate()
            .map_err(|e| SchedulerError::Configuration(e.to_string()))?;

        Ok(Self {
            config: config.clone(),
            ..Self::new(processor)
        })
    }

    /// 登记一条在 `delay_seconds` 秒后到期的命令
    ///
    /// 零、负数或 NaN 视为立即到期。
    pub fn schedule_command<C>(&self, command: C, delay_seconds: f64) -> CommandId
    where
        C: Command + 'static,
    {
        let deadline = deadline_after(Utc::now(), delay_seconds);
        self.schedule_command_at(command, deadline)
    }

    /// 登记一条在指定时间到期的命令
    pub fn schedule_command_at<C>(&self, command: C, deadline: DateTime<Utc>) -> CommandId
    where
        C: Command + 'static,
    {
        self.schedule_queued_at(QueuedCommand::new(command), deadline)
    }

    /// 登记已包装的命令，保留其创建时间
    pub fn schedule_queued(&self, command: QueuedCommand, delay_seconds: f64) -> CommandId {
        let deadline = deadline_after(Utc::now(), delay_seconds);
        self.schedule_queued_at(command, deadline)
    }

    pub fn schedule_queued_at(
        &self,
        command: QueuedCommand,
        deadline: DateTime<Utc>,
    ) -> CommandId {
        let id = command.id();
        info!(
            "命令已计划执行: {} (执行时间: {})",
            command.describe(),
            deadline.format("%H:%M:%S%.3f")
        );

        self.shared.pending.push(deadline, command);
        gauge!("command_queue_scheduler_pending").set(self.shared.pending.len() as f64);
        self.shared.wakeup.notify_one();
        id
    }

    pub fn start_scheduler(&self) -> SchedulerResult<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SchedulerError::Internal(
                "start_scheduler 需要在 tokio 运行时中调用".to_string(),
            ));
        }

        let mut admission = self.lock_admission();
        if admission.is_some() {
            warn!("调度器已在运行");
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(
            run_admission(
                Arc::clone(&self.shared),
                Arc::clone(&self.processor),
                self.config.clone(),
                shutdown_rx,
            )
            .instrument(info_span!("scheduler")),
        );
        *admission = Some(AdmissionLoop {
            shutdown_tx,
            handle,
        });

        info!(
            "调度器已启动 (模式: {:?}, 检查间隔: {:?})",
            self.config.admission_mode,
            self.config.poll_interval()
        );
        Ok(())
    }

    /// 停止准入循环
    ///
    /// `Drop` 策略下未到期的命令留在待调度列表中；`Drain` 策略下继续按截止时间准入，
    /// 超过 `stop_timeout` 后终止循环，剩余命令同样留在列表中。
    pub async fn stop_scheduler(&self) -> SchedulerResult<()> {
        let admission = self.lock_admission().take();
        let Some(AdmissionLoop {
            shutdown_tx,
            mut handle,
        }) = admission
        else {
            debug!("调度器未在运行");
            return Ok(());
        };

        let _ = shutdown_tx.send(());
        let stop_timeout = self.config.stop_timeout();
        match timeout(stop_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!("调度循环未在 {:?} 内退出，已强制终止", stop_timeout);
                handle.abort();
            }
        }

        let remaining = self.shared.pending.len();
        if remaining > 0 {
            warn!("调度器停止时仍有 {} 个待调度任务", remaining);
        }
        info!("调度器已停止");
        Ok(())
    }

    pub fn get_pending_tasks_count(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn is_running(&self) -> bool {
        self.lock_admission().is_some()
    }

    pub fn processor(&self) -> &Arc<QueueProcessor> {
        &self.processor
    }

    fn lock_admission(&self) -> MutexGuard<'_, Option<AdmissionLoop>> {
        self.admission.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("config", &self.config)
            .field("pending", &self.get_pending_tasks_count())
            .field("running", &self.is_running())
            .finish()
    }
}

fn deadline_after(now: DateTime<Utc>, delay_seconds: f64) -> DateTime<Utc> {
    if delay_seconds.is_nan() || delay_seconds <= 0.0 {
        return now;
    }

    Duration::try_from_secs_f64(delay_seconds)
        .ok()
        .and_then(|delay| TimeDelta::from_std(delay).ok())
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

async fn run_admission(
    shared: Arc<SchedulerShared>,
    processor: Arc<QueueProcessor>,
    config: SchedulerConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let wake_on_schedule = config.admission_mode == AdmissionMode::Deadline;

    loop {
        admit_due(&shared, &processor);

        let wait = next_wait(&shared, &config);
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                debug!("调度循环收到停止信号");
                break;
            }
            _ = shared.wakeup.notified(), if wake_on_schedule => {}
            _ = sleep(wait) => {}
        }
    }

    if config.shutdown_policy == ShutdownPolicy::Drain {
        info!("调度器排空剩余 {} 个待调度任务", shared.pending.len());
        while !shared.pending.is_empty() {
            admit_due(&shared, &processor);
            sleep(next_wait(&shared, &config)).await;
        }
    }

    debug!("调度循环已退出");
}

/// 提交所有已到期命令，返回提交数量
fn admit_due(shared: &SchedulerShared, processor: &QueueProcessor) -> usize {
    let due = shared.pending.take_due(Utc::now());
    let admitted = due.len();
    for command in due {
        info!("调度任务已添加到执行队列: {}", command.describe());
        processor.submit(command);
    }

    if admitted > 0 {
        counter!("command_queue_scheduler_admitted_total").increment(admitted as u64);
        gauge!("command_queue_scheduler_pending").set(shared.pending.len() as f64);
    }
    admitted
}

fn next_wait(shared: &SchedulerShared, config: &SchedulerConfig) -> Duration {
    match config.admission_mode {
        AdmissionMode::Poll => config.poll_interval(),
        AdmissionMode::Deadline => shared
            .pending
            .time_until_next(Utc::now())
            .unwrap_or(IDLE_WAIT),
    }
}
