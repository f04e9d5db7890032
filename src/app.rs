use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use command_queue_core::{
    AppConfig, CommandRecord, Priority, ProcessorConfig, ProcessorStats, QueuedCommand,
};
use command_queue_dispatcher::TaskScheduler;
use command_queue_worker::QueueProcessor;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{info, warn};

use crate::demo::{
    scaled, BackupDatabaseCommand, DatabaseService, EmailService, FileProcessor,
    ProcessFileCommand, SendEmailCommand,
};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
const SUBMIT_SPACING: Duration = Duration::from_millis(100);
const MIN_TICK: Duration = Duration::from_millis(10);
const SCHEDULED_DELAYS: [(f64, &str); 3] = [(0.5, "立即执行"), (2.0, "2秒后执行"), (4.0, "4秒后执行")];

/// 演示场景
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoScenario {
    /// 仅命令队列演示
    Queue,
    /// 仅延时调度演示
    Scheduler,
    /// 依次运行两个演示
    All,
}

impl DemoScenario {
    fn includes_queue(&self) -> bool {
        matches!(self, DemoScenario::Queue | DemoScenario::All)
    }

    fn includes_scheduler(&self) -> bool {
        matches!(self, DemoScenario::Scheduler | DemoScenario::All)
    }
}

impl FromStr for DemoScenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "queue" => Ok(DemoScenario::Queue),
            "scheduler" => Ok(DemoScenario::Scheduler),
            "all" => Ok(DemoScenario::All),
            _ => Err(anyhow::anyhow!("不支持的演示场景: {s}")),
        }
    }
}

impl fmt::Display for DemoScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DemoScenario::Queue => "queue",
            DemoScenario::Scheduler => "scheduler",
            DemoScenario::All => "all",
        };
        f.write_str(name)
    }
}

/// 命令队列演示的结果
#[derive(Debug, Clone)]
pub struct QueueDemoReport {
    pub submitted: usize,
    pub stats: ProcessorStats,
    pub completed: Vec<CommandRecord>,
    pub failed: Vec<CommandRecord>,
    pub left_in_queue: usize,
    pub interrupted: bool,
}

/// 延时调度演示的结果
#[derive(Debug, Clone)]
pub struct SchedulerDemoReport {
    pub scheduled: usize,
    pub emails_sent: usize,
    pub pending_left: usize,
    pub completed: Vec<CommandRecord>,
    pub interrupted: bool,
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    scenario: DemoScenario,
    time_scale: f64,
}

impl Application {
    pub fn new(config: AppConfig, scenario: DemoScenario, time_scale: f64) -> Result<Self> {
        if !time_scale.is_finite() || time_scale < 0.0 {
            return Err(anyhow::anyhow!("时间倍率必须是非负数: {time_scale}"));
        }
        config.validate().context("配置验证失败")?;

        info!("初始化应用程序，场景: {}, 时间倍率: {}", scenario, time_scale);
        Ok(Self {
            config,
            scenario,
            time_scale,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 运行选定的演示，收到关闭信号时提前结束
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.scenario.includes_queue() {
            let report = self.run_queue_demo(&mut shutdown_rx).await?;
            log_queue_report(&report);
            if report.interrupted {
                return Ok(());
            }
        }

        if self.scenario.includes_scheduler() {
            let report = self.run_scheduler_demo(&mut shutdown_rx).await?;
            log_scheduler_report(&report);
        }

        Ok(())
    }

    /// 命令队列演示：不同优先级的命令交给多个 worker 执行
    pub async fn run_queue_demo(
        &self,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<QueueDemoReport> {
        info!("==================== 命令队列和异步执行演示 ====================");

        let email_service = Arc::new(EmailService::new(self.time_scale));
        let file_processor = Arc::new(FileProcessor::new(self.time_scale));
        let db_service = Arc::new(DatabaseService::new(self.time_scale));

        let processor = QueueProcessor::from_config(&self.config.processor)
            .context("创建命令队列处理器失败")?;
        processor.start_processing().context("启动命令队列处理器失败")?;

        // 先创建全部命令，创建时间决定同优先级命令的先后
        let commands = vec![
            QueuedCommand::new(
                SendEmailCommand::new(
                    Arc::clone(&email_service),
                    "user1@example.com",
                    "普通邮件",
                    "这是一封普通邮件",
                )
                .with_priority(Priority::Normal),
            ),
            QueuedCommand::new(BackupDatabaseCommand::new(
                Arc::clone(&db_service),
                "production_db",
            )),
            QueuedCommand::new(
                ProcessFileCommand::new(Arc::clone(&file_processor), "data.csv", "数据清洗")
                    .with_priority(Priority::Low),
            ),
            QueuedCommand::new(
                SendEmailCommand::new(
                    Arc::clone(&email_service),
                    "admin@example.com",
                    "紧急通知",
                    "系统出现问题",
                )
                .with_priority(Priority::Urgent),
            ),
            QueuedCommand::new(ProcessFileCommand::new(
                Arc::clone(&file_processor),
                "report.pdf",
                "生成报告",
            )),
            QueuedCommand::new(BackupDatabaseCommand::new(
                Arc::clone(&db_service),
                "backup_db",
            )),
        ];

        info!("1. 添加不同优先级的命令到队列");
        let mut submitted = 0;
        let mut interrupted = false;
        for command in commands {
            processor.submit(command);
            submitted += 1;

            if pause(shutdown_rx, scaled(SUBMIT_SPACING, self.time_scale)).await {
                interrupted = true;
                break;
            }
        }

        info!("2. 队列大小: {}", processor.get_queue_size());

        if !interrupted {
            info!("3. 等待命令执行完成...");
            interrupted = wait_until(
                shutdown_rx,
                self.progress_tick(),
                || processor.is_drained(),
                || {
                    info!(
                        "   队列剩余: {}, 已处理: {}",
                        processor.get_queue_size(),
                        processor.get_stats().total_processed
                    )
                },
            )
            .await;
        }

        processor
            .stop_processing()
            .await
            .context("停止命令队列处理器失败")?;

        Ok(QueueDemoReport {
            submitted,
            stats: processor.get_stats(),
            completed: processor.get_completed_commands(),
            failed: processor.get_failed_commands(),
            left_in_queue: processor.get_queue_size(),
            interrupted,
        })
    }

    /// 延时调度演示：单个 worker 按截止时间依次发送三封邮件
    pub async fn run_scheduler_demo(
        &self,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<SchedulerDemoReport> {
        info!("==================== 任务调度器演示 ====================");

        let email_service = Arc::new(EmailService::new(self.time_scale));
        let processor_config = ProcessorConfig {
            worker_count: 1,
            ..self.config.processor.clone()
        };
        let processor = Arc::new(
            QueueProcessor::from_config(&processor_config).context("创建命令队列处理器失败")?,
        );
        let scheduler = TaskScheduler::with_config(Arc::clone(&processor), &self.config.scheduler)
            .context("创建调度器失败")?;

        processor.start_processing().context("启动命令队列处理器失败")?;
        scheduler.start_scheduler().context("启动调度器失败")?;

        info!("1. 调度延迟执行的任务");
        for (delay, subject) in SCHEDULED_DELAYS {
            scheduler.schedule_command(
                SendEmailCommand::new(
                    Arc::clone(&email_service),
                    "user@example.com",
                    subject,
                    &format!("这个任务{subject}"),
                ),
                delay * self.time_scale,
            );
        }

        info!("2. 待调度任务数: {}", scheduler.get_pending_tasks_count());

        info!("3. 等待调度任务执行...");
        let started = tokio::time::Instant::now();
        let interrupted = wait_until(
            shutdown_rx,
            self.progress_tick(),
            || scheduler.get_pending_tasks_count() == 0 && processor.is_drained(),
            || {
                info!(
                    "   已等待 {:.1}s, 待调度: {}, 队列: {}",
                    started.elapsed().as_secs_f64(),
                    scheduler.get_pending_tasks_count(),
                    processor.get_queue_size()
                )
            },
        )
        .await;

        scheduler.stop_scheduler().await.context("停止调度器失败")?;
        processor
            .stop_processing()
            .await
            .context("停止命令队列处理器失败")?;

        Ok(SchedulerDemoReport {
            scheduled: SCHEDULED_DELAYS.len(),
            emails_sent: email_service.sent_emails().len(),
            pending_left: scheduler.get_pending_tasks_count(),
            completed: processor.get_completed_commands(),
            interrupted,
        })
    }

    fn progress_tick(&self) -> Duration {
        scaled(PROGRESS_INTERVAL, self.time_scale).max(MIN_TICK)
    }
}

/// 等待指定时长，期间收到关闭信号返回 `true`
async fn pause(shutdown_rx: &mut broadcast::Receiver<()>, duration: Duration) -> bool {
    if duration.is_zero() {
        return false;
    }
    tokio::select! {
        _ = shutdown_rx.recv() => {
            warn!("演示被中断");
            true
        }
        _ = sleep(duration) => false,
    }
}

/// 周期检查 `done`，每个周期调用一次 `progress`；收到关闭信号返回 `true`
async fn wait_until<D, P>(
    shutdown_rx: &mut broadcast::Receiver<()>,
    tick: Duration,
    mut done: D,
    mut progress: P,
) -> bool
where
    D: FnMut() -> bool,
    P: FnMut(),
{
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        if done() {
            return false;
        }
        tokio::select! {
            _ = shutdown_rx.recv() => {
                warn!("演示被中断");
                return true;
            }
            _ = ticker.tick() => progress(),
        }
    }
}

fn log_queue_report(report: &QueueDemoReport) {
    let stats = &report.stats;
    info!("4. 执行统计:");
    info!("   总处理数: {}", stats.total_processed);
    info!("   成功数: {}", stats.successful);
    info!("   失败数: {}", stats.failed);
    info!(
        "   总执行时间: {:.2} 秒",
        stats.total_execution_time.as_secs_f64()
    );

    info!("5. 已完成的命令:");
    for record in &report.completed {
        info!(
            "   {} - 执行时间: {:.2}s",
            record.description,
            record.execution_time.unwrap_or_default().as_secs_f64()
        );
    }
    for record in &report.failed {
        warn!(
            "   {} - 失败: {}",
            record.description,
            record.error.as_deref().unwrap_or_default()
        );
    }
    if report.left_in_queue > 0 {
        warn!("   {} 条命令未执行", report.left_in_queue);
    }
}

fn log_scheduler_report(report: &SchedulerDemoReport) {
    if report.interrupted {
        warn!(
            "4. 调度被中断，仍有 {} 个待调度任务",
            report.pending_left
        );
    } else {
        info!("4. 调度完成，所有任务已执行");
    }
    info!("   发送的邮件数量: {}", report.emails_sent);
}
