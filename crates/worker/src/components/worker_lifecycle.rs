use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use command_queue_core::ShutdownPolicy;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

use super::TaskExecutionManager;
use crate::ready_queue::ReadyQueue;

/// 单个 worker 的循环
///
/// 反复从就绪队列取命令并执行；取不到命令只是正常超时，回到循环检查运行标志。
/// 正在执行的命令总会执行完，停止只阻止后续出队。
/// `Drain` 策略下停止后继续出队，直到队列为空或超过停止信号携带的截止时间。
pub struct WorkerLifecycle {
    worker_id: usize,
    queue: Arc<ReadyQueue>,
    executor: Arc<TaskExecutionManager>,
    alive: Arc<AtomicBool>,
    pop_timeout: Duration,
    shutdown_policy: ShutdownPolicy,
}

impl WorkerLifecycle {
    pub fn new(
        worker_id: usize,
        queue: Arc<ReadyQueue>,
        executor: Arc<TaskExecutionManager>,
        alive: Arc<AtomicBool>,
        pop_timeout: Duration,
        shutdown_policy: ShutdownPolicy,
    ) -> Self {
        Self {
            worker_id,
            queue,
            executor,
            alive,
            pop_timeout,
            shutdown_policy,
        }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<Instant>) {
        debug!("Worker {} 已启动", self.worker_id);

        let mut drain_deadline = None;
        while self.alive.load(Ordering::Acquire) {
            tokio::select! {
                biased;
                signal = shutdown_rx.recv() => {
                    debug!("Worker {} 收到停止信号", self.worker_id);
                    drain_deadline = signal.ok();
                    break;
                }
                popped = self.queue.pop(self.pop_timeout) => {
                    if let Some(command) = popped {
                        self.executor.handle_command(self.worker_id, command).await;
                    }
                }
            }
        }

        if self.shutdown_policy == ShutdownPolicy::Drain {
            // 停止信号先于运行标志发出，这里一定能取到截止时间
            let deadline = drain_deadline.or_else(|| shutdown_rx.try_recv().ok());
            while deadline.is_some_and(|deadline| Instant::now() < deadline) {
                let Some(command) = self.queue.try_pop() else {
                    break;
                };
                self.executor.handle_command(self.worker_id, command).await;
            }
        }

        debug!("Worker {} 已退出", self.worker_id);
    }
}

/// 一次 `start_processing` 启动的一组 worker
///
/// 每组有独立的存活标志，不会被之后新启动的组重新激活。
/// worker 在整个生命周期内持有处理器的一个名额，旧组中超时未退出的 worker
/// 执行完手中命令前不会归还名额，因此同时运行的 worker 数始终不超过配置值。
pub struct WorkerPool {
    alive: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<Instant>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        worker_count: usize,
        queue: &Arc<ReadyQueue>,
        executor: &Arc<TaskExecutionManager>,
        pop_timeout: Duration,
        shutdown_policy: ShutdownPolicy,
        slots: &Arc<Semaphore>,
    ) -> Self {
        let alive = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, _) = broadcast::channel(1);

        let handles = (0..worker_count)
            .map(|worker_id| {
                let slots = Arc::clone(slots);
                let lifecycle = WorkerLifecycle::new(
                    worker_id,
                    Arc::clone(queue),
                    Arc::clone(executor),
                    Arc::clone(&alive),
                    pop_timeout,
                    shutdown_policy,
                );
                let shutdown_rx = shutdown_tx.subscribe();
                tokio::spawn(
                    async move {
                        let Ok(_slot) = slots.acquire_owned().await else {
                            warn!("Worker {} 无法获取执行名额", worker_id);
                            return;
                        };
                        lifecycle.run(shutdown_rx).await;
                    }
                    .instrument(info_span!("worker", worker_id)),
                )
            })
            .collect();

        Self {
            alive,
            shutdown_tx,
            handles,
        }
    }

    /// 通知所有 worker 停止，并在 `join_timeout` 内等待全部退出
    ///
    /// 超时后 worker 不再出队，只把手中的命令执行完。返回尚未退出的 worker 数量。
    pub async fn shutdown(self, join_timeout: Duration) -> usize {
        let deadline = Instant::now() + join_timeout;
        let _ = self.shutdown_tx.send(deadline);
        self.alive.store(false, Ordering::Release);

        let total = self.handles.len();
        let mut lingering = 0;
        for (worker_id, mut handle) in self.handles.into_iter().enumerate() {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Worker {} 异常退出: {}", worker_id, e),
                Err(_) => {
                    warn!(
                        "Worker {} 未在 {:?} 内退出，将在当前命令完成后结束",
                        worker_id, join_timeout
                    );
                    lingering += 1;
                }
            }
        }

        info!("已停止 {}/{} 个工作线程", total - lingering, total);
        lingering
    }
}
