use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use command_queue_core::QueuedCommand;
use metrics::gauge;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

/// 堆元素：反转排序键，使 `BinaryHeap`（大顶堆）弹出排序键最小的命令
#[derive(Debug)]
struct ReadyEntry(QueuedCommand);

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReadyEntry {}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp_ready_order(&self.0)
    }
}

/// 就绪队列
///
/// 线程安全的优先级容器，按 (优先级, 创建时间, 提交序号) 出队。
/// 高优先级命令持续到达时低优先级命令可能一直得不到执行，这是既定行为。
///
/// 除排队中的命令外还跟踪已出队但尚未 `task_done` 的命令数，
/// 两者在同一把锁下读取，因此 [`ReadyQueue::is_drained`] 不会在出队与执行之间误判。
#[derive(Debug, Default)]
pub struct ReadyQueue {
    heap: Mutex<BinaryHeap<ReadyEntry>>,
    unfinished: AtomicUsize,
    notify: Notify,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队，O(log n)，不阻塞
    pub fn push(&self, command: QueuedCommand) {
        let depth = {
            let mut heap = self.lock();
            heap.push(ReadyEntry(command));
            heap.len()
        };
        gauge!("command_queue_ready_depth").set(depth as f64);
        self.notify.notify_one();
    }

    /// 立即尝试出队
    pub fn try_pop(&self) -> Option<QueuedCommand> {
        let (command, depth) = {
            let mut heap = self.lock();
            let command = heap.pop().map(|entry| entry.0);
            if command.is_some() {
                self.unfinished.fetch_add(1, AtomicOrdering::SeqCst);
            }
            (command, heap.len())
        };
        if command.is_some() {
            gauge!("command_queue_ready_depth").set(depth as f64);
        }
        command
    }

    /// 最多等待 `timeout` 取出排序键最小的命令，超时返回 `None`
    ///
    /// 命令在同步代码中移出队列，中途丢弃该 future 不会丢失命令。
    pub async fn pop(&self, timeout: Duration) -> Option<QueuedCommand> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(command) = self.try_pop() {
                return Some(command);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                trace!("ready queue pop timed out after {:?}", timeout);
                return self.try_pop();
            }
        }
    }

    /// 标记一条已出队命令处理完毕
    pub fn task_done(&self) {
        let _ = self
            .unfinished
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 已出队但尚未处理完的命令数
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(AtomicOrdering::SeqCst)
    }

    /// 队列为空且没有命令在执行
    pub fn is_drained(&self) -> bool {
        let heap = self.lock();
        heap.is_empty() && self.unfinished.load(AtomicOrdering::SeqCst) == 0
    }

    /// 清空排队中的命令，返回被移除的数量
    pub fn clear(&self) -> usize {
        let removed = {
            let mut heap = self.lock();
            let removed = heap.len();
            heap.clear();
            removed
        };
        gauge!("command_queue_ready_depth").set(0.0);
        removed
    }

    fn lock(&self) -> MutexGuard<'_, BinaryHeap<ReadyEntry>> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use command_queue_core::Priority;
    use command_queue_testing_utils::MockCommandBuilder;

    use super::*;

    fn queued(label: &str, priority: Priority) -> QueuedCommand {
        QueuedCommand::new(MockCommandBuilder::new(label).priority(priority).build())
    }

    #[test]
    fn test_pops_in_priority_order() {
        let queue = ReadyQueue::new();
        queue.push(queued("low", Priority::Low));
        queue.push(queued("urgent", Priority::Urgent));
        queue.push(queued("normal", Priority::Normal));
        queue.push(queued("high", Priority::High));

        let order: Vec<String> = std::iter::from_fn(|| queue.try_pop())
            .map(|c| c.describe())
            .collect();
        assert_eq!(
            order,
            vec!["mock urgent", "mock high", "mock normal", "mock low"]
        );
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let queue = ReadyQueue::new();
        for i in 0..20 {
            queue.push(queued(&format!("cmd-{i}"), Priority::Normal));
        }
        for i in 0..20 {
            let command = queue.try_pop().unwrap();
            assert_eq!(command.describe(), format!("mock cmd-{i}"));
        }
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_creation_order_wins_over_push_order() {
        let queue = ReadyQueue::new();
        let first = queued("first", Priority::Normal);
        let second = queued("second", Priority::Normal);
        queue.push(second);
        queue.push(first);

        assert_eq!(queue.try_pop().unwrap().describe(), "mock first");
        assert_eq!(queue.try_pop().unwrap().describe(), "mock second");
    }

    #[test]
    fn test_unfinished_tracking_and_drain() {
        let queue = ReadyQueue::new();
        assert!(queue.is_drained());

        queue.push(queued("a", Priority::Normal));
        assert!(!queue.is_drained());
        assert_eq!(queue.len(), 1);

        let _command = queue.try_pop().unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.unfinished(), 1);
        assert!(!queue.is_drained());

        queue.task_done();
        assert!(queue.is_drained());

        // 多余的 task_done 不会下溢
        queue.task_done();
        assert_eq!(queue.unfinished(), 0);
    }

    #[test]
    fn test_clear_returns_removed_count() {
        let queue = ReadyQueue::new();
        queue.push(queued("a", Priority::Normal));
        queue.push(queued("b", Priority::Low));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_times_out_on_empty_queue() {
        let queue = ReadyQueue::new();
        let started = Instant::now();
        let popped = queue.pop(Duration::from_millis(50)).await;
        assert!(popped.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let queue = Arc::new(ReadyQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(queued("late", Priority::Normal));

        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake well before its own timeout")
            .unwrap();
        assert_eq!(popped.unwrap().describe(), "mock late");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumers_take_each_command_once() {
        let queue = Arc::new(ReadyQueue::new());
        for i in 0..200 {
            queue.push(queued(&format!("c{i}"), Priority::from_level((i % 4) as u8)));
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            consumers.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Some(command) = queue.pop(Duration::from_millis(20)).await {
                    taken.push(command.id());
                    queue.task_done();
                }
                taken
            }));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        let unique: std::collections::HashSet<_> = all.iter().copied().collect();
        assert_eq!(all.len(), 200);
        assert_eq!(unique.len(), 200);
        assert!(queue.is_drained());
    }
}
