use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use command_queue_core::QueuedCommand;

/// 待调度条目，按 (截止时间, 登记序号) 排序，堆顶为最早到期者
#[derive(Debug)]
struct ScheduledEntry {
    deadline: DateTime<Utc>,
    seq: u64,
    command: QueuedCommand,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct PendingInner {
    heap: BinaryHeap<ScheduledEntry>,
    next_seq: u64,
}

/// 待调度列表
///
/// 只由调度器持有。取出到期条目在一次加锁内完成，条目要么还在列表里，要么已经交给调用方。
#[derive(Debug, Default)]
pub struct PendingTasks {
    inner: Mutex<PendingInner>,
}

impl PendingTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, deadline: DateTime<Utc>, command: QueuedCommand) {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(ScheduledEntry {
            deadline,
            seq,
            command,
        });
    }

    /// 取出所有截止时间不晚于 `now` 的命令，按到期顺序返回
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<QueuedCommand> {
        let mut inner = self.lock();
        let mut due = Vec::new();
        while inner
            .heap
            .peek()
            .is_some_and(|entry| entry.deadline <= now)
        {
            if let Some(entry) = inner.heap.pop() {
                due.push(entry.command);
            }
        }
        due
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.lock().heap.peek().map(|entry| entry.deadline)
    }

    /// 距最早截止时间的剩余时长；已到期返回零，列表为空返回 `None`
    pub fn time_until_next(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| (deadline - now).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, PendingInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
