//! Mock command implementations
//!
//! Every mock shares its bookkeeping through `Arc`s so a test can keep a
//! handle after the command itself has been moved into the engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use command_queue_core::{Command, ExecutionError, Priority};

/// Ordered record of which commands executed, shared between many mocks
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<(String, DateTime<Utc>)>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((label.to_string(), Utc::now()));
    }

    /// Labels in execution start order
    pub fn labels(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(label, _)| label.clone())
            .collect()
    }

    /// Start time of the first execution of `label`
    pub fn started_at(&self, label: &str) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, at)| *at)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tracks how many mocks are executing at the same time
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest number of simultaneous executions observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// What a mock does when executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Succeed,
    Fail(String),
    Panic(String),
}

/// Configurable command used throughout the workspace tests
#[derive(Debug, Clone)]
pub struct MockCommand {
    pub(crate) label: String,
    pub(crate) priority: Priority,
    pub(crate) delay: Duration,
    pub(crate) outcome: MockOutcome,
    pub(crate) log: Option<ExecutionLog>,
    pub(crate) probe: Option<ConcurrencyProbe>,
    pub(crate) executions: Arc<AtomicUsize>,
}

impl MockCommand {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Shared counter of `execute()` calls, usable after the command is moved
    pub fn execution_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.executions)
    }
}

#[async_trait]
impl Command for MockCommand {
    async fn execute(&self) -> Result<String, ExecutionError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.record(&self.label);
        }
        if let Some(probe) = &self.probe {
            probe.enter();
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(probe) = &self.probe {
            probe.exit();
        }

        match &self.outcome {
            MockOutcome::Succeed => Ok(format!("{} done", self.label)),
            MockOutcome::Fail(message) => Err(ExecutionError::new(message.clone())),
            MockOutcome::Panic(message) => panic!("{}", message),
        }
    }

    fn describe(&self) -> String {
        format!("mock {}", self.label)
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}
