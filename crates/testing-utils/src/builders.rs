//! Test data builders

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use command_queue_core::Priority;

use crate::mocks::{ConcurrencyProbe, ExecutionLog, MockCommand, MockOutcome};

/// Builder for [`MockCommand`]
pub struct MockCommandBuilder {
    command: MockCommand,
}

impl MockCommandBuilder {
    pub fn new(label: &str) -> Self {
        Self {
            command: MockCommand {
                label: label.to_string(),
                priority: Priority::Normal,
                delay: Duration::ZERO,
                outcome: MockOutcome::Succeed,
                log: None,
                probe: None,
                executions: Arc::new(AtomicUsize::new(0)),
            },
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.command.priority = priority;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.command.delay = delay;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.command.outcome = MockOutcome::Fail(message.to_string());
        self
    }

    pub fn panicking(mut self, message: &str) -> Self {
        self.command.outcome = MockOutcome::Panic(message.to_string());
        self
    }

    pub fn log(mut self, log: &ExecutionLog) -> Self {
        self.command.log = Some(log.clone());
        self
    }

    pub fn probe(mut self, probe: &ConcurrencyProbe) -> Self {
        self.command.probe = Some(probe.clone());
        self
    }

    pub fn build(self) -> MockCommand {
        self.command
    }
}
