//! Async wait helpers for tests that observe background workers

use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Test environment utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        Self::wait_for_with_interval(&mut condition, timeout, Duration::from_millis(10)).await
    }

    /// Wait for a condition with a custom poll interval
    pub async fn wait_for_with_interval<F>(
        mut condition: F,
        timeout: Duration,
        poll_interval: Duration,
    ) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;

        loop {
            if condition() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_for_succeeds_eventually() {
        let counter = AtomicUsize::new(0);
        let reached = TestEnv::wait_for(
            || counter.fetch_add(1, Ordering::SeqCst) >= 3,
            Duration::from_secs(1),
        )
        .await;
        assert!(reached);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let reached = TestEnv::wait_for(|| false, Duration::from_millis(50)).await;
        assert!(!reached);
    }
}
