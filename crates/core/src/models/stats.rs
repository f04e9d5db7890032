use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 处理器统计信息
///
/// 没有命令在执行时，`total_processed == successful + failed` 恒成立。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    /// 成功命令的累计执行时间
    pub total_execution_time: Duration,
}

impl ProcessorStats {
    pub fn record_success(&mut self, elapsed: Duration) {
        self.total_processed += 1;
        self.successful += 1;
        self.total_execution_time += elapsed;
    }

    pub fn record_failure(&mut self) {
        self.total_processed += 1;
        self.failed += 1;
    }

    /// 成功命令的平均执行时间
    pub fn average_execution_time(&self) -> Option<Duration> {
        if self.successful == 0 {
            return None;
        }
        u32::try_from(self.successful)
            .ok()
            .map(|count| self.total_execution_time / count)
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_processed as f64
        }
    }
}
