use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::ShutdownPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub worker_count: usize,
    pub pop_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            pop_timeout_ms: 1000,
            stop_timeout_ms: 1000,
            shutdown_policy: ShutdownPolicy::Drop,
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_count == 0 {
            return Err(anyhow::anyhow!("工作线程数必须大于0"));
        }

        if self.pop_timeout_ms == 0 {
            return Err(anyhow::anyhow!("出队等待超时必须大于0"));
        }

        if self.stop_timeout_ms == 0 {
            return Err(anyhow::anyhow!("停止等待超时必须大于0"));
        }

        Ok(())
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// 延迟命令的准入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// 固定间隔扫描待调度列表
    Poll,
    /// 睡眠到最早的截止时间或有新命令登记
    Deadline,
}

impl Default for AdmissionMode {
    fn default() -> Self {
        AdmissionMode::Poll
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub poll_interval_ms: u64,
    pub stop_timeout_ms: u64,
    pub admission_mode: AdmissionMode,
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            stop_timeout_ms: 1000,
            admission_mode: AdmissionMode::Poll,
            shutdown_policy: ShutdownPolicy::Drop,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("调度检查间隔必须大于0"));
        }

        if self.stop_timeout_ms == 0 {
            return Err(anyhow::anyhow!("停止等待超时必须大于0"));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    pub metrics_listen_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_listen_address: "127.0.0.1:9090".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.metrics_enabled {
            self.metrics_listen_address
                .parse::<std::net::SocketAddr>()
                .map_err(|e| {
                    anyhow::anyhow!(
                        "无效的指标监听地址: {} ({e})",
                        self.metrics_listen_address
                    )
                })?;
        }
        Ok(())
    }
}
