use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SchedulerError;

/// 停止时对尚未执行（或尚未准入）命令的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// 立即停止，剩余命令不执行
    Drop,
    /// 处理完剩余命令后再停止（受停止超时约束）
    Drain,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        ShutdownPolicy::Drop
    }
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownPolicy::Drop => f.write_str("drop"),
            ShutdownPolicy::Drain => f.write_str("drain"),
        }
    }
}

impl FromStr for ShutdownPolicy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(ShutdownPolicy::Drop),
            "drain" => Ok(ShutdownPolicy::Drain),
            _ => Err(SchedulerError::Configuration(format!(
                "Invalid shutdown policy: {s}"
            ))),
        }
    }
}
