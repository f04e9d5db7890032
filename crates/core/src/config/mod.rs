//! 配置管理
//!
//! 配置按 `默认值 < TOML文件 < 环境变量` 的顺序合并，由 `config` crate 完成解析，
//! 每个配置段都提供 `validate()`。
//!
//! ```toml
//! [processor]
//! worker_count = 4
//! shutdown_policy = "drain"
//!
//! [scheduler]
//! poll_interval_ms = 100
//! admission_mode = "deadline"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

pub mod models;

pub use models::{
    AdmissionMode, AppConfig, ObservabilityConfig, ProcessorConfig, SchedulerConfig, ENV_PREFIX,
};

#[cfg(test)]
mod tests;
