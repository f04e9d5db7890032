pub mod app_config;
pub mod processor_scheduler;

pub use app_config::{AppConfig, ENV_PREFIX};
pub use processor_scheduler::{AdmissionMode, ObservabilityConfig, ProcessorConfig, SchedulerConfig};
