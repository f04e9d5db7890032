use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tempfile::NamedTempFile;

use super::*;
use crate::logging::{LogLevel, OutputFormat};
use crate::models::ShutdownPolicy;

/// `AppConfig::load` 会读取进程环境变量，修改或读取环境的测试需串行执行
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_app_config_default() {
    let config = AppConfig::default();
    assert_eq!(config.processor.worker_count, 3);
    assert_eq!(config.processor.pop_timeout(), Duration::from_secs(1));
    assert_eq!(config.processor.shutdown_policy, ShutdownPolicy::Drop);
    assert_eq!(config.scheduler.poll_interval(), Duration::from_millis(100));
    assert_eq!(config.scheduler.admission_mode, AdmissionMode::Poll);
    assert!(!config.observability.metrics_enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn test_app_config_from_toml() {
    let toml_str = r#"
[processor]
worker_count = 8
shutdown_policy = "drain"

[scheduler]
poll_interval_ms = 50
admission_mode = "deadline"

[logging]
level = "debug"
format = "json"
"#;

    let config = AppConfig::from_toml(toml_str).expect("Failed to parse TOML");
    assert_eq!(config.processor.worker_count, 8);
    assert_eq!(config.processor.shutdown_policy, ShutdownPolicy::Drain);
    // 未出现的字段保持默认值
    assert_eq!(config.processor.pop_timeout_ms, 1000);
    assert_eq!(config.scheduler.poll_interval_ms, 50);
    assert_eq!(config.scheduler.admission_mode, AdmissionMode::Deadline);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, OutputFormat::Json);
}

#[test]
fn test_zero_workers_rejected() {
    let toml_str = r#"
[processor]
worker_count = 0
"#;
    let err = AppConfig::from_toml(toml_str).unwrap_err();
    assert!(format!("{err:#}").contains("工作线程数必须大于0"));
}

#[test]
fn test_invalid_metrics_address_rejected() {
    let mut config = AppConfig::default();
    config.observability.metrics_enabled = true;
    config.observability.metrics_listen_address = "not-an-address".to_string();
    assert!(config.validate().is_err());

    config.observability.metrics_enabled = false;
    assert!(config.validate().is_ok());
}

#[test]
fn test_toml_round_trip_preserves_sections() {
    let mut config = AppConfig::default();
    config.processor.worker_count = 5;
    config.scheduler.shutdown_policy = ShutdownPolicy::Drain;

    let rendered = config.to_toml().unwrap();
    let parsed = AppConfig::from_toml(&rendered).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[processor]
worker_count = 2
stop_timeout_ms = 2500

[scheduler]
stop_timeout_ms = 750
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let _lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.processor.worker_count, 2);
    assert_eq!(config.processor.stop_timeout(), Duration::from_millis(2500));
    assert_eq!(config.scheduler.stop_timeout(), Duration::from_millis(750));
    assert_eq!(config.scheduler.poll_interval_ms, 100);
}

#[test]
fn test_load_missing_file_fails() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let result = AppConfig::load(Some("/definitely/not/here/command_queue.toml"));
    assert!(result.is_err());
}

#[test]
fn test_environment_overrides_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[observability]
metrics_listen_address = "127.0.0.1:9100"
"#
    )
    .unwrap();

    let _lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    std::env::set_var(
        format!("{ENV_PREFIX}__OBSERVABILITY__METRICS_LISTEN_ADDRESS"),
        "127.0.0.1:9200",
    );
    let path = file.path().to_str().unwrap().to_string();
    let config = AppConfig::load(Some(&path));
    std::env::remove_var(format!("{ENV_PREFIX}__OBSERVABILITY__METRICS_LISTEN_ADDRESS"));

    let config = config.unwrap();
    assert_eq!(config.observability.metrics_listen_address, "127.0.0.1:9200");
}
