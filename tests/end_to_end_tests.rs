use std::time::Duration;

use command_queue::app::{Application, DemoScenario};
use command_queue_core::{AppConfig, ShutdownPolicy};
use tokio::sync::broadcast;

fn demo_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.processor.worker_count = 2;
    config.processor.pop_timeout_ms = 50;
    config.scheduler.poll_interval_ms = 20;
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_queue_demo_runs_all_commands() {
    let app = Application::new(demo_config(), DemoScenario::Queue, 0.2).unwrap();
    let (_shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

    let report = app.run_queue_demo(&mut shutdown_rx).await.unwrap();

    assert!(!report.interrupted);
    assert_eq!(report.submitted, 6);
    assert_eq!(report.left_in_queue, 0);
    assert_eq!(report.stats.total_processed, 6);
    assert_eq!(report.stats.successful, 6);
    assert!(report.failed.is_empty());

    // 紧急邮件晚于低优先级文件提交，但先于它开始执行
    let started_at = |description: &str| {
        report
            .completed
            .iter()
            .find(|r| r.description == description)
            .and_then(|r| r.started_at)
            .unwrap()
    };
    assert!(
        started_at("发送邮件至 admin@example.com: 紧急通知")
            < started_at("处理文件 data.csv: 数据清洗")
    );
}

#[tokio::test]
async fn test_scheduler_demo_sends_emails_in_deadline_order() {
    let app = Application::new(demo_config(), DemoScenario::Scheduler, 0.1).unwrap();
    let (_shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

    let report = app.run_scheduler_demo(&mut shutdown_rx).await.unwrap();

    assert!(!report.interrupted);
    assert_eq!(report.scheduled, 3);
    assert_eq!(report.emails_sent, 3);
    assert_eq!(report.pending_left, 0);

    let subjects: Vec<String> = report
        .completed
        .iter()
        .map(|r| r.description.clone())
        .collect();
    assert_eq!(
        subjects,
        vec![
            "发送邮件至 user@example.com: 立即执行",
            "发送邮件至 user@example.com: 2秒后执行",
            "发送邮件至 user@example.com: 4秒后执行",
        ]
    );
}

#[tokio::test]
async fn test_shutdown_interrupts_scheduler_demo() {
    let mut config = demo_config();
    config.scheduler.shutdown_policy = ShutdownPolicy::Drop;
    let app = Application::new(config, DemoScenario::Scheduler, 1.0).unwrap();
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = shutdown_tx.send(());
    });

    let report = tokio::time::timeout(
        Duration::from_secs(3),
        app.run_scheduler_demo(&mut shutdown_rx),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(report.interrupted);
    // 2 秒和 4 秒的任务尚未到期
    assert!(report.pending_left >= 2);
    assert!(report.emails_sent <= 1);
}

#[tokio::test]
async fn test_full_run_with_zero_time_scale() {
    let app = Application::new(demo_config(), DemoScenario::All, 0.0).unwrap();
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::time::timeout(Duration::from_secs(5), app.run(shutdown_rx))
        .await
        .unwrap()
        .unwrap();
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = AppConfig::default();
    config.processor.worker_count = 0;
    assert!(Application::new(config, DemoScenario::All, 1.0).is_err());
}
