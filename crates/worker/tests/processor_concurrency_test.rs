use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use command_queue_core::{Priority, QueuedCommand, ShutdownPolicy};
use command_queue_testing_utils::{ConcurrencyProbe, ExecutionLog, MockCommandBuilder};
use command_queue_worker::QueueProcessor;

fn processor(workers: usize) -> QueueProcessor {
    QueueProcessor::builder()
        .worker_count(workers)
        .pop_timeout(Duration::from_millis(50))
        .stop_timeout(Duration::from_secs(2))
        .shutdown_policy(ShutdownPolicy::Drop)
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_workers_run_in_parallel() {
    let processor = processor(4);
    let probe = ConcurrencyProbe::new();
    for i in 0..8 {
        processor.add_command(
            MockCommandBuilder::new(&format!("io-{i}"))
                .delay(Duration::from_millis(200))
                .probe(&probe)
                .build(),
        );
    }

    let started = Instant::now();
    processor.start_processing().unwrap();
    assert!(processor.wait_for_drain(Duration::from_secs(3)).await);
    let elapsed = started.elapsed();
    processor.stop_processing().await.unwrap();

    // 8 条 200ms 命令、4 个 worker：两轮约 400ms，串行则需 1.6s
    assert!(elapsed < Duration::from_millis(900), "took {elapsed:?}");
    assert_eq!(probe.peak(), 4);
    assert_eq!(processor.get_stats().successful, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_command_executes_exactly_once() {
    let processor = Arc::new(processor(3));
    let log = ExecutionLog::new();
    let mut counters = Vec::new();

    processor.start_processing().unwrap();

    // 多个生产者在 worker 运行时并发提交
    let mut producers = Vec::new();
    for producer in 0..4 {
        let processor = Arc::clone(&processor);
        let mut commands = Vec::new();
        for i in 0..25 {
            let mut builder = MockCommandBuilder::new(&format!("p{producer}-{i}"))
                .priority(Priority::from_level((i % 4) as u8))
                .log(&log);
            if i % 10 == 0 {
                builder = builder.failing("intentional");
            }
            let command = builder.build();
            counters.push(command.execution_counter());
            commands.push(command);
        }
        producers.push(tokio::spawn(async move {
            for command in commands {
                processor.add_command(command);
                tokio::task::yield_now().await;
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    assert!(processor.wait_for_drain(Duration::from_secs(5)).await);
    processor.stop_processing().await.unwrap();

    let stats = processor.get_stats();
    let completed = processor.get_completed_commands();
    let failed = processor.get_failed_commands();

    assert_eq!(stats.total_processed, 100);
    assert_eq!(stats.total_processed, stats.successful + stats.failed);
    assert_eq!(completed.len() as u64, stats.successful);
    assert_eq!(failed.len() as u64, stats.failed);
    assert_eq!(stats.failed, 12);

    let ids: HashSet<_> = completed.iter().chain(failed.iter()).map(|r| r.id).collect();
    assert_eq!(ids.len(), 100);
    assert!(counters
        .iter()
        .all(|c| c.load(std::sync::atomic::Ordering::SeqCst) == 1));
    assert_eq!(log.len(), 100);
}

#[tokio::test]
async fn test_creation_time_orders_equal_priority() {
    let processor = processor(1);
    let log = ExecutionLog::new();

    // 先包装的命令先创建，即使后提交
    let earlier = QueuedCommand::new(MockCommandBuilder::new("earlier").log(&log).build());
    let later = QueuedCommand::new(MockCommandBuilder::new("later").log(&log).build());
    processor.submit(later);
    processor.submit(earlier);

    processor.start_processing().unwrap();
    assert!(processor.wait_for_drain(Duration::from_secs(2)).await);
    processor.stop_processing().await.unwrap();

    assert_eq!(log.labels(), vec!["earlier", "later"]);
}

#[tokio::test]
async fn test_late_high_priority_jumps_the_queue() {
    let processor = processor(1);
    let log = ExecutionLog::new();

    processor.add_command(
        MockCommandBuilder::new("blocker")
            .delay(Duration::from_millis(100))
            .log(&log)
            .build(),
    );
    for i in 0..3 {
        processor.add_command(
            MockCommandBuilder::new(&format!("low-{i}"))
                .priority(Priority::Low)
                .log(&log)
                .build(),
        );
    }
    processor.start_processing().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    processor.add_command(
        MockCommandBuilder::new("urgent")
            .priority(Priority::Urgent)
            .log(&log)
            .build(),
    );

    assert!(processor.wait_for_drain(Duration::from_secs(2)).await);
    processor.stop_processing().await.unwrap();

    assert_eq!(
        log.labels(),
        vec!["blocker", "urgent", "low-0", "low-1", "low-2"]
    );
}
