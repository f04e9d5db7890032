use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use command_queue::app::{Application, DemoScenario};
use command_queue::shutdown::{wait_for_shutdown_signal, ShutdownManager};
use command_queue_core::{init_logging, AppConfig, ObservabilityConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("command-queue")
        .version("1.0.0")
        .about("进程内优先级命令队列与延迟调度引擎")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径 (默认搜索 config/command_queue.toml)")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty", "text"])
                .global(true),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("N")
                .help("工作线程数，覆盖配置文件")
                .value_parser(value_parser!(usize))
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("运行命令队列与延时调度演示")
                .arg(
                    Arg::new("scenario")
                        .short('s')
                        .long("scenario")
                        .value_name("SCENARIO")
                        .help("演示场景")
                        .value_parser(["queue", "scheduler", "all"])
                        .default_value("all"),
                )
                .arg(
                    Arg::new("time-scale")
                        .short('t')
                        .long("time-scale")
                        .value_name("FACTOR")
                        .help("模拟耗时与调度延迟的时间倍率")
                        .value_parser(value_parser!(f64))
                        .default_value("1.0"),
                ),
        )
        .subcommand(Command::new("show-config").about("输出合并后的有效配置"))
        .get_matches();

    let config = load_config(&matches)?;

    if matches.subcommand_matches("show-config").is_some() {
        print!("{}", config.to_toml().context("序列化配置失败")?);
        return Ok(());
    }

    init_logging(&config.logging).context("初始化日志系统失败")?;

    info!("启动命令队列引擎");
    if let Some(path) = matches.get_one::<String>("config") {
        info!("配置文件: {path}");
    }

    if config.observability.metrics_enabled {
        install_metrics_exporter(&config.observability)?;
    }

    let (scenario, time_scale) = match matches.subcommand_matches("run") {
        Some(run) => (
            run.get_one::<String>("scenario")
                .map(|s| s.parse::<DemoScenario>())
                .transpose()?
                .unwrap_or(DemoScenario::All),
            run.get_one::<f64>("time-scale").copied().unwrap_or(1.0),
        ),
        None => (DemoScenario::All, 1.0),
    };

    let app = Arc::new(Application::new(config, scenario, time_scale)?);
    let shutdown_manager = ShutdownManager::new();

    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    tokio::select! {
        result = &mut app_handle => {
            if let Err(e) = result {
                error!("应用任务异常退出: {e}");
            }
            info!("演示已完成");
        }
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;

            match tokio::time::timeout(SHUTDOWN_GRACE, &mut app_handle).await {
                Ok(Ok(())) => info!("应用已优雅关闭"),
                Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
                Err(_) => warn!("应用关闭超时，强制退出"),
            }
        }
    }

    info!("命令队列引擎已退出");
    Ok(())
}

/// 加载配置并应用命令行覆盖
fn load_config(matches: &ArgMatches) -> Result<AppConfig> {
    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path)
        .with_context(|| format!("加载配置失败: {}", config_path.unwrap_or("<默认>")))?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.parse()?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.parse()?;
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.processor.worker_count = *workers;
    }

    config.validate().context("配置验证失败")?;
    Ok(config)
}

fn install_metrics_exporter(config: &ObservabilityConfig) -> Result<()> {
    let addr: SocketAddr = config
        .metrics_listen_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {}", config.metrics_listen_address))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("启动Prometheus指标导出器失败")?;

    info!("Prometheus指标导出器已启动: http://{addr}/metrics");
    Ok(())
}
