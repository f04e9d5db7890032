//! 演示用的业务服务与命令
//!
//! 服务只负责模拟耗时并记录自己做过的事，排队、调度与执行都交给引擎。

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use command_queue_core::{Command, ExecutionError, Priority};

const EMAIL_LATENCY: Duration = Duration::from_millis(500);
const FILE_LATENCY: Duration = Duration::from_millis(1000);
const BACKUP_LATENCY: Duration = Duration::from_millis(2000);

/// 按时间倍率缩放模拟延迟，倍率为 0 时不等待
pub fn scaled(base: Duration, time_scale: f64) -> Duration {
    if time_scale.is_finite() && time_scale > 0.0 {
        base.mul_f64(time_scale)
    } else {
        Duration::ZERO
    }
}

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// 邮件服务
#[derive(Debug)]
pub struct EmailService {
    latency: Duration,
    sent: Mutex<Vec<SentEmail>>,
}

impl EmailService {
    pub fn new(time_scale: f64) -> Self {
        Self {
            latency: scaled(EMAIL_LATENCY, time_scale),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> String {
        simulate_latency(self.latency).await;

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
                sent_at: Utc::now(),
            });
        format!("邮件已发送至 {to}: {subject}")
    }

    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub filename: String,
    pub operation: String,
    pub processed_at: DateTime<Utc>,
}

/// 文件处理器
#[derive(Debug)]
pub struct FileProcessor {
    latency: Duration,
    processed: Mutex<Vec<ProcessedFile>>,
}

impl FileProcessor {
    pub fn new(time_scale: f64) -> Self {
        Self {
            latency: scaled(FILE_LATENCY, time_scale),
            processed: Mutex::new(Vec::new()),
        }
    }

    pub async fn process_file(&self, filename: &str, operation: &str) -> String {
        simulate_latency(self.latency).await;

        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProcessedFile {
                filename: filename.to_string(),
                operation: operation.to_string(),
                processed_at: Utc::now(),
            });
        format!("文件 {filename} 已完成 {operation} 操作")
    }

    pub fn processed_files(&self) -> Vec<ProcessedFile> {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseOperation {
    pub kind: String,
    pub database: String,
    pub completed_at: DateTime<Utc>,
}

/// 数据库服务
#[derive(Debug)]
pub struct DatabaseService {
    latency: Duration,
    operations: Mutex<Vec<DatabaseOperation>>,
}

impl DatabaseService {
    pub fn new(time_scale: f64) -> Self {
        Self {
            latency: scaled(BACKUP_LATENCY, time_scale),
            operations: Mutex::new(Vec::new()),
        }
    }

    pub async fn backup_database(&self, database: &str) -> Result<String, ExecutionError> {
        if database.trim().is_empty() {
            return Err(ExecutionError::new("数据库名称不能为空"));
        }

        simulate_latency(self.latency).await;

        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DatabaseOperation {
                kind: "backup".to_string(),
                database: database.to_string(),
                completed_at: Utc::now(),
            });
        Ok(format!("数据库 {database} 备份完成"))
    }

    pub fn operations(&self) -> Vec<DatabaseOperation> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// 发送邮件命令
pub struct SendEmailCommand {
    service: Arc<EmailService>,
    to: String,
    subject: String,
    body: String,
    priority: Priority,
}

impl SendEmailCommand {
    pub fn new(service: Arc<EmailService>, to: &str, subject: &str, body: &str) -> Self {
        Self {
            service,
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            priority: Priority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl Command for SendEmailCommand {
    async fn execute(&self) -> Result<String, ExecutionError> {
        Ok(self
            .service
            .send_email(&self.to, &self.subject, &self.body)
            .await)
    }

    fn describe(&self) -> String {
        format!("发送邮件至 {}: {}", self.to, self.subject)
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}

/// 文件处理命令
pub struct ProcessFileCommand {
    service: Arc<FileProcessor>,
    filename: String,
    operation: String,
    priority: Priority,
}

impl ProcessFileCommand {
    pub fn new(service: Arc<FileProcessor>, filename: &str, operation: &str) -> Self {
        Self {
            service,
            filename: filename.to_string(),
            operation: operation.to_string(),
            priority: Priority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl Command for ProcessFileCommand {
    async fn execute(&self) -> Result<String, ExecutionError> {
        Ok(self
            .service
            .process_file(&self.filename, &self.operation)
            .await)
    }

    fn describe(&self) -> String {
        format!("处理文件 {}: {}", self.filename, self.operation)
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}

/// 数据库备份命令，默认高优先级
pub struct BackupDatabaseCommand {
    service: Arc<DatabaseService>,
    database: String,
    priority: Priority,
}

impl BackupDatabaseCommand {
    pub fn new(service: Arc<DatabaseService>, database: &str) -> Self {
        Self {
            service,
            database: database.to_string(),
            priority: Priority::High,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl Command for BackupDatabaseCommand {
    async fn execute(&self) -> Result<String, ExecutionError> {
        self.service.backup_database(&self.database).await
    }

    fn describe(&self) -> String {
        format!("备份数据库: {}", self.database)
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}
