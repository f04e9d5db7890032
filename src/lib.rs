//! # Command Queue
//!
//! 演示程序的组装层：业务服务与命令 ([`demo`])、演示流程 ([`app`]) 以及优雅关闭 ([`shutdown`])。
//! 引擎本身位于 `command-queue-worker` 与 `command-queue-dispatcher`。

pub mod app;
pub mod demo;
pub mod shutdown;
