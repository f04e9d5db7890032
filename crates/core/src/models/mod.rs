//! # 数据模型
//!
//! 命令队列引擎的核心数据结构：
//!
//! - [`Priority`]：命令优先级，数值越小越先执行
//! - [`QueuedCommand`]：提交后的命令包装，携带标识、时间戳、状态、结果与错误
//! - [`CommandRecord`]：命令进入终态后的只读快照
//! - [`ProcessorStats`]：处理器聚合统计
//! - [`ShutdownPolicy`]：停止时对剩余命令的处理策略
//!
//! 所有时间字段使用 `DateTime<Utc>`，状态字段使用枚举，避免无效状态。

pub mod command;
pub mod policy;
pub mod priority;
pub mod stats;

pub use command::{CommandId, CommandRecord, CommandStatus, QueuedCommand};
pub use policy::ShutdownPolicy;
pub use priority::Priority;
pub use stats::ProcessorStats;
