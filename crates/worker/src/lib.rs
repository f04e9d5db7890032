//! # Command Queue Worker
//!
//! 就绪队列、固定大小的 worker 池以及对外的 [`QueueProcessor`]。

pub mod components;
pub mod processor;
pub mod ready_queue;


pub use processor::{QueueProcessor, QueueProcessorBuilder};
pub use ready_queue::ReadyQueue;
