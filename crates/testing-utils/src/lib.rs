//! # Command Queue Testing Utils
//!
//! Shared testing utilities for the command queue workspace: mock commands
//! that record their execution, builders for them, and async wait helpers.
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! command-queue-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```rust
//! use command_queue_testing_utils::{ExecutionLog, MockCommandBuilder};
//! use command_queue_core::Priority;
//!
//! let log = ExecutionLog::new();
//! let command = MockCommandBuilder::new("backup")
//!     .priority(Priority::High)
//!     .log(&log)
//!     .build();
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
