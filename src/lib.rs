// Background task execution for batch LLM jobs.
//
// Work is submitted to a `TaskManager`, runs on the tokio runtime, and is
// observed through snapshots until it completes, fails, or is stopped.

pub mod batch;
pub mod commands;
pub mod config;
pub mod tasks;

pub use batch::{BatchError, BatchJob, ItemProcessor};
pub use config::{ConfigError, TaskConfig};
pub use tasks::{Cancelled, ProgressReporter, TaskEvent, TaskManager, TaskSnapshot, TaskStatus};
