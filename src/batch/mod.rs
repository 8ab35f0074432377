//! Batch Jobs
//!
//! Runs a list of work items (test cases to run or evaluate against an LLM)
//! as one tracked background task.

pub mod job;

pub use job::{BatchError, BatchJob, ItemProcessor};
