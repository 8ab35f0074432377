//! Tasks Module
//!
//! Background task execution and tracking.
//! Runs long batch jobs off the caller's path, exposes progress to pollers,
//! and supports cooperative cancellation.

pub mod manager;
pub mod reporter;
pub mod types;

pub use manager::TaskManager;
pub use reporter::{Cancelled, ProgressReporter};
pub use types::{TaskEvent, TaskSnapshot, TaskStatus};
