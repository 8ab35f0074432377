//! Task Commands
//!
//! Poller-facing operations over the task manager. Transport layers call
//! these and send the results to clients as JSON.

use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::tasks::{TaskManager, TaskSnapshot, TaskStatus};

/// Task manager state shared with transport handlers
#[derive(Clone)]
pub struct TaskManagerState(pub Arc<TaskManager>);

impl Default for TaskManagerState {
    fn default() -> Self {
        Self(Arc::new(TaskManager::new()))
    }
}

/// Command errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("task_id is required")]
    MissingTaskId,

    #[error("Task not found")]
    NotFound(String),
}

impl From<CommandError> for String {
    fn from(err: CommandError) -> String {
        err.to_string()
    }
}

/// Body of a stop request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopTaskRequest {
    #[serde(default)]
    pub task_id: String,
}

/// Reply to a stop request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTaskResponse {
    pub message: String,
}

/// Task counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCount {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
}

/// Get task status by ID
pub fn get_task_status(
    task_manager: &TaskManagerState,
    task_id: &str,
) -> Result<TaskSnapshot, CommandError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(CommandError::MissingTaskId);
    }

    task_manager
        .0
        .get_task(task_id)
        .ok_or_else(|| CommandError::NotFound(task_id.to_string()))
}

/// Stop a task. Always succeeds, whether or not the task exists.
pub fn stop_task(task_manager: &TaskManagerState, request: StopTaskRequest) -> StopTaskResponse {
    debug!("Stop requested for task: {:?}", request.task_id);
    task_manager.0.stop_task(request.task_id.trim());

    StopTaskResponse {
        message: "Task stopped".to_string(),
    }
}

/// List all tasks
pub fn list_tasks(task_manager: &TaskManagerState) -> Vec<TaskSnapshot> {
    task_manager.0.list_tasks()
}

/// List active tasks
pub fn list_active_tasks(task_manager: &TaskManagerState) -> Vec<TaskSnapshot> {
    task_manager.0.list_active_tasks()
}

/// Get task count
pub fn get_task_count(task_manager: &TaskManagerState) -> TaskCount {
    let all = task_manager.0.list_tasks();
    let count_of = |status: TaskStatus| all.iter().filter(|t| t.status == status).count();

    TaskCount {
        total: all.len(),
        active: all.iter().filter(|t| t.is_active()).count(),
        completed: count_of(TaskStatus::Completed),
        failed: count_of(TaskStatus::Failed),
        stopped: count_of(TaskStatus::Stopped),
    }
}
