//! Task Types
//!
//! Type definitions for the background task registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task is registered but its runner has not picked it up yet
    #[default]
    Pending,
    /// Work function is executing
    Running,
    /// Work function returned successfully
    Completed,
    /// Work function returned an error or panicked
    Failed,
    /// Task was stopped by a cancellation request
    Stopped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Check if the status still accepts transitions
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Check if the status is final
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable part of a task record, guarded by the per-task lock
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskState {
    pub status: TaskStatus,
    pub progress: u64,
    pub message: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Point-in-time copy of a task, safe to hand to pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub status: TaskStatus,
    pub progress: u64,
    pub total: u64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskSnapshot {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Progress percentage (0-100), if the total is known
    pub fn percentage(&self) -> Option<f32> {
        if self.total > 0 {
            Some((self.progress as f32 / self.total as f32) * 100.0)
        } else {
            None
        }
    }
}

/// Task event for broadcasts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskEvent {
    /// Task registered
    Created { task_id: String, total: u64 },
    /// Runner picked the task up
    Started { task_id: String },
    /// Work function reported progress
    Progress {
        task_id: String,
        current: u64,
        message: String,
    },
    /// Task completed
    Completed { task_id: String },
    /// Task failed
    Failed { task_id: String, error: String },
    /// Task stopped, either by request or by cancellation noticed at completion
    Stopped { task_id: String, message: String },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Created { task_id, .. }
            | Self::Started { task_id }
            | Self::Progress { task_id, .. }
            | Self::Completed { task_id }
            | Self::Failed { task_id, .. }
            | Self::Stopped { task_id, .. } => task_id,
        }
    }

    /// Event name as surfaced to frontends
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "task:created",
            Self::Started { .. } => "task:started",
            Self::Progress { .. } => "task:progress",
            Self::Completed { .. } => "task:completed",
            Self::Failed { .. } => "task:failed",
            Self::Stopped { .. } => "task:stopped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TaskStatus::Stopped).unwrap(),
            serde_json::json!("stopped")
        );
        assert_eq!(TaskStatus::Running.to_string(), "running");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Pending.is_active());
        assert!(TaskStatus::Running.is_active());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Stopped.is_terminal());
    }

    #[test]
    fn test_new_state_is_pending() {
        let state = TaskState::default();
        assert_eq!(state.status, TaskStatus::Pending);
        assert_eq!(state.progress, 0);
        assert!(state.message.is_empty());
    }

    #[test]
    fn test_snapshot_omits_empty_error_and_result() {
        let snapshot = TaskSnapshot {
            id: "abc".to_string(),
            status: TaskStatus::Completed,
            progress: 3,
            total: 3,
            message: "Completed".to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["progress"], 3);
        assert!(value.get("error").is_none());
        assert!(value.get("result").is_none());
        assert!(value["created_at"].is_string());
        assert_eq!(snapshot.percentage(), Some(100.0));
    }

    #[test]
    fn test_event_names() {
        let event = TaskEvent::Stopped {
            task_id: "t1".to_string(),
            message: "Stopped by user".to_string(),
        };
        assert_eq!(event.name(), "task:stopped");
        assert_eq!(event.task_id(), "t1");
    }
}
