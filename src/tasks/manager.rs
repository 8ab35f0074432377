//! Task Manager
//!
//! Concurrent task registry with DashMap.
//! Launches work in the background, tracks progress, and handles cancellation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use super::reporter::ProgressReporter;
use super::types::{TaskEvent, TaskSnapshot, TaskState, TaskStatus};
use crate::config::TaskConfig;

/// Registry entry for a single task.
///
/// Identity fields are immutable; everything that changes lives behind `state`.
pub(crate) struct TaskEntry {
    pub id: String,
    pub total: u64,
    pub created_at: DateTime<Utc>,
    /// Cancelled by a stop request, or on release once the runner is done
    pub cancel: CancellationToken,
    pub state: Mutex<TaskState>,
    /// Woken on every terminal transition
    pub notify: Notify,
}

impl TaskEntry {
    pub fn new(total: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            total,
            created_at: Utc::now(),
            cancel: CancellationToken::new(),
            state: Mutex::new(TaskState::default()),
            notify: Notify::new(),
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let state = self.state.lock();
        TaskSnapshot {
            id: self.id.clone(),
            status: state.status,
            progress: state.progress,
            total: self.total,
            message: state.message.clone(),
            result: state.result.clone(),
            error: state.error.clone(),
            created_at: self.created_at,
        }
    }
}

/// Task manager for running and tracking background work
pub struct TaskManager {
    /// All tasks ever started (task_id -> entry)
    tasks: DashMap<String, Arc<TaskEntry>>,
    /// Event broadcaster
    event_tx: broadcast::Sender<TaskEvent>,
}

impl TaskManager {
    /// Create a new task manager
    pub fn new() -> Self {
        Self::with_config(&TaskConfig::default())
    }

    /// Create with explicit configuration
    pub fn with_config(config: &TaskConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        Self {
            tasks: DashMap::new(),
            event_tx,
        }
    }

    /// Subscribe to task events
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_tx.subscribe()
    }

    /// Register a task and run `work` in the background.
    ///
    /// Returns the task ID straight away; it is valid for [`get_task`] and
    /// [`stop_task`] before the work has started. Must be called from within
    /// a tokio runtime.
    ///
    /// [`get_task`]: TaskManager::get_task
    /// [`stop_task`]: TaskManager::stop_task
    pub fn start<F, Fut>(&self, total: u64, work: F) -> String
    where
        F: FnOnce(CancellationToken, ProgressReporter) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let entry = Arc::new(TaskEntry::new(total));
        let task_id = entry.id.clone();

        self.tasks.insert(task_id.clone(), Arc::clone(&entry));
        let _ = self.event_tx.send(TaskEvent::Created {
            task_id: task_id.clone(),
            total,
        });
        debug!("Created task: {} (total: {})", task_id, total);

        tokio::spawn(run_task(entry, self.event_tx.clone(), work));

        task_id
    }

    /// Get a snapshot of a task by ID
    pub fn get_task(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.entry(task_id).map(|entry| entry.snapshot())
    }

    /// Stop a pending or running task.
    ///
    /// The status flips to stopped immediately; the work function notices at
    /// its next progress checkpoint. Unknown and finished tasks are ignored.
    pub fn stop_task(&self, task_id: &str) {
        let entry = match self.entry(task_id) {
            Some(entry) => entry,
            None => {
                debug!("Stop requested for unknown task: {}", task_id);
                return;
            }
        };

        {
            let mut state = entry.state.lock();
            if !state.status.is_active() {
                debug!("Task {} already {}, ignoring stop", task_id, state.status);
                return;
            }

            entry.cancel.cancel();
            state.status = TaskStatus::Stopped;
            state.message = "Stopped by user".to_string();
        }

        entry.notify.notify_waiters();
        info!("Stopped task: {}", task_id);
        let _ = self.event_tx.send(TaskEvent::Stopped {
            task_id: task_id.to_string(),
            message: "Stopped by user".to_string(),
        });
    }

    /// Wait until a task reaches a terminal state or `timeout` elapses.
    ///
    /// Returns the latest snapshot either way, or `None` for unknown IDs.
    pub async fn wait_for(&self, task_id: &str, timeout: Duration) -> Option<TaskSnapshot> {
        let entry = self.entry(task_id)?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let notified = entry.notify.notified();
            tokio::pin!(notified);
            // Register before reading so a transition in between is not missed.
            notified.as_mut().enable();

            let snapshot = entry.snapshot();
            if snapshot.is_terminal() {
                return Some(snapshot);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Some(entry.snapshot());
            }
        }
    }

    /// List all tasks, newest first
    pub fn list_tasks(&self) -> Vec<TaskSnapshot> {
        let mut tasks: Vec<TaskSnapshot> = self.entries().iter().map(|e| e.snapshot()).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// List pending and running tasks, newest first
    pub fn list_active_tasks(&self) -> Vec<TaskSnapshot> {
        self.list_tasks()
            .into_iter()
            .filter(|t| t.is_active())
            .collect()
    }

    /// Count active tasks
    pub fn active_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.state.lock().status.is_active())
            .count()
    }

    /// Stop every active task
    pub fn stop_all(&self) {
        let active: Vec<String> = self
            .entries()
            .iter()
            .filter(|e| e.state.lock().status.is_active())
            .map(|e| e.id.clone())
            .collect();

        if !active.is_empty() {
            info!("Stopping {} active tasks", active.len());
        }
        for task_id in active {
            self.stop_task(&task_id);
        }
    }

    fn entry(&self, task_id: &str) -> Option<Arc<TaskEntry>> {
        // Clone the Arc out so the shard lock is released before the task lock is taken.
        self.tasks.get(task_id).map(|e| Arc::clone(e.value()))
    }

    fn entries(&self) -> Vec<Arc<TaskEntry>> {
        self.tasks.iter().map(|e| Arc::clone(e.value())).collect()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Background half of [`TaskManager::start`]
async fn run_task<F, Fut>(entry: Arc<TaskEntry>, event_tx: broadcast::Sender<TaskEvent>, work: F)
where
    F: FnOnce(CancellationToken, ProgressReporter) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    // Cancels the token on every way out of this function.
    let _release = entry.cancel.clone().drop_guard();

    {
        let mut state = entry.state.lock();
        if state.status != TaskStatus::Pending {
            debug!("Task {} was {} before it started, skipping work", entry.id, state.status);
            return;
        }
        state.status = TaskStatus::Running;
        state.message = "Started".to_string();
    }
    info!("Started task: {}", entry.id);
    let _ = event_tx.send(TaskEvent::Started {
        task_id: entry.id.clone(),
    });

    let reporter = ProgressReporter::new(Arc::clone(&entry), event_tx.clone());
    let token = entry.cancel.clone();

    let outcome = AssertUnwindSafe(async move { work(token, reporter).await })
        .catch_unwind()
        .await;

    let outcome = match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(panic) => {
            let message = format!("Panic: {}", panic_message(panic.as_ref()));
            error!("Task {} panicked: {}", entry.id, message);
            Err(message)
        }
    };

    finish(&entry, &event_tx, outcome);
}

/// Apply the single terminal transition of a task.
///
/// Cancellation wins over the work's own result, so work that was asked to
/// stop is never reported as completed or failed.
fn finish(entry: &TaskEntry, event_tx: &broadcast::Sender<TaskEvent>, outcome: Result<(), String>) {
    let event = {
        let mut state = entry.state.lock();

        if state.status.is_terminal() {
            None
        } else if entry.cancel.is_cancelled() {
            state.status = TaskStatus::Stopped;
            state.message = "Cancelled".to_string();
            Some(TaskEvent::Stopped {
                task_id: entry.id.clone(),
                message: state.message.clone(),
            })
        } else {
            match outcome {
                Err(error) => {
                    state.status = TaskStatus::Failed;
                    state.error = Some(error.clone());
                    Some(TaskEvent::Failed {
                        task_id: entry.id.clone(),
                        error,
                    })
                }
                Ok(()) => {
                    state.status = TaskStatus::Completed;
                    state.progress = entry.total;
                    state.message = "Completed".to_string();
                    Some(TaskEvent::Completed {
                        task_id: entry.id.clone(),
                    })
                }
            }
        }
    };

    entry.notify.notify_waiters();

    match &event {
        Some(TaskEvent::Completed { .. }) => info!("Completed task: {}", entry.id),
        Some(TaskEvent::Failed { error, .. }) => warn!("Task failed: {} ({})", entry.id, error),
        Some(_) => info!("Task {} cancelled", entry.id),
        None => debug!("Task {} finished after being stopped", entry.id),
    }

    if let Some(event) = event {
        let _ = event_tx.send(event);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
