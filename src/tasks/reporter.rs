//! Progress Reporter
//!
//! Handed to every work function. Publishes incremental progress and is the
//! checkpoint where cooperative cancellation is observed.

use log::debug;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::manager::TaskEntry;
use super::types::TaskEvent;

/// Returned by the reporter once the task has been cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task cancelled")]
pub struct Cancelled;

/// Progress callback bound to a single task
#[derive(Clone)]
pub struct ProgressReporter {
    entry: Arc<TaskEntry>,
    event_tx: broadcast::Sender<TaskEvent>,
}

impl ProgressReporter {
    pub(crate) fn new(entry: Arc<TaskEntry>, event_tx: broadcast::Sender<TaskEvent>) -> Self {
        Self { entry, event_tx }
    }

    /// ID of the task this reporter writes to
    pub fn task_id(&self) -> &str {
        &self.entry.id
    }

    /// Overwrite the task's progress and message.
    ///
    /// `current` is stored as-is: it is not checked against the total and may
    /// go backwards. Fails with [`Cancelled`] without touching the record once
    /// the task has been stopped or has finished.
    pub fn report(&self, current: u64, message: impl Into<String>) -> Result<(), Cancelled> {
        let message = message.into();

        let mut state = self.entry.state.lock();
        // Checked under the lock so a concurrent stop cannot slip in between.
        if self.entry.cancel.is_cancelled() || state.status.is_terminal() {
            return Err(Cancelled);
        }
        state.progress = current;
        state.message = message.clone();

        debug!("Task {} progress: {} ({})", self.entry.id, current, message);
        // Sent before the guard drops so a stop event can never precede it.
        let _ = self.event_tx.send(TaskEvent::Progress {
            task_id: self.entry.id.clone(),
            current,
            message,
        });
        drop(state);
        Ok(())
    }

    /// Store the task's result payload
    pub fn set_result(&self, value: serde_json::Value) -> Result<(), Cancelled> {
        let mut state = self.entry.state.lock();
        if self.entry.cancel.is_cancelled() || state.status.is_terminal() {
            return Err(Cancelled);
        }
        state.result = Some(value);
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.entry.cancel.is_cancelled()
    }

    /// Cancellation token of the task, for racing in-flight calls against a stop
    pub fn token(&self) -> &CancellationToken {
        &self.entry.cancel
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("task_id", &self.entry.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::types::TaskStatus;

    fn reporter(total: u64) -> (Arc<TaskEntry>, ProgressReporter, broadcast::Receiver<TaskEvent>) {
        let (event_tx, event_rx) = broadcast::channel(16);
        let entry = Arc::new(TaskEntry::new(total));
        entry.state.lock().status = TaskStatus::Running;
        let reporter = ProgressReporter::new(Arc::clone(&entry), event_tx);
        (entry, reporter, event_rx)
    }

    #[test]
    fn test_report_overwrites_progress_and_message() {
        let (entry, reporter, mut events) = reporter(3);

        reporter.report(2, "two").unwrap();
        reporter.report(1, "one").unwrap();

        let snapshot = entry.snapshot();
        assert_eq!(snapshot.progress, 1);
        assert_eq!(snapshot.message, "one");
        assert_eq!(snapshot.total, 3);

        match events.try_recv().unwrap() {
            TaskEvent::Progress { current, message, .. } => {
                assert_eq!(current, 2);
                assert_eq!(message, "two");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_report_may_exceed_total() {
        let (entry, reporter, _events) = reporter(2);
        reporter.report(10, "over").unwrap();
        assert_eq!(entry.snapshot().progress, 10);
    }

    #[test]
    fn test_report_after_cancel_is_rejected() {
        let (entry, reporter, _events) = reporter(3);
        reporter.report(1, "first").unwrap();

        entry.cancel.cancel();

        assert_eq!(reporter.report(2, "second"), Err(Cancelled));
        assert!(reporter.is_cancelled());
        let snapshot = entry.snapshot();
        assert_eq!(snapshot.progress, 1);
        assert_eq!(snapshot.message, "first");
    }

    #[test]
    fn test_report_after_terminal_is_rejected() {
        let (entry, reporter, _events) = reporter(3);
        entry.state.lock().status = TaskStatus::Completed;

        assert_eq!(reporter.report(1, "late"), Err(Cancelled));
        assert_eq!(
            reporter.set_result(serde_json::json!({"late": true})),
            Err(Cancelled)
        );
        assert!(entry.snapshot().result.is_none());
    }

    #[test]
    fn test_set_result() {
        let (entry, reporter, _events) = reporter(1);
        reporter.set_result(serde_json::json!({"passed": 4})).unwrap();
        assert_eq!(entry.snapshot().result, Some(serde_json::json!({"passed": 4})));
    }
}
