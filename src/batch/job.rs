//! Batch Job
//!
//! One task per batch, one progress report per item.

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::tasks::TaskManager;

/// Batch submission errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("No items to process")]
    Empty,
}

/// Handles a single item of a batch.
///
/// Failures are logged and counted; they never abort the batch. Long calls
/// should race against `cancel` so a stop request does not wait for them.
#[async_trait]
pub trait ItemProcessor: Send + Sync + 'static {
    type Item: Send + Sync + 'static;

    async fn process(
        &self,
        index: usize,
        item: &Self::Item,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;
}

/// A batch of items waiting to be submitted
#[derive(Debug, Clone)]
pub struct BatchJob<T> {
    /// Progress label, e.g. "Running test case"
    verb: String,
    items: Vec<T>,
    /// Refuse to start when there is nothing to process
    reject_empty: bool,
}

impl<T: Send + Sync + 'static> BatchJob<T> {
    pub fn new(verb: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            verb: verb.into(),
            items,
            reject_empty: false,
        }
    }

    /// Fail submission with [`BatchError::Empty`] instead of starting a task
    /// with a total of zero
    pub fn reject_empty(mut self) -> Self {
        self.reject_empty = true;
        self
    }

    /// Batch for running prompts over test cases
    pub fn run(items: Vec<T>) -> Self {
        Self::new("Running test case", items)
    }

    /// Batch for evaluating existing outputs
    pub fn evaluate(items: Vec<T>) -> Self {
        Self::new("Evaluating test case", items)
    }

    /// Batch that runs and evaluates each definition in one pass.
    ///
    /// Refuses to start without definitions.
    pub fn run_and_evaluate(items: Vec<T>) -> Self {
        Self::new("Running and Evaluating", items).reject_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Start the batch on `manager` and return the task ID.
    ///
    /// The stored result of a finished batch is `{"processed": n, "failed": k}`.
    /// An empty batch completes straight away with a total of zero unless it
    /// was built with [`reject_empty`](BatchJob::reject_empty).
    pub fn submit<P>(self, manager: &TaskManager, processor: Arc<P>) -> Result<String, BatchError>
    where
        P: ItemProcessor<Item = T>,
    {
        if self.reject_empty && self.items.is_empty() {
            return Err(BatchError::Empty);
        }

        let BatchJob { verb, items, .. } = self;
        let total = items.len();

        let task_id = manager.start(total as u64, move |cancel, report| async move {
            let mut failed = 0usize;

            for (index, item) in items.iter().enumerate() {
                report.report(index as u64, format!("{} {}/{}", verb, index + 1, total))?;

                if let Err(e) = processor.process(index, item, &cancel).await {
                    failed += 1;
                    warn!(
                        "Task {}: {} {}/{} failed: {:#}",
                        report.task_id(),
                        verb,
                        index + 1,
                        total,
                        e
                    );
                }
            }

            debug!(
                "Task {}: batch done, {} of {} items failed",
                report.task_id(),
                failed,
                total
            );
            report.set_result(serde_json::json!({
                "processed": total,
                "failed": failed,
            }))?;
            anyhow::Ok(())
        });

        Ok(task_id)
    }
}
