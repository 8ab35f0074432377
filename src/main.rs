//! Demo entry point
//!
//! Submits a simulated batch of LLM calls, then polls it the way the web
//! frontend does until it finishes or is stopped.

use async_trait::async_trait;
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use codeagent_lib::commands::tasks::{get_task_status, stop_task, StopTaskRequest, TaskManagerState};
use codeagent_lib::{BatchJob, ItemProcessor, TaskConfig, TaskManager};

#[derive(Debug, Parser)]
#[command(name = "task-demo", about = "Run a simulated LLM batch as a background task")]
struct Cli {
    /// Number of test cases in the batch
    #[arg(long, default_value_t = 5)]
    items: usize,

    /// Simulated latency of each LLM call, in milliseconds
    #[arg(long, default_value_t = 300)]
    delay_ms: u64,

    /// Make every Nth call fail
    #[arg(long)]
    fail_every: Option<usize>,

    /// Stop the task after this many milliseconds
    #[arg(long)]
    stop_after_ms: Option<u64>,

    /// Poll interval in milliseconds (defaults to TASK_POLL_INTERVAL_MS)
    #[arg(long)]
    poll_ms: Option<u64>,
}

/// Stands in for the LLM client
struct SimulatedLlm {
    delay: Duration,
    fail_every: Option<usize>,
}

#[async_trait]
impl ItemProcessor for SimulatedLlm {
    type Item = String;

    async fn process(
        &self,
        index: usize,
        item: &String,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("call to LLM interrupted"),
            _ = tokio::time::sleep(self.delay) => {}
        }

        if let Some(n) = self.fail_every {
            if n > 0 && (index + 1) % n == 0 {
                anyhow::bail!("LLM returned an error for {}", item);
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = TaskConfig::from_env()?;
    if let Some(poll_ms) = cli.poll_ms {
        config.poll_interval_ms = poll_ms;
        config.validate()?;
    }

    let state = TaskManagerState(Arc::new(TaskManager::with_config(&config)));

    let cases: Vec<String> = (1..=cli.items).map(|i| format!("test case #{}", i)).collect();
    let processor = Arc::new(SimulatedLlm {
        delay: Duration::from_millis(cli.delay_ms),
        fail_every: cli.fail_every,
    });
    let task_id = BatchJob::run(cases).submit(&state.0, processor)?;
    info!("Submitted task {}", task_id);

    if let Some(ms) = cli.stop_after_ms {
        let state = state.clone();
        let task_id = task_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            let response = stop_task(&state, StopTaskRequest { task_id });
            info!("{}", response.message);
        });
    }

    loop {
        let snapshot = get_task_status(&state, &task_id)?;
        println!("{}", serde_json::to_string(&snapshot)?);
        if snapshot.is_terminal() {
            break;
        }
        tokio::time::sleep(config.poll_interval()).await;
    }

    state.0.stop_all();
    Ok(())
}
