// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of calling the runner
//! directly. This makes it easy to swap in a fake executor in tests while
//! keeping the production implementation in [`RunnerBackend`].
//!
//! - `RunnerBackend` is the implementation used by `assetwatch dev` and
//!   `assetwatch watch`. Each scheduled run becomes one tokio task that runs
//!   the task (or composite) through the [`Runner`] and reports back.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which runs were scheduled and directly emits `TaskCompleted` events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, ScheduledRun, TaskOutcome};
use crate::errors::{AssetwatchError, Result};
use crate::runner::Runner;

/// Trait abstracting how scheduled runs are executed.
///
/// Production code uses [`RunnerBackend`]; tests can provide their own
/// implementation that doesn't touch the filesystem.
pub trait ExecutorBackend: Send {
    /// Start the given runs. Must not wait for them to finish: completion is
    /// reported later as `RuntimeEvent::TaskCompleted`.
    fn spawn_ready_tasks(
        &mut self,
        runs: Vec<ScheduledRun>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Executes runs through a shared [`Runner`].
#[derive(Debug, Clone)]
pub struct RunnerBackend {
    runner: Arc<Runner>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl RunnerBackend {
    pub fn new(runner: Arc<Runner>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { runner, runtime_tx }
    }
}

impl ExecutorBackend for RunnerBackend {
    fn spawn_ready_tasks(
        &mut self,
        runs: Vec<ScheduledRun>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for run in runs {
                let runner = Arc::clone(&self.runner);
                let tx = self.runtime_tx.clone();
                tokio::spawn(execute_run(runner, run, tx));
            }
            Ok(())
        })
    }
}

async fn execute_run(runner: Arc<Runner>, run: ScheduledRun, tx: mpsc::Sender<RuntimeEvent>) {
    info!(
        task = %run.name,
        run_id = run.run_id,
        reason = ?run.reason,
        paths = ?run.paths,
        "running triggered task"
    );
    let started = Instant::now();

    let outcome = match runner.run_one(&run.name).await {
        Ok(report) => {
            debug!(
                task = %run.name,
                run_id = run.run_id,
                failed_files = report.failed_files(),
                elapsed = ?started.elapsed(),
                "triggered task finished"
            );
            TaskOutcome::Success
        }
        Err(AssetwatchError::Structural { message, .. }) => TaskOutcome::Failed(message),
        Err(other) => TaskOutcome::Failed(other.to_string()),
    };

    let event = RuntimeEvent::TaskCompleted {
        task: run.name.clone(),
        outcome,
    };
    if tx.send(event).await.is_err() {
        warn!(task = %run.name, run_id = run.run_id, "runtime gone; dropping completion");
    }
}
