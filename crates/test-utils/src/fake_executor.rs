use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use assetwatch::engine::{RuntimeEvent, ScheduledRun, TaskOutcome};
use assetwatch::errors::Result;
use assetwatch::exec::ExecutorBackend;

/// A fake executor that:
/// - records every scheduled run
/// - immediately reports TaskCompleted for it, failing the configured tasks.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<ScheduledRun>>>,
    failing: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<ScheduledRun>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: HashSet::new(),
        }
    }

    /// Report `task` as a structural failure every time it runs.
    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        runs: Vec<ScheduledRun>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for run in runs {
                executed.lock().unwrap().push(run.clone());

                let outcome = if self.failing.contains(&run.name) {
                    TaskOutcome::Failed(format!("{} failed", run.name))
                } else {
                    TaskOutcome::Success
                };
                tx.send(RuntimeEvent::TaskCompleted {
                    task: run.name.clone(),
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// Records scheduled runs without completing them; the test decides when
/// (and how) each run finishes by sending `TaskCompleted` itself.
pub struct ControllableExecutor {
    started: mpsc::UnboundedSender<ScheduledRun>,
}

impl ControllableExecutor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScheduledRun>) {
        let (started, rx) = mpsc::unbounded_channel();
        (Self { started }, rx)
    }
}

impl ExecutorBackend for ControllableExecutor {
    fn spawn_ready_tasks(
        &mut self,
        runs: Vec<ScheduledRun>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for run in runs {
                let _ = self.started.send(run);
            }
            Ok(())
        })
    }
}
