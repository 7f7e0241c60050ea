// src/engine/runtime.rs

use std::fmt;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::errors::{AssetwatchError, Result};
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{BuildCompleted, CoreCommand, RuntimeEvent, ScheduledRun};

/// Drives the core state machine in response to `RuntimeEvent`s and
/// delegates actual task execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    builds: Option<broadcast::Sender<BuildCompleted>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            builds: None,
        }
    }

    /// Publish a [`BuildCompleted`] for every successful run.
    pub fn with_build_notifications(mut self, builds: broadcast::Sender<BuildCompleted>) -> Self {
        self.builds = Some(builds);
        self
    }

    /// Main event loop.
    ///
    /// Returns an error if a triggered task failed structurally; the loop
    /// still waits for in-flight runs before returning.
    pub async fn run(mut self) -> Result<()> {
        info!("assetwatch runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        if let Some((task, message)) = self.core.fatal() {
            return Err(AssetwatchError::structural(task, message));
        }

        info!("runtime exiting");
        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(runs) => {
                self.spawn_ready(runs).await?;
            }
            CoreCommand::BuildCompleted(build) => {
                if let Some(tx) = &self.builds {
                    // No subscribers is fine: the server may be disabled.
                    let receivers = tx.send(build.clone()).unwrap_or(0);
                    debug!(task = %build.task, run_id = build.run_id, receivers, "build completed");
                }
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, runs: Vec<ScheduledRun>) -> Result<()> {
        if runs.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = runs.iter().map(|r| r.name.as_str()).collect();
        let run_ids: Vec<_> = runs.iter().map(|r| r.run_id).collect();
        debug!(?names, ?run_ids, "dispatching runs");

        self.executor.spawn_ready_tasks(runs).await
    }
}
