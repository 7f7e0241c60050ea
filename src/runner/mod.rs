// src/runner/mod.rs

//! Task registry and the sequential/parallel runner.

pub mod registry;

use std::sync::Arc;
use std::time::Instant;

use futures::future::{self, BoxFuture, FutureExt};
use tracing::{debug, error, info};

use crate::errors::{AssetwatchError, Result};
use crate::pipeline::task::{TaskContext, TaskReport};
use crate::types::{FailurePolicy, RunMode};

pub use registry::{Entry, Registry};

/// Reports of every leaf task a run executed, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    /// Total per-file transformation failures across all tasks.
    pub fn failed_files(&self) -> usize {
        self.tasks.iter().map(|t| t.failed).sum()
    }

    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.task == name)
    }

    fn extend(&mut self, other: RunReport) {
        self.tasks.extend(other.tasks);
    }
}

/// Executes registered names against a shared [`TaskContext`].
#[derive(Debug, Clone)]
pub struct Runner {
    registry: Arc<Registry>,
    ctx: Arc<TaskContext>,
    policy: FailurePolicy,
}

impl Runner {
    pub fn new(registry: Arc<Registry>, ctx: Arc<TaskContext>, policy: FailurePolicy) -> Self {
        Self {
            registry,
            ctx,
            policy,
        }
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    /// Run `names` in `mode`.
    ///
    /// Sequential mode awaits each name before starting the next and stops at
    /// the first structural failure. Parallel mode starts all of them; with
    /// `fail_fast` it rejects as soon as one fails, with `collect_all` it
    /// waits for every member and then reports the first failure. Exclusive
    /// members (clean tasks, or composites containing one) never overlap the
    /// rest: they run one after another before the others start.
    pub async fn run(&self, names: &[String], mode: RunMode) -> Result<RunReport> {
        self.run_group(names, mode).await
    }

    /// Run a single task or composite by name.
    pub async fn run_one(&self, name: &str) -> Result<RunReport> {
        self.run_entry(name).await
    }

    fn run_group<'a>(&'a self, names: &'a [String], mode: RunMode) -> BoxFuture<'a, Result<RunReport>> {
        async move {
            let mut report = RunReport::default();

            match mode {
                RunMode::Sequential => {
                    for name in names {
                        report.extend(self.run_entry(name).await?);
                    }
                }
                RunMode::Parallel => {
                    let (exclusive, shared): (Vec<&String>, Vec<&String>) =
                        names.iter().partition(|name| self.registry.is_exclusive(name));
                    for name in exclusive {
                        debug!(entry = %name, "Running exclusively ahead of the group");
                        report.extend(self.run_entry(name).await?);
                    }

                    let runs = shared.into_iter().map(|name| self.run_entry(name));
                    match self.policy {
                        FailurePolicy::FailFast => {
                            for sub in future::try_join_all(runs).await? {
                                report.extend(sub);
                            }
                        }
                        FailurePolicy::CollectAll => {
                            let mut first_error = None;
                            for result in future::join_all(runs).await {
                                match result {
                                    Ok(sub) => report.extend(sub),
                                    Err(e) => {
                                        first_error.get_or_insert(e);
                                    }
                                }
                            }
                            if let Some(e) = first_error {
                                return Err(e);
                            }
                        }
                    }
                }
            }

            Ok(report)
        }
        .boxed()
    }

    fn run_entry<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<RunReport>> {
        async move {
            let entry = self
                .registry
                .get(name)
                .ok_or_else(|| AssetwatchError::TaskNotFound(name.to_string()))?;

            match entry {
                Entry::Composite { mode, children } => {
                    info!(composite = %name, %mode, "Starting");
                    let started = Instant::now();
                    let report = self.run_group(children, *mode).await?;
                    info!(composite = %name, elapsed = ?started.elapsed(), "Finished");
                    Ok(report)
                }
                Entry::Task(task) => {
                    info!(task = %name, "Starting");
                    let started = Instant::now();
                    match task.run(&self.ctx).await {
                        Ok(task_report) => {
                            info!(task = %name, elapsed = ?started.elapsed(), "Finished");
                            Ok(RunReport {
                                tasks: vec![task_report],
                            })
                        }
                        Err(e) => {
                            error!(task = %name, elapsed = ?started.elapsed(), error = %e, "Failed");
                            Err(e)
                        }
                    }
                }
            }
        }
        .boxed()
    }
}
