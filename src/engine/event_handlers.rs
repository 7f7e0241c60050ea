// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::engine::slots::TaskSlots;
use crate::engine::{BuildCompleted, RuntimeOptions, ScheduledRun, TaskName, TaskOutcome, TriggerReason};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start these runs.
    DispatchTasks(Vec<ScheduledRun>),
    /// A run succeeded; tell live-reload listeners.
    BuildCompleted(BuildCompleted),
    /// Stop the runtime loop.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn keep(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Mutable state shared by the handlers.
#[derive(Debug, Default)]
pub struct CoreState {
    pub slots: TaskSlots,
    /// Stopping: no new runs start, in-flight runs are awaited.
    pub draining: bool,
    /// First structural failure seen: (task, message).
    pub fatal: Option<(TaskName, String)>,
}

/// Handle a trigger.
///
/// - Idle task: start a run now.
/// - Running task: remember one re-run with the latest paths.
/// - Draining: ignore.
pub fn handle_task_trigger(
    state: &mut CoreState,
    task: TaskName,
    reason: TriggerReason,
    paths: Vec<PathBuf>,
) -> CoreStep {
    if state.draining {
        debug!(task = %task, "shutting down; ignoring trigger");
        return CoreStep::keep(Vec::new());
    }

    let commands = match state.slots.trigger(task, reason, paths) {
        Some(run) => vec![CoreCommand::DispatchTasks(vec![run])],
        None => Vec::new(),
    };
    CoreStep::keep(commands)
}

/// Handle a task completion event.
pub fn handle_task_completion(
    state: &mut CoreState,
    options: &RuntimeOptions,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let mut commands = Vec::new();

    if let TaskOutcome::Failed(message) = &outcome {
        error!(task = %task, error = %message, "structural failure; stopping watch");
        state
            .fatal
            .get_or_insert_with(|| (task.clone(), message.clone()));
        if !state.draining {
            state.draining = true;
            state.slots.drop_pending();
        }
    }

    let allow_rerun = !state.draining;
    let (finished, next) = state.slots.complete(&task, allow_rerun);

    match finished {
        None => {
            warn!(task = %task, "completion for a task that was not running; ignoring");
        }
        Some(run_id) => {
            if outcome == TaskOutcome::Success {
                commands.push(CoreCommand::BuildCompleted(BuildCompleted {
                    task: task.clone(),
                    run_id,
                }));
            }
        }
    }

    if let Some(run) = next {
        debug!(task = %task, run_id = run.run_id, "starting pending re-run");
        commands.push(CoreCommand::DispatchTasks(vec![run]));
    }

    let should_exit = state.slots.is_idle() && (state.draining || options.exit_when_idle);
    if should_exit {
        info!("all task runs finished; exiting");
        commands.push(CoreCommand::RequestExit);
        return CoreStep {
            commands,
            keep_running: false,
        };
    }

    CoreStep::keep(commands)
}

/// Handle a shutdown request: drop pending re-runs, wait for in-flight ones.
pub fn handle_shutdown(state: &mut CoreState) -> CoreStep {
    state.draining = true;
    let dropped = state.slots.drop_pending();
    let running = state.slots.running_count();
    info!(running, dropped, "shutdown requested");

    if running == 0 {
        return CoreStep {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        };
    }
    CoreStep::keep(Vec::new())
}
