// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - handing `ScheduledRun`s to the executor
//! - publishing build-completed notifications
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! processes.

use crate::engine::event_handlers::{
    CoreState, CoreStep, handle_shutdown, handle_task_completion, handle_task_trigger,
};
use crate::engine::slots::SlotState;
use crate::engine::{RuntimeEvent, RuntimeOptions};

#[derive(Debug, Default)]
pub struct CoreRuntime {
    state: CoreState,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            state: CoreState::default(),
            options,
        }
    }

    /// Whether no task is running.
    pub fn is_idle(&self) -> bool {
        self.state.slots.is_idle()
    }

    pub fn has_pending(&self) -> bool {
        self.state.slots.has_pending()
    }

    pub fn slot(&self, task: &str) -> SlotState {
        self.state.slots.state_of(task)
    }

    pub fn is_draining(&self) -> bool {
        self.state.draining
    }

    /// First structural failure reported by a run, as (task, message).
    pub fn fatal(&self) -> Option<(&str, &str)> {
        self.state
            .fatal
            .as_ref()
            .map(|(task, message)| (task.as_str(), message.as_str()))
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered {
                task,
                reason,
                paths,
            } => handle_task_trigger(&mut self.state, task, reason, paths),
            RuntimeEvent::TaskCompleted { task, outcome } => {
                handle_task_completion(&mut self.state, &self.options, task, outcome)
            }
            RuntimeEvent::ShutdownRequested => handle_shutdown(&mut self.state),
        }
    }
}
