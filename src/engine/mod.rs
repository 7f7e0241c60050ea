// src/engine/mod.rs

//! Orchestration engine for watch mode.
//!
//! This module ties together:
//! - per-task overlap control (one run at a time, at most one pending re-run)
//! - the main runtime event loop that reacts to:
//!   - watch triggers
//!   - task completion events
//!   - shutdown signals
//! - "build completed" notifications for the dev server
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::path::PathBuf;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of one task run as seen by the engine.
///
/// Per-file transformation errors are not failures here; they were already
/// reported to the alert sink. `Failed` means a structural failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(String),
}

/// Why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Manual trigger (tests, initial runs).
    Manual,
    /// Triggered due to a filesystem event.
    FileWatch,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once every task is idle with nothing pending.
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the watcher, executor and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task should run because of `paths` (root-relative, may be empty).
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
        paths: Vec<PathBuf>,
    },
    /// A task run finished.
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// A run the core asks the executor to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRun {
    pub name: TaskName,
    pub run_id: u64,
    pub reason: TriggerReason,
    /// The event set that caused this run.
    pub paths: Vec<PathBuf>,
}

/// Broadcast after each successful task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCompleted {
    pub task: TaskName,
    pub run_id: u64,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod slots;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
pub use slots::{SlotState, TaskSlots};
