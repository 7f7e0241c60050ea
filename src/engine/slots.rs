// src/engine/slots.rs

//! Per-task run slots.
//!
//! Each task is either idle or running. A trigger that arrives while the task
//! runs does not start a second instance; it marks a single pending re-run
//! carrying the latest event set. Further triggers replace that event set.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::engine::{ScheduledRun, TaskName, TriggerReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Running {
        run_id: u64,
        /// Re-run requested while running: (reason, latest paths).
        pending: Option<(TriggerReason, Vec<PathBuf>)>,
    },
}

#[derive(Debug, Default)]
pub struct TaskSlots {
    slots: HashMap<TaskName, SlotState>,
    next_run_id: u64,
}

impl TaskSlots {
    pub fn state_of(&self, task: &str) -> SlotState {
        self.slots.get(task).cloned().unwrap_or(SlotState::Idle)
    }

    pub fn running_count(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, SlotState::Running { .. }))
            .count()
    }

    pub fn is_idle(&self) -> bool {
        self.running_count() == 0
    }

    pub fn has_pending(&self) -> bool {
        self.slots.values().any(|s| {
            matches!(
                s,
                SlotState::Running {
                    pending: Some(_),
                    ..
                }
            )
        })
    }

    fn start(&mut self, task: TaskName, reason: TriggerReason, paths: Vec<PathBuf>) -> ScheduledRun {
        self.next_run_id += 1;
        let run_id = self.next_run_id;
        self.slots.insert(
            task.clone(),
            SlotState::Running {
                run_id,
                pending: None,
            },
        );
        ScheduledRun {
            name: task,
            run_id,
            reason,
            paths,
        }
    }

    /// Apply a trigger. Returns the run to start, if the task was idle.
    pub fn trigger(
        &mut self,
        task: TaskName,
        reason: TriggerReason,
        paths: Vec<PathBuf>,
    ) -> Option<ScheduledRun> {
        match self.slots.get_mut(&task) {
            Some(SlotState::Running { run_id, pending }) => {
                debug!(task = %task, run_id = *run_id, "task busy; marking re-run");
                *pending = Some((reason, paths));
                None
            }
            _ => Some(self.start(task, reason, paths)),
        }
    }

    /// Mark `task` finished. Returns `(finished run_id, follow-up run)`.
    ///
    /// The follow-up is the pending re-run, started immediately, unless
    /// `allow_rerun` is false. `None` as run id means the task was not running.
    pub fn complete(&mut self, task: &str, allow_rerun: bool) -> (Option<u64>, Option<ScheduledRun>) {
        let Some(SlotState::Running { run_id, pending }) = self.slots.remove(task) else {
            return (None, None);
        };

        match pending {
            Some((reason, paths)) if allow_rerun => {
                let next = self.start(task.to_string(), reason, paths);
                (Some(run_id), Some(next))
            }
            _ => (Some(run_id), None),
        }
    }

    /// Drop every pending re-run (running tasks keep running).
    pub fn drop_pending(&mut self) -> usize {
        let mut dropped = 0;
        for slot in self.slots.values_mut() {
            if let SlotState::Running { pending, .. } = slot {
                if pending.take().is_some() {
                    dropped += 1;
                }
            }
        }
        dropped
    }
}
