// src/watch/event_handler.rs

//! Turning ready (debounced) paths into task triggers.

use std::path::PathBuf;

use notify::EventKind;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TaskName, TriggerReason};
use crate::watch::patterns::WatchBinding;

/// Whether a notify event kind can change build inputs.
pub fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

/// One task to trigger with the paths that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub task: TaskName,
    pub paths: Vec<PathBuf>,
}

/// Match root-relative `paths` against `bindings` in listed order.
///
/// Task names are deduplicated in first-seen order; each trigger carries
/// every path that selected it.
pub fn resolve_triggers(bindings: &[WatchBinding], paths: &[String]) -> Vec<Trigger> {
    let mut triggers: Vec<Trigger> = Vec::new();

    for rel in paths {
        for binding in bindings {
            if !binding.matches(rel) {
                continue;
            }
            for task in binding.tasks() {
                let path = PathBuf::from(rel);
                match triggers.iter_mut().find(|t| &t.task == task) {
                    Some(existing) => {
                        if !existing.paths.contains(&path) {
                            existing.paths.push(path);
                        }
                    }
                    None => triggers.push(Trigger {
                        task: task.clone(),
                        paths: vec![path],
                    }),
                }
            }
        }
    }

    triggers
}

/// Send a `TaskTriggered` event per resolved trigger. Never waits on the
/// tasks themselves.
pub async fn dispatch_triggers(
    bindings: &[WatchBinding],
    paths: &[String],
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let triggers = resolve_triggers(bindings, paths);
    if triggers.is_empty() {
        debug!(?paths, "no binding matched");
        return;
    }

    for trigger in triggers {
        info!(task = %trigger.task, paths = ?trigger.paths, "change detected");
        let event = RuntimeEvent::TaskTriggered {
            task: trigger.task.clone(),
            reason: TriggerReason::FileWatch,
            paths: trigger.paths,
        };
        if let Err(err) = runtime_tx.send(event).await {
            warn!(task = %trigger.task, error = %err, "failed to send trigger to runtime");
        }
    }
}
