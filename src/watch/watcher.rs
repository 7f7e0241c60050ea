// src/watch/watcher.rs

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::{AssetwatchError, Result};
use crate::runner::Registry;
use crate::watch::debounce::Debouncer;
use crate::watch::event_handler::{dispatch_triggers, is_relevant};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchBinding;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching; paths still inside the debounce window are dropped.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

impl WatcherHandle {
    /// Stop watching and wait for the event loop to exit.
    pub async fn stop(self) {
        let WatcherHandle {
            _inner: watcher,
            task,
        } = self;
        drop(watcher);
        if let Err(e) = task.await {
            warn!(error = %e, "watcher event loop panicked");
        }
    }
}

/// Check that every task named by a binding is registered.
pub fn validate_bindings(bindings: &[WatchBinding], registry: &Registry) -> Result<()> {
    for binding in bindings {
        for task in binding.tasks() {
            if !registry.contains(task) {
                return Err(AssetwatchError::TaskNotFound(task.clone()));
            }
        }
    }
    Ok(())
}

/// Spawn a filesystem watcher that observes `root` recursively and sends
/// `RuntimeEvent::TaskTriggered` for the tasks bound to changed paths.
///
/// - `root` is the project root against which all glob patterns are evaluated.
/// - `bindings` are evaluated in order for every debounced path.
/// - `debounce` is the per-path quiet period before a change counts.
/// - `runtime_tx` is the channel into the main runtime.
///
/// Fails with `TaskNotFound` if a binding names a task missing from `registry`.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    bindings: Vec<WatchBinding>,
    registry: &Registry,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    validate_bindings(&bindings, registry)?;

    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("assetwatch: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("assetwatch: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(root = ?root, bindings = bindings.len(), ?debounce, "file watcher started");

    let task = tokio::spawn(async move {
        let mut debouncer = Debouncer::new(debounce);

        loop {
            let deadline = debouncer.next_deadline();

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    let Some(event) = maybe_event else {
                        break;
                    };
                    if !is_relevant(&event.kind) {
                        continue;
                    }
                    debug!(?event, "received notify event");

                    let now = Instant::now();
                    for path in event.paths {
                        match relative_str(&root, &path) {
                            Some(rel) if !rel.is_empty() => debouncer.push(PathBuf::from(rel), now),
                            _ => debug!(?path, "event outside project root; ignoring"),
                        }
                    }
                }
                _ = sleep_until(deadline) => {
                    let ready: Vec<String> = debouncer
                        .drain_ready(Instant::now())
                        .into_iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect();
                    if !ready.is_empty() {
                        dispatch_triggers(&bindings, &ready, &runtime_tx).await;
                    }
                }
            }
        }

        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        task,
    })
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
