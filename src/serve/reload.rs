// src/serve/reload.rs

//! Fan-out of reload notifications to connected browsers.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::BuildCompleted;

/// Payload pushed to browsers: the task whose build triggered the reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reload {
    pub task: String,
}

/// Broadcast hub shared by every SSE connection.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<Reload>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ReloadHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Reload> {
        self.tx.subscribe()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Push a reload to every client; returns how many received it.
    pub fn notify(&self, task: impl Into<String>) -> usize {
        let reload = Reload { task: task.into() };
        self.tx.send(reload).unwrap_or(0)
    }

    /// Forward every build-completed signal as a reload until `builds` closes.
    pub fn forward(&self, mut builds: broadcast::Receiver<BuildCompleted>) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            loop {
                match builds.recv().await {
                    Ok(build) => {
                        let clients = hub.notify(build.task.clone());
                        debug!(task = %build.task, clients, "reload sent");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "reload forwarder lagged; sending one reload");
                        hub.notify("*");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
