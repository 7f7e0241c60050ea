// src/alert.rs

//! Error-notification side channel for per-file transformation failures.
//!
//! Sinks never block the pipeline: the task reports the failure and moves on
//! to its remaining files.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error, warn};

/// A transformation failure worth surfacing to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Short title, e.g. `"HTML"` or `"SCSS"`.
    pub title: String,
    pub task: String,
    pub source: PathBuf,
    pub message: String,
}

impl Alert {
    /// Body text shown to the operator.
    pub fn body(&self) -> String {
        format!("Error {}", self.message)
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.title, self.body(), self.source.display())
    }
}

pub trait AlertSink: Send + Sync + fmt::Debug {
    fn notify(&self, alert: &Alert);
}

/// Logs alerts through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn notify(&self, alert: &Alert) {
        error!(
            task = %alert.task,
            title = %alert.title,
            source = ?alert.source,
            "{}",
            alert.body()
        );
    }
}

/// Logs the alert, then runs an external notifier such as `notify-send`.
///
/// The command runs through the shell with `ASSETWATCH_TITLE`,
/// `ASSETWATCH_MESSAGE`, `ASSETWATCH_TASK` and `ASSETWATCH_SOURCE` set, e.g.
/// `notify-send "$ASSETWATCH_TITLE" "$ASSETWATCH_MESSAGE"`.
#[derive(Debug, Clone)]
pub struct CommandSink {
    cmd: String,
}

impl CommandSink {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl AlertSink for CommandSink {
    fn notify(&self, alert: &Alert) {
        LogSink.notify(alert);

        let mut cmd = shell_command(&self.cmd);
        cmd.env("ASSETWATCH_TITLE", &alert.title)
            .env("ASSETWATCH_MESSAGE", alert.body())
            .env("ASSETWATCH_TASK", &alert.task)
            .env("ASSETWATCH_SOURCE", &alert.source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match cmd.spawn() {
            Ok(mut child) => {
                let title = alert.title.clone();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            warn!(title = %title, ?status, "alert command exited unsuccessfully")
                        }
                        Ok(_) => debug!(title = %title, "alert command finished"),
                        Err(e) => warn!(title = %title, error = %e, "waiting for alert command"),
                    }
                });
            }
            Err(e) => warn!(cmd = %self.cmd, error = %e, "failed to spawn alert command"),
        }
    }
}

/// Build a shell command appropriate for the platform.
pub(crate) fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}
