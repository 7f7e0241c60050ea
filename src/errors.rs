// src/errors.rs

//! Crate-wide error type and aliases.
//!
//! Configuration and structural failures surface as [`AssetwatchError`];
//! per-file transformation errors never do (they go to the alert sink).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task composition: {0}")]
    CompositeCycle(String),

    #[error("Structural error in task '{task}': {message}")]
    Structural { task: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetwatchError {
    pub fn structural(task: impl Into<String>, message: impl Into<String>) -> Self {
        AssetwatchError::Structural {
            task: task.into(),
            message: message.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetwatchError>;
