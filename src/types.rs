use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How the change filter compares a source against its existing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Reprocess when the source is newer than the target.
    Mtime,
    /// Reprocess when source and target bytes differ.
    Content,
}

impl Default for CompareMode {
    fn default() -> Self {
        CompareMode::Mtime
    }
}

/// Per-task `changed = "..."` setting. `None` disables the change filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangedMode {
    Mtime,
    Content,
    None,
}

impl Default for ChangedMode {
    fn default() -> Self {
        ChangedMode::Mtime
    }
}

impl ChangedMode {
    pub fn compare_mode(self) -> Option<CompareMode> {
        match self {
            ChangedMode::Mtime => Some(CompareMode::Mtime),
            ChangedMode::Content => Some(CompareMode::Content),
            ChangedMode::None => None,
        }
    }
}

/// How the runner executes a list of task names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Strictly in listed order, each awaited before the next starts.
    Sequential,
    /// All started together; resolves once all have completed.
    Parallel,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Sequential
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Sequential => f.write_str("sequential"),
            RunMode::Parallel => f.write_str("parallel"),
        }
    }
}

/// Behaviour of parallel runs when one member fails structurally.
///
/// - `FailFast`: reject as soon as the first member fails (default).
/// - `CollectAll`: let every member finish, then report the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    FailFast,
    CollectAll,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailFast
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail_fast" => Ok(FailurePolicy::FailFast),
            "collect_all" => Ok(FailurePolicy::CollectAll),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"fail_fast\" or \"collect_all\")"
            )),
        }
    }
}

/// Where change-filter state is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateStorageMode {
    /// Persist state in `.assetwatch/filter-state.json`.
    File,
    /// Keep state in memory only (recomputed after restart).
    Memory,
}

impl Default for StateStorageMode {
    fn default() -> Self {
        StateStorageMode::Memory
    }
}
