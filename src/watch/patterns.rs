// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::config::{ConfigFile, WatchConfig};
use crate::engine::TaskName;
use crate::pipeline::sources::build_globset;

/// Compiled `[[watch]]` entry: path globs (+ exclusions) → task names.
///
/// The patterns are relative to the project root. The watcher passes
/// relative paths (e.g. `"src/html/index.html"`) into `matches`.
#[derive(Clone)]
pub struct WatchBinding {
    tasks: Vec<TaskName>,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
    patterns: Vec<String>,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("patterns", &self.patterns)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl WatchBinding {
    pub fn new(paths: &[String], exclude: &[String], tasks: Vec<TaskName>) -> Result<Self> {
        let watch_set = build_globset(paths)
            .with_context(|| format!("building watch globset for {:?}", tasks))?;

        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(exclude)
                    .with_context(|| format!("building exclude globset for {:?}", tasks))?,
            )
        };

        Ok(Self {
            tasks,
            watch_set,
            exclude_set,
            patterns: paths.to_vec(),
        })
    }

    /// Tasks triggered by this binding, in declared order.
    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a root-relative path belongs to this binding.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

impl TryFrom<&WatchConfig> for WatchBinding {
    type Error = anyhow::Error;

    fn try_from(cfg: &WatchConfig) -> Result<Self> {
        WatchBinding::new(&cfg.paths, &cfg.exclude, cfg.tasks.clone())
    }
}

/// Compile every `[[watch]]` entry of `cfg`, preserving order.
pub fn bindings_from_config(cfg: &ConfigFile) -> Result<Vec<WatchBinding>> {
    cfg.watch.iter().map(WatchBinding::try_from).collect()
}
