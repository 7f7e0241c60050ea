// src/runner/registry.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::{ConfigFile, TaskConfig, TaskKind};
use crate::errors::{AssetwatchError, Result};
use crate::pipeline::sources::SourceSet;
use crate::pipeline::stages::build_stages;
use crate::pipeline::task::{CleanTask, PipelineTask, Task};
use crate::types::RunMode;

/// What a registered name refers to.
#[derive(Debug, Clone)]
pub enum Entry {
    Task(Arc<dyn Task>),
    Composite { mode: RunMode, children: Vec<String> },
}

/// Explicit name → task/composite table shared by the runner and watcher.
///
/// Tasks and composites live in one namespace. Children of a composite may
/// be registered after it; a composite cycle is rejected at registration, as
/// is a parallel composite over an already registered exclusive task.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, task: Arc<dyn Task>) -> Result<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        debug!(task = %name, "registered task");
        self.entries.insert(name, Entry::Task(task));
        Ok(())
    }

    pub fn register_composite(
        &mut self,
        name: impl Into<String>,
        mode: RunMode,
        children: Vec<String>,
    ) -> Result<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        self.ensure_acyclic(&name, &children)?;
        if mode == RunMode::Parallel {
            if let Some(child) = children.iter().find(|child| self.is_exclusive(child)) {
                return Err(AssetwatchError::ConfigError(format!(
                    "parallel composite '{name}' includes '{child}', which must run on its own"
                )));
            }
        }
        debug!(composite = %name, %mode, ?children, "registered composite");
        self.entries
            .insert(name, Entry::Composite { mode, children });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether `name` is, or transitively contains, an exclusive task.
    /// Unknown names are not exclusive.
    pub fn is_exclusive(&self, name: &str) -> bool {
        match self.entries.get(name) {
            Some(Entry::Task(task)) => task.exclusive(),
            Some(Entry::Composite { children, .. }) => {
                children.iter().any(|child| self.is_exclusive(child))
            }
            None => false,
        }
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(AssetwatchError::DuplicateTask(name.to_string()));
        }
        Ok(())
    }

    /// Reject `name -> children` if it would close a composition cycle.
    fn ensure_acyclic(&self, name: &str, children: &[String]) -> Result<()> {
        // Edge direction: composite -> child.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for (parent, entry) in self.entries.iter() {
            if let Entry::Composite { children, .. } = entry {
                for child in children {
                    graph.add_edge(parent.as_str(), child.as_str(), ());
                }
            }
        }
        graph.add_node(name);
        for child in children {
            graph.add_edge(name, child.as_str(), ());
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(AssetwatchError::CompositeCycle(format!(
                "registering '{}' closes a cycle through '{}'",
                name,
                cycle.node_id()
            ))),
        }
    }

    /// Build a registry holding every task and composite of `cfg`.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut registry = Registry::new();

        for (name, task_cfg) in cfg.task.iter() {
            let task = build_task(name, task_cfg)?;
            registry.register(name.clone(), task)?;
        }
        for (name, composite) in cfg.composite.iter() {
            registry.register_composite(name.clone(), composite.mode, composite.tasks.clone())?;
        }

        Ok(registry)
    }
}

fn build_task(name: &str, cfg: &TaskConfig) -> Result<Arc<dyn Task>> {
    let task: Arc<dyn Task> = match cfg.kind {
        TaskKind::Clean => Arc::new(CleanTask::new(name, &cfg.dest)),
        TaskKind::Pipeline => {
            let config_err =
                |e: anyhow::Error| AssetwatchError::ConfigError(format!("task '{name}': {e:#}"));

            let sources = SourceSet::new(&cfg.src, &cfg.exclude).map_err(config_err)?;
            let stages = build_stages(&cfg.stages).map_err(config_err)?;

            let mut task = PipelineTask::new(name, sources, &cfg.dest, stages)
                .with_compare(cfg.changed.compare_mode())
                .with_require_match(cfg.require_match)
                .with_depends_on(cfg.depends_on.clone());
            if let Some(title) = &cfg.error_title {
                task = task.with_error_title(title.clone());
            }
            Arc::new(task)
        }
    };
    Ok(task)
}
