// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskKind};
use crate::errors::{AssetwatchError, Result};
use crate::pipeline::sources::compile_glob;
use crate::types::RunMode;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_names(cfg)?;
    validate_tasks(cfg)?;
    validate_composites(cfg)?;
    validate_composite_graph(cfg)?;
    validate_clean_exclusive(cfg)?;
    validate_watch(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(AssetwatchError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.concurrency == 0 {
        return Err(AssetwatchError::ConfigError(
            "[config].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    if !is_known(cfg, &cfg.config.default_task) {
        return Err(AssetwatchError::ConfigError(format!(
            "[config].default_task refers to unknown task '{}'",
            cfg.config.default_task
        )));
    }

    Ok(())
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.composite.keys() {
        if cfg.task.contains_key(name) {
            return Err(AssetwatchError::DuplicateTask(name.clone()));
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.kind == TaskKind::Pipeline && task.src.is_empty() {
            return Err(AssetwatchError::ConfigError(format!(
                "task '{}' has no `src` patterns",
                name
            )));
        }

        for pattern in task.src.iter().chain(&task.exclude).chain(&task.depends_on) {
            compile_glob(pattern).map_err(|e| {
                AssetwatchError::ConfigError(format!("task '{}': {:#}", name, e))
            })?;
        }
    }
    Ok(())
}

fn validate_composites(cfg: &RawConfigFile) -> Result<()> {
    for (name, composite) in cfg.composite.iter() {
        if composite.tasks.is_empty() {
            return Err(AssetwatchError::ConfigError(format!(
                "composite '{}' has no tasks",
                name
            )));
        }
        for child in composite.tasks.iter() {
            if !is_known(cfg, child) {
                return Err(AssetwatchError::ConfigError(format!(
                    "composite '{}' refers to unknown task '{}'",
                    name, child
                )));
            }
        }
    }
    Ok(())
}

fn validate_composite_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: composite -> child.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys().chain(cfg.composite.keys()) {
        graph.add_node(name.as_str());
    }
    for (name, composite) in cfg.composite.iter() {
        for child in composite.tasks.iter() {
            graph.add_edge(name.as_str(), child.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(AssetwatchError::CompositeCycle(format!(
            "composite cycle involving '{}'",
            cycle.node_id()
        ))),
    }
}

/// A clean task deletes what its siblings write, so it may not sit anywhere
/// below a parallel composite. Runs after the graph check, so the walk ends.
fn validate_clean_exclusive(cfg: &RawConfigFile) -> Result<()> {
    for (name, composite) in cfg.composite.iter() {
        if composite.mode != RunMode::Parallel {
            continue;
        }
        if let Some(clean) = composite.tasks.iter().find_map(|child| find_clean(cfg, child)) {
            return Err(AssetwatchError::ConfigError(format!(
                "parallel composite '{}' includes clean task '{}'; run it from a sequential composite instead",
                name, clean
            )));
        }
    }
    Ok(())
}

fn find_clean<'a>(cfg: &'a RawConfigFile, name: &'a str) -> Option<&'a str> {
    if let Some(task) = cfg.task.get(name) {
        return (task.kind == TaskKind::Clean).then_some(name);
    }
    cfg.composite
        .get(name)?
        .tasks
        .iter()
        .find_map(|child| find_clean(cfg, child))
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    for (idx, binding) in cfg.watch.iter().enumerate() {
        if binding.paths.is_empty() {
            return Err(AssetwatchError::ConfigError(format!(
                "[[watch]] entry #{} has no paths",
                idx + 1
            )));
        }
        for pattern in binding.paths.iter().chain(&binding.exclude) {
            compile_glob(pattern).map_err(|e| {
                AssetwatchError::ConfigError(format!("[[watch]] entry #{}: {:#}", idx + 1, e))
            })?;
        }

        if binding.tasks.is_empty() {
            return Err(AssetwatchError::ConfigError(format!(
                "[[watch]] entry #{} has no tasks",
                idx + 1
            )));
        }
        for task in binding.tasks.iter() {
            if !is_known(cfg, task) {
                return Err(AssetwatchError::TaskNotFound(task.clone()));
            }
            // Watch-triggered runs overlap each other.
            if let Some(clean) = find_clean(cfg, task) {
                return Err(AssetwatchError::ConfigError(format!(
                    "[[watch]] entry #{} triggers clean task '{}'",
                    idx + 1,
                    clean
                )));
            }
        }
    }
    Ok(())
}

fn is_known(cfg: &RawConfigFile, name: &str) -> bool {
    cfg.task.contains_key(name) || cfg.composite.contains_key(name)
}
