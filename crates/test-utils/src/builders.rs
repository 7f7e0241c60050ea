#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetwatch::config::{
    CompositeConfig, ConfigFile, ConfigSection, NotifySection, RawConfigFile, StageConfig,
    TaskConfig, TaskKind, WatchConfig,
};
use assetwatch::fs::mock::MockFileSystem;
use assetwatch::pipeline::change_filter::ChangeFilter;
use assetwatch::pipeline::state::MemoryFilterStore;
use assetwatch::pipeline::task::TaskContext;
use assetwatch::types::{ChangedMode, RunMode};

use crate::sink::RecordingSink;

/// Root used by every mock project.
pub const PROJECT_ROOT: &str = "/proj";

/// Builder for `RawConfigFile` / `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection {
                    root: PathBuf::from(PROJECT_ROOT),
                    ..ConfigSection::default()
                },
                notify: NotifySection::default(),
                server: None,
                task: BTreeMap::new(),
                composite: BTreeMap::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_composite(mut self, name: &str, mode: RunMode, tasks: &[&str]) -> Self {
        self.config.composite.insert(
            name.to_string(),
            CompositeConfig {
                mode,
                tasks: tasks.iter().map(|t| t.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_watch(mut self, paths: &[&str], tasks: &[&str]) -> Self {
        self.config.watch.push(WatchConfig {
            paths: paths.iter().map(|p| p.to_string()).collect(),
            exclude: Vec::new(),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    pub fn with_default_task(mut self, name: &str) -> Self {
        self.config.config.default_task = name.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    /// Validate into a `ConfigFile`.
    ///
    /// Without an explicit [`with_default_task`](Self::with_default_task),
    /// a missing `default` entry falls back to the first task name.
    pub fn build(mut self) -> ConfigFile {
        let default = &self.config.config.default_task;
        if !self.config.task.contains_key(default) && !self.config.composite.contains_key(default) {
            if let Some(first) = self.config.task.keys().next() {
                self.config.config.default_task = first.clone();
            }
        }
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// A pipeline task writing into `dest`.
    pub fn pipeline(dest: &str) -> Self {
        Self {
            task: TaskConfig {
                kind: TaskKind::Pipeline,
                src: Vec::new(),
                exclude: Vec::new(),
                dest: PathBuf::from(dest),
                changed: ChangedMode::Mtime,
                stages: Vec::new(),
                error_title: None,
                require_match: false,
                depends_on: Vec::new(),
            },
        }
    }

    /// A clean task removing `dir`.
    pub fn clean(dir: &str) -> Self {
        let mut builder = Self::pipeline(dir);
        builder.task.kind = TaskKind::Clean;
        builder
    }

    pub fn src(mut self, pattern: &str) -> Self {
        self.task.src.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.push(pattern.to_string());
        self
    }

    pub fn changed(mut self, mode: ChangedMode) -> Self {
        self.task.changed = mode;
        self
    }

    pub fn stage(mut self, stage: StageConfig) -> Self {
        self.task.stages.push(stage);
        self
    }

    pub fn error_title(mut self, title: &str) -> Self {
        self.task.error_title = Some(title.to_string());
        self
    }

    pub fn require_match(mut self, val: bool) -> Self {
        self.task.require_match = val;
        self
    }

    pub fn depends_on(mut self, pattern: &str) -> Self {
        self.task.depends_on.push(pattern.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// An in-memory project rooted at [`PROJECT_ROOT`].
pub struct MockProject {
    pub fs: MockFileSystem,
    pub sink: Arc<RecordingSink>,
}

impl MockProject {
    pub fn new() -> Self {
        Self {
            fs: MockFileSystem::new(),
            sink: Arc::new(RecordingSink::new()),
        }
    }

    pub fn root(&self) -> PathBuf {
        PathBuf::from(PROJECT_ROOT)
    }

    /// Absolute path of a root-relative `rel`.
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root().join(rel)
    }

    pub fn file(self, rel: &str, content: &str) -> Self {
        self.write(rel, content);
        self
    }

    /// Add or replace a file, as if the user saved it.
    pub fn write(&self, rel: &str, content: &str) {
        self.fs.add_file(self.path(rel), content.as_bytes().to_vec());
    }

    pub fn read(&self, rel: &str) -> String {
        use assetwatch::fs::FileSystem;
        self.fs
            .read_to_string(&self.path(rel))
            .unwrap_or_else(|e| panic!("reading {rel}: {e:#}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        use assetwatch::fs::FileSystem;
        self.fs.exists(&self.path(rel))
    }

    /// A task context over this project with in-memory filter state.
    pub fn context(&self) -> TaskContext {
        self.context_with_concurrency(4)
    }

    pub fn context_with_concurrency(&self, concurrency: usize) -> TaskContext {
        TaskContext::new(
            self.root(),
            Arc::new(self.fs.clone()),
            ChangeFilter::new(Box::new(MemoryFilterStore::new())),
            self.sink.clone(),
            concurrency,
        )
    }
}

impl Default for MockProject {
    fn default() -> Self {
        Self::new()
    }
}
