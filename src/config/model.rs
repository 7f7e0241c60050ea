// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{ChangedMode, FailurePolicy, RunMode, StateStorageMode};

/// Configuration exactly as read from `Assetwatch.toml`.
///
/// ```toml
/// [config]
/// default_task = "default"
/// debounce_ms = 100
///
/// [task."html:dev"]
/// src = ["src/html/**/*.html"]
/// exclude = ["src/html/blocks/**"]
/// dest = "build"
/// changed = "content"
/// error_title = "HTML"
/// stages = [{ kind = "include", prefix = "@@", basepath = "@file" }]
///
/// [composite.default]
/// mode = "sequential"
/// tasks = ["clean:dev", "build"]
///
/// [[watch]]
/// paths = ["src/html/**/*.html"]
/// tasks = ["html:dev"]
/// ```
///
/// Turned into a validated [`ConfigFile`] via `TryFrom`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub notify: NotifySection,

    /// `[server]`; the dev server is unavailable when absent.
    #[serde(default)]
    pub server: Option<ServerSection>,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// All composites from `[composite.<name>]`.
    #[serde(default)]
    pub composite: BTreeMap<String, CompositeConfig>,

    /// `[[watch]]` bindings, evaluated in listed order.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Project root that every pattern is relative to. Relative values are
    /// resolved against the config file's directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Task or composite run by `dev` before watching.
    #[serde(default = "default_task")]
    pub default_task: String,

    /// Per-path debounce window for watch events.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub state_storage: StateStorageMode,

    /// Maximum number of files a single task processes at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_task() -> String {
    "default".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_concurrency() -> usize {
    8
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            default_task: default_task(),
            debounce_ms: default_debounce_ms(),
            failure_policy: FailurePolicy::default(),
            state_storage: StateStorageMode::default(),
            concurrency: default_concurrency(),
        }
    }
}

/// `[notify]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifySection {
    /// Shell command run for every transformation error, e.g.
    /// `notify-send "$ASSETWATCH_TITLE" "$ASSETWATCH_MESSAGE"`.
    #[serde(default)]
    pub command: Option<String>,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Directory served over HTTP, relative to the project root.
    #[serde(default = "default_server_root")]
    pub root: PathBuf,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub live_reload: bool,

    #[serde(default = "default_true")]
    pub open_browser: bool,
}

fn default_server_root() -> PathBuf {
    PathBuf::from("build")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            root: default_server_root(),
            host: default_host(),
            port: default_port(),
            live_reload: true,
            open_browser: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Pipeline,
    Clean,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub kind: TaskKind,

    /// Source globs, relative to the project root. Required for pipelines.
    #[serde(default)]
    pub src: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Target directory (pipeline) or directory to remove (clean).
    pub dest: PathBuf,

    /// Change filter mode; `None` disables filtering.
    #[serde(default)]
    pub changed: ChangedMode,

    /// Transformation stages, applied in order.
    #[serde(default)]
    pub stages: Vec<StageConfig>,

    /// Alert title for transformation errors; defaults to the task name.
    #[serde(default)]
    pub error_title: Option<String>,

    /// Treat "no source matched" as a structural failure.
    #[serde(default)]
    pub require_match: bool,

    /// Extra globs whose change makes every source of the task stale.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// One entry of `stages = [...]`, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageConfig {
    Include {
        #[serde(default = "default_include_prefix")]
        prefix: String,
        #[serde(default = "default_include_basepath")]
        basepath: String,
    },
    SassGlob,
    Stylesheet {
        #[serde(default)]
        command: Option<String>,
    },
    SourceMap,
    Command {
        cmd: String,
        #[serde(default)]
        extname: Option<String>,
    },
    Rename {
        #[serde(default)]
        extname: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
    },
}

fn default_include_prefix() -> String {
    "@@".to_string()
}

fn default_include_basepath() -> String {
    "@file".to_string()
}

/// `[composite.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositeConfig {
    #[serde(default)]
    pub mode: RunMode,
    pub tasks: Vec<String>,
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    pub paths: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub tasks: Vec<String>,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so holders can rely on
/// every cross-reference being resolvable and the composite graph acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub notify: NotifySection,
    pub server: Option<ServerSection>,
    pub task: BTreeMap<String, TaskConfig>,
    pub composite: BTreeMap<String, CompositeConfig>,
    pub watch: Vec<WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            notify: raw.notify,
            server: raw.server,
            task: raw.task,
            composite: raw.composite,
            watch: raw.watch,
        }
    }

    /// Names of every registered task and composite, sorted.
    pub fn all_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .task
            .keys()
            .chain(self.composite.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }
}
