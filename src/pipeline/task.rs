// src/pipeline/task.rs

//! Tasks: the named, repeatable units the runner executes.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::alert::{Alert, AlertSink};
use crate::errors::{AssetwatchError, Result};
use crate::fs::FileSystem;
use crate::pipeline::change_filter::{ChangeFilter, is_stale};
use crate::pipeline::state::FilterEntry;
use crate::pipeline::record::{Dependency, FileRecord};
use crate::pipeline::sources::{SourceFile, SourceSet, expand_glob, glob_base, normalize_pattern};
use crate::pipeline::stage::{Stage, StageContext, apply_stages, predicted_output};
use crate::types::CompareMode;

/// Future returned by [`Task::run`].
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>>;

/// Everything a task run needs from its environment.
///
/// One context is shared by every task of a runner, so the change filter
/// sees all (source, target) pairs.
pub struct TaskContext {
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    filter: Mutex<ChangeFilter>,
    pub sink: Arc<dyn AlertSink>,
    /// Maximum files processed at once within one task.
    pub concurrency: usize,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("root", &self.root)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    pub fn new(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        filter: ChangeFilter,
        sink: Arc<dyn AlertSink>,
        concurrency: usize,
    ) -> Self {
        Self {
            root: root.into(),
            fs,
            filter: Mutex::new(filter),
            sink,
            concurrency: concurrency.max(1),
        }
    }

    /// Lock the shared change filter. The guard must not be held across `.await`.
    pub fn filter(&self) -> MutexGuard<'_, ChangeFilter> {
        self.filter.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stage_context(&self) -> StageContext {
        StageContext {
            root: self.root.clone(),
            fs: Arc::clone(&self.fs),
        }
    }
}

/// Summary of one task run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    pub task: String,
    /// Sources selected by the task's globs.
    pub matched: usize,
    /// Sources the change filter declared up to date.
    pub skipped: usize,
    /// Sources transformed and written.
    pub processed: usize,
    /// Sources whose transformation failed (reported to the alert sink).
    pub failed: usize,
    /// Every output written, companions included, sorted.
    pub written: Vec<PathBuf>,
}

/// A named, idempotent unit of build work.
pub trait Task: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Run the task once. Per-file transformation errors are reported to the
    /// alert sink and counted; only structural failures are returned.
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a>;

    /// Whether the task must not overlap any other task, e.g. because it
    /// deletes what the others write.
    fn exclusive(&self) -> bool {
        false
    }
}

enum FileOutcome {
    Skipped,
    Written(Vec<PathBuf>),
    Failed,
}

/// Reads sources, runs them through stages and writes them under `dest`.
#[derive(Debug)]
pub struct PipelineTask {
    name: String,
    sources: SourceSet,
    dest: PathBuf,
    stages: Vec<Arc<dyn Stage>>,
    compare: Option<CompareMode>,
    error_title: String,
    require_match: bool,
    depends_on: Vec<String>,
}

impl PipelineTask {
    pub fn new(
        name: impl Into<String>,
        sources: SourceSet,
        dest: impl Into<PathBuf>,
        stages: Vec<Arc<dyn Stage>>,
    ) -> Self {
        let name = name.into();
        Self {
            error_title: name.clone(),
            name,
            sources,
            dest: dest.into(),
            stages,
            compare: Some(CompareMode::Mtime),
            require_match: false,
            depends_on: Vec::new(),
        }
    }

    /// `None` disables the change filter: every source is processed.
    pub fn with_compare(mut self, compare: Option<CompareMode>) -> Self {
        self.compare = compare;
        self
    }

    pub fn with_error_title(mut self, title: impl Into<String>) -> Self {
        self.error_title = title.into();
        self
    }

    pub fn with_require_match(mut self, require_match: bool) -> Self {
        self.require_match = require_match;
        self
    }

    /// Globs (root-relative) whose change invalidates every output.
    pub fn with_depends_on(mut self, patterns: Vec<String>) -> Self {
        self.depends_on = patterns;
        self
    }

    fn target_dir(&self, ctx: &TaskContext) -> PathBuf {
        ctx.root.join(&self.dest)
    }

    async fn process(
        &self,
        ctx: &TaskContext,
        stage_ctx: &StageContext,
        file: SourceFile,
    ) -> Result<FileOutcome> {
        let target_dir = self.target_dir(ctx);
        let predicted = target_dir.join(predicted_output(&self.stages, &file.relative));

        if let Some(mode) = self.compare {
            let entry = ctx.filter().entry(&file.path, &predicted);
            match is_stale(ctx.fs.as_ref(), &file.path, &predicted, mode, entry.as_ref()) {
                Ok(false) => {
                    debug!(task = %self.name, source = ?file.path, "up to date; skipping");
                    return Ok(FileOutcome::Skipped);
                }
                Ok(true) => {}
                Err(e) => {
                    self.alert(ctx, &file.path, format!("{e:#}"));
                    return Ok(FileOutcome::Failed);
                }
            }
        }

        let read = ctx
            .fs
            .read(&file.path)
            .and_then(|bytes| Ok((bytes, ctx.fs.modified(&file.path)?)));
        let (contents, modified) = match read {
            Ok(v) => v,
            Err(e) => {
                self.alert(ctx, &file.path, format!("{e:#}"));
                return Ok(FileOutcome::Failed);
            }
        };

        let mut record = FileRecord::new(&file.path, &file.relative, contents.clone(), modified);
        if let Err(e) = self.observe_depends_on(ctx, &mut record) {
            self.alert(ctx, &file.path, format!("{e:#}"));
            return Ok(FileOutcome::Failed);
        }

        let record = match apply_stages(&self.stages, stage_ctx, record).await {
            Ok(record) => record,
            Err(failure) => {
                ctx.filter().forget(&file.path, &predicted);
                self.alert(ctx, &file.path, failure.to_string());
                return Ok(FileOutcome::Failed);
            }
        };

        let target = target_dir.join(&record.relative);
        let mut written = Vec::with_capacity(1 + record.companions.len());
        self.write(ctx, &target, &record.contents)?;
        written.push(target.clone());
        for companion in &record.companions {
            let path = target_dir.join(&companion.relative);
            self.write(ctx, &path, &companion.contents)?;
            written.push(path);
        }

        if self.compare.is_some() {
            let captured = FilterEntry::capture(
                ctx.fs.as_ref(),
                &target,
                &contents,
                &record.dependencies,
                &record.observed,
            );
            match captured {
                Ok(entry) => ctx.filter().record(&file.path, &target, entry),
                Err(e) => {
                    warn!(task = %self.name, target = ?target, error = %e, "failed to record filter state")
                }
            }
        }

        debug!(task = %self.name, source = ?file.path, target = ?target, "written");
        Ok(FileOutcome::Written(written))
    }

    /// Add the `depends_on` globs to `record`, hashing every match before
    /// any stage runs. Stages such as external commands read these files
    /// without telling us.
    fn observe_depends_on(&self, ctx: &TaskContext, record: &mut FileRecord) -> anyhow::Result<()> {
        for pattern in &self.depends_on {
            let dep = root_glob_dependency(&ctx.root, pattern);
            if let Dependency::Glob { base, pattern } = &dep {
                for path in expand_glob(ctx.fs.as_ref(), base, pattern)? {
                    record.observe_file(ctx.fs.as_ref(), &path);
                }
            }
            record.add_dependency(dep);
        }
        Ok(())
    }

    fn write(&self, ctx: &TaskContext, path: &Path, contents: &[u8]) -> Result<()> {
        ctx.fs
            .write(path, contents)
            .map_err(|e| AssetwatchError::structural(&self.name, format!("{e:#}")))
    }

    fn alert(&self, ctx: &TaskContext, source: &Path, message: String) {
        ctx.sink.notify(&Alert {
            title: self.error_title.clone(),
            task: self.name.clone(),
            source: source.to_path_buf(),
            message,
        });
    }

    async fn run_inner(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let files = self
            .sources
            .collect(ctx.fs.as_ref(), &ctx.root)
            .map_err(|e| AssetwatchError::structural(&self.name, format!("{e:#}")))?;

        if files.is_empty() && self.require_match {
            return Err(AssetwatchError::structural(
                &self.name,
                "no source files matched",
            ));
        }

        let mut report = TaskReport {
            task: self.name.clone(),
            matched: files.len(),
            ..TaskReport::default()
        };

        let stage_ctx = ctx.stage_context();
        let outcomes: Vec<Result<FileOutcome>> = stream::iter(files)
            .map(|file| self.process(ctx, &stage_ctx, file))
            .buffer_unordered(ctx.concurrency)
            .collect()
            .await;

        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(FileOutcome::Skipped) => report.skipped += 1,
                Ok(FileOutcome::Failed) => report.failed += 1,
                Ok(FileOutcome::Written(paths)) => {
                    report.processed += 1;
                    report.written.extend(paths);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Err(e) = ctx.filter().flush() {
            warn!(task = %self.name, error = %e, "failed to persist filter state");
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        report.written.sort();
        Ok(report)
    }
}

impl Task for PipelineTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let report = self.run_inner(ctx).await?;
            info!(
                task = %self.name,
                matched = report.matched,
                processed = report.processed,
                skipped = report.skipped,
                failed = report.failed,
                "pipeline finished"
            );
            Ok(report)
        })
    }
}

/// A root-relative glob as a dependency rooted at its static base.
fn root_glob_dependency(root: &Path, pattern: &str) -> Dependency {
    let pattern = normalize_pattern(pattern);
    let base = glob_base(pattern);
    if base.is_empty() {
        Dependency::Glob {
            base: root.to_path_buf(),
            pattern: pattern.to_string(),
        }
    } else {
        let rest = pattern[base.len()..].trim_start_matches('/');
        Dependency::Glob {
            base: root.join(&base),
            pattern: rest.to_string(),
        }
    }
}

/// Removes a directory tree and forgets every filter entry below it.
#[derive(Debug, Clone)]
pub struct CleanTask {
    name: String,
    dir: PathBuf,
}

impl CleanTask {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

impl Task for CleanTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn exclusive(&self) -> bool {
        true
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let target = ctx.root.join(&self.dir);

            if ctx.fs.exists(&target) {
                ctx.fs
                    .remove_dir_all(&target)
                    .with_context(|| format!("cleaning {}", target.display()))
                    .map_err(|e| AssetwatchError::structural(&self.name, format!("{e:#}")))?;
                info!(task = %self.name, dir = ?target, "removed");
            } else {
                debug!(task = %self.name, dir = ?target, "nothing to clean");
            }

            let mut filter = ctx.filter();
            filter.clear_under(&target);
            if let Err(e) = filter.flush() {
                warn!(task = %self.name, error = %e, "failed to persist filter state");
            }

            Ok(TaskReport {
                task: self.name.clone(),
                ..TaskReport::default()
            })
        })
    }
}
