// src/pipeline/stage.rs

//! Stage abstraction and the fold that applies stages to a record.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;
use crate::pipeline::record::FileRecord;

/// Future returned by [`Stage::apply`].
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<FileRecord>> + Send + 'a>>;

/// Read-only environment a stage may consult.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Project root; patterns and `@root` includes resolve against it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
}

/// One transformation step of a task.
///
/// Stages are stateless between invocations; everything they learn about a
/// file (dependencies, source map, companions) is written onto the record.
pub trait Stage: Send + Sync + fmt::Debug {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Predict the output path for `relative` without running the stage.
    ///
    /// The change filter needs the final target path before any stage runs,
    /// so renaming stages override this.
    fn output_path(&self, relative: &Path) -> PathBuf {
        relative.to_path_buf()
    }

    fn apply<'a>(&'a self, ctx: &'a StageContext, record: FileRecord) -> StageFuture<'a>;
}

/// A stage failure for a single file.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: String,
    pub error: anyhow::Error,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:#}", self.stage, self.error)
    }
}

/// Apply `stages` in declared order, stopping at the first failure.
pub async fn apply_stages(
    stages: &[Arc<dyn Stage>],
    ctx: &StageContext,
    record: FileRecord,
) -> std::result::Result<FileRecord, StageFailure> {
    let mut record = record;
    for stage in stages {
        debug!(stage = stage.name(), source = ?record.source(), "applying stage");
        record = stage
            .apply(ctx, record)
            .await
            .map_err(|error| StageFailure {
                stage: stage.name().to_string(),
                error,
            })?;
    }
    Ok(record)
}

/// Output path after every stage's rename has been applied.
pub fn predicted_output(stages: &[Arc<dyn Stage>], relative: &Path) -> PathBuf {
    stages
        .iter()
        .fold(relative.to_path_buf(), |path, stage| stage.output_path(&path))
}
