// src/pipeline/mod.rs

//! File pipelines: sources, stages, change filtering and tasks.
//!
//! - [`sources`] turns globs into concrete files and output-relative paths.
//! - [`change_filter`] decides which sources need reprocessing, backed by
//!   [`state`] and [`fingerprint`].
//! - [`stage`] and [`stages`] define the per-file transformations.
//! - [`task`] ties it together into runnable pipeline and clean tasks.

pub mod change_filter;
pub mod fingerprint;
pub mod record;
pub mod sources;
pub mod stage;
pub mod stages;
pub mod state;
pub mod task;

pub use change_filter::{ChangeFilter, is_stale, should_process};
pub use record::{Companion, Dependency, FileRecord, SourceMap};
pub use sources::{SourceFile, SourceSet};
pub use stage::{Stage, StageContext, StageFailure, apply_stages};
pub use state::{FileFilterStore, FilterStore, MemoryFilterStore};
pub use task::{CleanTask, PipelineTask, Task, TaskContext, TaskReport};
