// src/pipeline/record.rs

//! The unit of data flowing through a task's stages.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::fs::FileSystem;
use crate::pipeline::fingerprint::{Observed, file_hash_or_missing, hash_bytes};

/// Something besides the source file that influenced an output.
///
/// Recorded by stages (included HTML partials, stylesheet imports, expanded
/// glob imports) so the change filter can tell when an output went stale
/// even though its own source did not change.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dependency {
    /// A single file, by absolute path.
    File(PathBuf),
    /// Every file under `base` matching `pattern` (relative to `base`).
    Glob { base: PathBuf, pattern: String },
}

/// Source map accumulated while stages run (v3 subset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    /// Source paths, relative to the project root.
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
}

impl SourceMap {
    pub fn push(&mut self, source: String, content: String) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
            self.sources_content.push(content);
        }
    }
}

/// An extra output written next to the main one (e.g. a `.map` file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Companion {
    /// Path relative to the task's target directory.
    pub relative: PathBuf,
    pub contents: Vec<u8>,
}

/// A file on its way through a task.
#[derive(Debug, Clone)]
pub struct FileRecord {
    source: PathBuf,
    /// Output path relative to the target directory. Stages may rename it.
    pub relative: PathBuf,
    pub contents: Vec<u8>,
    pub modified: SystemTime,
    pub dependencies: Vec<Dependency>,
    /// Dependency hashes as of the moment a stage consumed them.
    pub observed: Observed,
    pub source_map: Option<SourceMap>,
    pub companions: Vec<Companion>,
}

impl FileRecord {
    pub fn new(
        source: impl Into<PathBuf>,
        relative: impl Into<PathBuf>,
        contents: Vec<u8>,
        modified: SystemTime,
    ) -> Self {
        Self {
            source: source.into(),
            relative: relative.into(),
            contents,
            modified,
            dependencies: Vec::new(),
            observed: Observed::new(),
            source_map: None,
            companions: Vec::new(),
        }
    }

    /// Absolute path of the source this record was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Contents as UTF-8 text, for text-oriented stages.
    pub fn text(&self) -> anyhow::Result<&str> {
        std::str::from_utf8(&self.contents)
            .map_err(|e| anyhow::anyhow!("{} is not valid UTF-8: {e}", self.source.display()))
    }

    pub fn set_text(&mut self, text: String) {
        self.contents = text.into_bytes();
    }

    pub fn add_dependency(&mut self, dep: Dependency) {
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
    }

    /// Remember the bytes a stage read from dependency `path`. The first
    /// observation of a path wins.
    pub fn observe(&mut self, path: impl Into<PathBuf>, bytes: &[u8]) {
        self.observed
            .entry(path.into())
            .or_insert_with(|| hash_bytes(bytes));
    }

    /// Like [`observe`](Self::observe) for a file the stage hands to
    /// someone else (a glob import, an external command).
    pub fn observe_file(&mut self, fs: &dyn FileSystem, path: &Path) {
        if !self.observed.contains_key(path) {
            let hash = file_hash_or_missing(fs, path);
            self.observed.insert(path.to_path_buf(), hash);
        }
    }

    /// Replace the extension of the output path (`".css"` or `"css"`).
    pub fn set_extension(&mut self, ext: &str) {
        self.relative.set_extension(ext.trim_start_matches('.'));
    }
}
