// src/pipeline/change_filter.rs

//! Incremental-rebuild decisions.
//!
//! [`should_process`] is the pure comparison between one source and its
//! target. [`ChangeFilter`] layers remembered state on top of it so that
//! outputs depending on other files (includes, imports) are rebuilt when a
//! dependency changes, and outputs that legitimately differ from their
//! source (expanded HTML) are not rebuilt forever.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, trace};

use crate::fs::FileSystem;
use crate::pipeline::fingerprint::{Observed, fingerprint, snapshot_fingerprint};
use crate::pipeline::record::Dependency;
use crate::pipeline::state::{FilterEntry, FilterStore};
use crate::types::CompareMode;

/// Decide whether `source` must be (re)processed into `target`.
///
/// Returns `true` when the target does not exist, when (mtime mode) the
/// source is strictly newer than the target, or when (content mode) the bytes
/// differ. Performs no writes.
pub fn should_process(
    fs: &dyn FileSystem,
    source: &Path,
    target: &Path,
    mode: CompareMode,
) -> Result<bool> {
    if !fs.is_file(target) {
        return Ok(true);
    }

    match mode {
        CompareMode::Mtime => Ok(fs.modified(source)? > fs.modified(target)?),
        CompareMode::Content => Ok(fs.read(source)? != fs.read(target)?),
    }
}

/// Whether `source` must be processed into `target`, given the pair's
/// recorded `entry`.
///
/// With an entry, the pair is skipped only if the target is untouched since
/// we wrote it and the fingerprint of the source plus its recorded
/// dependencies is unchanged. Without one, falls back to [`should_process`].
/// Touches only the filesystem, so callers run it outside any lock.
pub fn is_stale(
    fs: &dyn FileSystem,
    source: &Path,
    target: &Path,
    mode: CompareMode,
    entry: Option<&FilterEntry>,
) -> Result<bool> {
    if !fs.is_file(target) {
        trace!(?target, "target missing");
        return Ok(true);
    }

    let Some(entry) = entry else {
        let process = should_process(fs, source, target, mode)?;
        trace!(?source, process, ?mode, "no filter state; compared directly");
        return Ok(process);
    };

    if fs.modified(target)? != entry.target_modified {
        debug!(?target, "target modified outside of the pipeline");
        return Ok(true);
    }

    let current = fingerprint(fs, &fs.read(source)?, &entry.dependencies)?;
    Ok(current != entry.fingerprint)
}

impl FilterEntry {
    /// State for a `target` just written from `source_contents`.
    ///
    /// The fingerprint comes from the dependency hashes in `observed`, taken
    /// when the stages read them, not from a fresh read.
    pub fn capture(
        fs: &dyn FileSystem,
        target: &Path,
        source_contents: &[u8],
        dependencies: &[Dependency],
        observed: &Observed,
    ) -> Result<Self> {
        Ok(Self {
            fingerprint: snapshot_fingerprint(fs, source_contents, dependencies, observed)?,
            target_modified: fs.modified(target)?,
            dependencies: dependencies.to_vec(),
        })
    }
}

/// Change filter with per-(source, target) memory.
pub struct ChangeFilter {
    store: Box<dyn FilterStore>,
}

impl std::fmt::Debug for ChangeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFilter").finish_non_exhaustive()
    }
}

impl ChangeFilter {
    pub fn new(store: Box<dyn FilterStore>) -> Self {
        Self { store }
    }

    /// Recorded state of a pair, if any.
    pub fn entry(&self, source: &Path, target: &Path) -> Option<FilterEntry> {
        self.store.load(source, target)
    }

    /// [`is_stale`] against this filter's recorded entry.
    pub fn check(
        &self,
        fs: &dyn FileSystem,
        source: &Path,
        target: &Path,
        mode: CompareMode,
    ) -> Result<bool> {
        is_stale(fs, source, target, mode, self.entry(source, target).as_ref())
    }

    /// Remember `entry` as the state of the pair.
    pub fn record(&mut self, source: &Path, target: &Path, entry: FilterEntry) {
        self.store.save(source, target, entry);
    }

    /// Forget a pair, e.g. after a failed transformation.
    pub fn forget(&mut self, source: &Path, target: &Path) {
        self.store.remove(source, target);
    }

    /// Forget every pair whose target lives under `target_dir`.
    pub fn clear_under(&mut self, target_dir: &Path) {
        self.store.clear_under(target_dir);
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }
}
