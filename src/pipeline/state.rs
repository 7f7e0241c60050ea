// src/pipeline/state.rs

//! Storage for change-filter state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::pipeline::record::Dependency;

/// Relative path (from the project root) to the persisted filter state.
pub const STATE_FILE_PATH: &str = ".assetwatch/filter-state.json";

/// Last known state of one (source, target) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub fingerprint: String,
    pub target_modified: SystemTime,
    pub dependencies: Vec<Dependency>,
}

pub type FilterKey = (PathBuf, PathBuf);

/// Abstract storage for change-filter entries.
pub trait FilterStore: Send + Sync {
    fn load(&self, source: &Path, target: &Path) -> Option<FilterEntry>;
    fn save(&mut self, source: &Path, target: &Path, entry: FilterEntry);
    fn remove(&mut self, source: &Path, target: &Path);
    /// Drop every entry whose target lives under `target_dir`.
    fn clear_under(&mut self, target_dir: &Path);
    /// Persist pending changes (no-op for in-memory storage).
    fn flush(&mut self) -> Result<()>;
}

fn key(source: &Path, target: &Path) -> FilterKey {
    (source.to_path_buf(), target.to_path_buf())
}

/// Stores entries in memory only.
#[derive(Debug, Default)]
pub struct MemoryFilterStore {
    map: HashMap<FilterKey, FilterEntry>,
}

impl MemoryFilterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FilterStore for MemoryFilterStore {
    fn load(&self, source: &Path, target: &Path) -> Option<FilterEntry> {
        self.map.get(&key(source, target)).cloned()
    }

    fn save(&mut self, source: &Path, target: &Path, entry: FilterEntry) {
        self.map.insert(key(source, target), entry);
    }

    fn remove(&mut self, source: &Path, target: &Path) {
        self.map.remove(&key(source, target));
    }

    fn clear_under(&mut self, target_dir: &Path) {
        self.map.retain(|(_, target), _| !target.starts_with(target_dir));
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    source: PathBuf,
    target: PathBuf,
    #[serde(flatten)]
    entry: FilterEntry,
}

/// Stores entries in `<root>/.assetwatch/filter-state.json`.
///
/// Entries are loaded once at construction and written back on `flush`.
pub struct FileFilterStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    inner: MemoryFilterStore,
    dirty: bool,
}

impl FileFilterStore {
    pub fn open(root: &Path, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let path = root.join(STATE_FILE_PATH);
        let mut inner = MemoryFilterStore::new();

        if fs.is_file(&path) {
            let text = fs.read_to_string(&path)?;
            let stored: Vec<StoredEntry> = serde_json::from_str(&text)
                .with_context(|| format!("parsing filter state at {:?}", path))?;
            info!(entries = stored.len(), "loaded change-filter state");
            for s in stored {
                inner.save(&s.source, &s.target, s.entry);
            }
        }

        Ok(Self {
            path,
            fs,
            inner,
            dirty: false,
        })
    }
}

impl FilterStore for FileFilterStore {
    fn load(&self, source: &Path, target: &Path) -> Option<FilterEntry> {
        self.inner.load(source, target)
    }

    fn save(&mut self, source: &Path, target: &Path, entry: FilterEntry) {
        self.inner.save(source, target, entry);
        self.dirty = true;
    }

    fn remove(&mut self, source: &Path, target: &Path) {
        self.inner.remove(source, target);
        self.dirty = true;
    }

    fn clear_under(&mut self, target_dir: &Path) {
        self.inner.clear_under(target_dir);
        self.dirty = true;
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let mut stored: Vec<StoredEntry> = self
            .inner
            .map
            .iter()
            .map(|((source, target), entry)| StoredEntry {
                source: source.clone(),
                target: target.clone(),
                entry: entry.clone(),
            })
            .collect();
        stored.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

        let json = serde_json::to_vec_pretty(&stored).context("serialising filter state")?;
        self.fs
            .write(&self.path, &json)
            .with_context(|| format!("writing filter state at {:?}", self.path))?;
        self.dirty = false;
        debug!(entries = stored.len(), "persisted change-filter state");
        Ok(())
    }
}
