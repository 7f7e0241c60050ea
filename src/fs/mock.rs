// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: SystemTime },
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Logical clock; every write advances it by one second.
    clock: u64,
    writes: Vec<PathBuf>,
    denied: Vec<PathBuf>,
}

/// In-memory filesystem with a deterministic modification clock.
///
/// Each `add_file` / `write` stamps the entry with the next tick of a logical
/// clock, so "written later" always means "newer mtime" without sleeping.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut state = MockState::default();
        // Ensure root exists
        state
            .entries
            .insert(PathBuf::from("/"), MockEntry::Dir(Vec::new()));

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add (or replace) a file. Does not count as a write.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        Self::insert_file(&mut state, path.as_ref(), content.into());
    }

    /// Overwrite the modification time of an existing file.
    pub fn set_modified(&self, path: impl AsRef<Path>, at: SystemTime) {
        let mut state = self.lock();
        if let Some(MockEntry::File { modified, .. }) = state.entries.get_mut(path.as_ref()) {
            *modified = at;
        }
    }

    /// Remove a single file, as if the user deleted it.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        Self::remove_entry(&mut state, path.as_ref());
    }

    /// Make every write below `prefix` fail (simulates an unwritable target).
    pub fn deny_writes_under(&self, prefix: impl AsRef<Path>) {
        self.lock().denied.push(prefix.as_ref().to_path_buf());
    }

    /// Paths written through [`FileSystem::write`], in order.
    pub fn writes(&self) -> Vec<PathBuf> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    fn tick(state: &mut MockState) -> SystemTime {
        state.clock += 1;
        UNIX_EPOCH + Duration::from_secs(1_000_000 + state.clock)
    }

    fn insert_file(state: &mut MockState, path: &Path, content: Vec<u8>) {
        let modified = Self::tick(state);
        state
            .entries
            .insert(path.to_path_buf(), MockEntry::File { content, modified });
        if let Some(parent) = path.parent() {
            Self::ensure_dir_entry(state, parent);
            Self::link_child(state, parent, path);
        }
    }

    fn ensure_dir_entry(state: &mut MockState, path: &Path) {
        if state.entries.contains_key(path) {
            return;
        }
        state
            .entries
            .insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = path.parent() {
            Self::ensure_dir_entry(state, parent);
            Self::link_child(state, parent, path);
        }
    }

    fn link_child(state: &mut MockState, parent: &Path, child: &Path) {
        if let Some(MockEntry::Dir(children)) = state.entries.get_mut(parent) {
            if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_string());
                }
            }
        }
    }

    fn remove_entry(state: &mut MockState, path: &Path) {
        state.entries.retain(|p, _| !p.starts_with(path));
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(MockEntry::Dir(children)) = state.entries.get_mut(parent) {
                children.retain(|c| c.as_str() != name.to_string_lossy());
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { content, .. }) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.denied.iter().any(|d| path.starts_with(d)) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        Self::insert_file(&mut state, path, contents.to_vec());
        state.writes.push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        match self.lock().entries.get(path) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            Some(MockEntry::Dir(_)) => Ok(UNIX_EPOCH),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.denied.iter().any(|d| path.starts_with(d)) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        if !state.entries.contains_key(path) {
            return Err(anyhow!("Not found: {:?}", path));
        }
        Self::remove_entry(&mut state, path);
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
