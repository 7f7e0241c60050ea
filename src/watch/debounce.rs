// src/watch/debounce.rs

//! Per-path trailing-edge debouncing.
//!
//! A path becomes ready once no event for it arrived within the window.
//! Each new event for the same path pushes its deadline back. The debouncer
//! is a plain data structure driven by explicit timestamps, so it is tested
//! without sleeping.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    /// Path → (deadline, arrival sequence).
    pending: HashMap<PathBuf, (Instant, u64)>,
    seq: u64,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            seq: 0,
        }
    }

    /// Record an event for `path` observed at `now`.
    pub fn push(&mut self, path: PathBuf, now: Instant) {
        self.seq += 1;
        let deadline = now + self.window;
        match self.pending.get_mut(&path) {
            // Keep the first-seen sequence so the drain order stays stable.
            Some(entry) => entry.0 = deadline,
            None => {
                self.pending.insert(path, (deadline, self.seq));
            }
        }
    }

    /// Earliest deadline among pending paths.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(deadline, _)| *deadline).min()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every path whose deadline is at or before `now`,
    /// in order of first arrival.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready: Vec<(u64, PathBuf)> = self
            .pending
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(path, (_, seq))| (*seq, path.clone()))
            .collect();
        ready.sort();

        for (_, path) in &ready {
            self.pending.remove(path);
        }
        ready.into_iter().map(|(_, path)| path).collect()
    }
}
