// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Compiling `[[watch]]` bindings (`patterns.rs`).
//! - Debouncing bursts of events per path (`debounce.rs`).
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//!
//! It does **not** run tasks; it only turns filesystem changes into
//! `TaskTriggered` events for the engine.

pub mod debounce;
pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::Debouncer;
pub use event_handler::{Trigger, resolve_triggers};
pub use patterns::{WatchBinding, bindings_from_config};
pub use watcher::{WatcherHandle, spawn_watcher, validate_bindings};
