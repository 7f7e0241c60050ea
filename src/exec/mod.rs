// src/exec/mod.rs

//! Execution layer between the engine and the runner.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RunnerBackend` used in production, which tests can replace with a fake
//!   implementation.

pub mod backend;

pub use backend::{ExecutorBackend, RunnerBackend};
