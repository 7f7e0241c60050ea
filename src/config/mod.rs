// src/config/mod.rs

//! Configuration loading and validation for assetwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate cross-references and the composite graph (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{
    CompositeConfig, ConfigFile, ConfigSection, NotifySection, RawConfigFile, ServerSection,
    StageConfig, TaskConfig, TaskKind, WatchConfig,
};
