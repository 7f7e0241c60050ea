// src/serve/mod.rs

//! Development HTTP server.
//!
//! Serves the build output and pushes a reload to browsers after every
//! successful build. It only listens to build-completed signals; it never
//! starts builds.

pub mod browser;
pub mod reload;
pub mod server;

pub use reload::{Reload, ReloadHub};
pub use server::{ServeOptions, ServerHandle, inject_script, router, serve};
