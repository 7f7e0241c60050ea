// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::FailurePolicy;

/// Command-line arguments for `assetwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetwatch",
    version,
    about = "Incremental front-end asset builds with watch and live reload.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Assetwatch.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = "Assetwatch.toml")]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETWATCH_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run tasks or composites once and exit.
    Run {
        /// Registered task or composite names.
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,

        /// Start all named tasks together instead of one after another.
        #[arg(long)]
        parallel: bool,

        /// Override `[config].failure_policy` (fail-fast, collect-all).
        #[arg(long, value_name = "POLICY")]
        failure_policy: Option<FailurePolicy>,
    },

    /// Run the default task, then watch and serve until Ctrl-C.
    Dev {
        /// Do not start the dev server.
        #[arg(long)]
        no_serve: bool,

        /// Do not open a browser.
        #[arg(long)]
        no_open: bool,
    },

    /// Watch and rebuild without running the default task first.
    Watch,

    /// Serve the build output without watching.
    Serve {
        /// Do not open a browser.
        #[arg(long)]
        no_open: bool,
    },

    /// Print tasks, composites and watch bindings.
    List,

    /// Validate the config file and exit.
    Check,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
