// src/lib.rs

pub mod alert;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod runner;
pub mod serve;
pub mod types;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::alert::{AlertSink, CommandSink, LogSink};
use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{BuildCompleted, CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::AssetwatchError;
use crate::exec::RunnerBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::change_filter::ChangeFilter;
use crate::pipeline::state::{FileFilterStore, FilterStore, MemoryFilterStore};
use crate::pipeline::task::TaskContext;
use crate::runner::{Registry, RunReport, Runner};
use crate::serve::{ServeOptions, serve};
use crate::types::{RunMode, StateStorageMode};
use crate::watch::{bindings_from_config, spawn_watcher};

/// Everything built from a validated config.
#[derive(Debug, Clone)]
pub struct App {
    pub config: ConfigFile,
    pub registry: Arc<Registry>,
    pub runner: Arc<Runner>,
}

impl App {
    /// Wire registry, change filter, alert sink and runner for `config`.
    pub fn build(config: ConfigFile, fs: Arc<dyn FileSystem>) -> crate::errors::Result<Self> {
        let root = config.config.root.clone();
        let registry = Arc::new(Registry::from_config(&config)?);

        let store: Box<dyn FilterStore> = match config.config.state_storage {
            StateStorageMode::File => Box::new(FileFilterStore::open(&root, Arc::clone(&fs))?),
            StateStorageMode::Memory => Box::new(MemoryFilterStore::new()),
        };
        let sink: Arc<dyn AlertSink> = match &config.notify.command {
            Some(cmd) => Arc::new(CommandSink::new(cmd.clone())),
            None => Arc::new(LogSink),
        };

        let ctx = TaskContext::new(
            root,
            fs,
            ChangeFilter::new(store),
            sink,
            config.config.concurrency,
        );
        let runner = Arc::new(Runner::new(
            Arc::clone(&registry),
            Arc::new(ctx),
            config.config.failure_policy,
        ));

        Ok(Self {
            config,
            registry,
            runner,
        })
    }

    fn serve_options(&self, open_browser: bool) -> Option<(std::path::PathBuf, ServeOptions)> {
        self.config.server.as_ref().map(|server| {
            let options = ServeOptions {
                host: server.host.clone(),
                port: server.port,
                live_reload: server.live_reload,
                open_browser: server.open_browser && open_browser,
            };
            (self.config.config.root.join(&server.root), options)
        })
    }
}

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    match args.command {
        Command::Check => {
            println!(
                "{}: ok ({} tasks, {} composites, {} watch bindings)",
                args.config.display(),
                cfg.task.len(),
                cfg.composite.len(),
                cfg.watch.len()
            );
            Ok(())
        }
        Command::List => {
            print_listing(&cfg);
            Ok(())
        }
        Command::Run {
            tasks,
            parallel,
            failure_policy,
        } => {
            let mut cfg = cfg;
            if let Some(policy) = failure_policy {
                cfg.config.failure_policy = policy;
            }
            let app = App::build(cfg, Arc::new(RealFileSystem))?;
            let mode = if parallel {
                RunMode::Parallel
            } else {
                RunMode::Sequential
            };
            let report = app.runner.run(&tasks, mode).await?;
            summarize(&report);
            Ok(())
        }
        Command::Dev { no_serve, no_open } => {
            let app = App::build(cfg, Arc::new(RealFileSystem))?;
            let default_task = app.config.config.default_task.clone();
            let report = app.runner.run_one(&default_task).await?;
            summarize(&report);

            let server = if no_serve {
                None
            } else {
                let options = app.serve_options(!no_open);
                if options.is_none() {
                    warn!("no [server] section; not serving");
                }
                options
            };
            watch_loop(&app, server).await
        }
        Command::Watch => {
            let app = App::build(cfg, Arc::new(RealFileSystem))?;
            watch_loop(&app, None).await
        }
        Command::Serve { no_open } => {
            let app = App::build(cfg, Arc::new(RealFileSystem))?;
            let (root, options) = app.serve_options(!no_open).ok_or_else(|| {
                AssetwatchError::ConfigError("`serve` needs a [server] section".to_string())
            })?;

            // Nothing publishes builds; keep the sender so the forwarder stays idle.
            let (_build_tx, build_rx) = broadcast::channel::<BuildCompleted>(1);
            let server = serve(root, options, build_rx).await?;
            tokio::signal::ctrl_c().await?;
            info!("shutdown requested");
            server.stop().await;
            Ok(())
        }
    }
}

/// Watch (and optionally serve) until Ctrl-C or a structural failure.
async fn watch_loop(
    app: &App,
    server: Option<(std::path::PathBuf, ServeOptions)>,
) -> Result<()> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let (build_tx, build_rx) = broadcast::channel::<BuildCompleted>(16);

    let bindings = bindings_from_config(&app.config)?;
    let watcher = spawn_watcher(
        app.config.config.root.clone(),
        bindings,
        &app.registry,
        Duration::from_millis(app.config.config.debounce_ms),
        rt_tx.clone(),
    )?;

    let server = match server {
        Some((root, options)) => Some(serve(root, options, build_rx).await?),
        None => None,
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let executor = RunnerBackend::new(Arc::clone(&app.runner), rt_tx);
    let core = CoreRuntime::new(RuntimeOptions::default());
    let runtime = Runtime::new(core, rt_rx, executor).with_build_notifications(build_tx);

    let result = runtime.run().await;

    watcher.stop().await;
    if let Some(server) = server {
        server.stop().await;
    }

    result?;
    Ok(())
}

fn summarize(report: &RunReport) {
    let processed: usize = report.tasks.iter().map(|t| t.processed).sum();
    let skipped: usize = report.tasks.iter().map(|t| t.skipped).sum();
    let failed = report.failed_files();

    info!(tasks = report.tasks.len(), processed, skipped, failed, "run complete");
    if failed > 0 {
        warn!(failed, "some files failed to build; see errors above");
    }
}

fn print_listing(cfg: &ConfigFile) {
    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name} ({:?})", task.kind);
        if !task.src.is_empty() {
            println!("      src: {:?}", task.src);
        }
        if !task.exclude.is_empty() {
            println!("      exclude: {:?}", task.exclude);
        }
        println!("      dest: {}", task.dest.display());
        if !task.stages.is_empty() {
            let stages: Vec<String> = task.stages.iter().map(|s| format!("{s:?}")).collect();
            println!("      stages: {}", stages.join(", "));
        }
    }

    println!();
    println!("composites ({}):", cfg.composite.len());
    for (name, composite) in cfg.composite.iter() {
        println!("  - {name} [{}]: {}", composite.mode, composite.tasks.join(", "));
    }

    println!();
    println!("watch ({}):", cfg.watch.len());
    for binding in cfg.watch.iter() {
        println!("  - {:?} -> {}", binding.paths, binding.tasks.join(", "));
    }

    if let Some(server) = &cfg.server {
        println!();
        println!(
            "server: http://{}:{}/ serving {}",
            server.host,
            server.port,
            server.root.display()
        );
    }
}

