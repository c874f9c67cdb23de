// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod signals;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::build::CommandBuilder;
use crate::cli::{CliArgs, RunMode};
use crate::config::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{Supervisor, SupervisorOptions};
use crate::exec::{BuildOnlyLauncher, CommandLauncher};
use crate::watch::{FsWatcher, WatchedPathSet};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (plus CLI overrides)
/// - the command builder
/// - the process launcher for the selected mode
/// - the file watcher (watch mode only)
/// - OS shutdown signals
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if !args.args.is_empty() {
        cfg.run.args = args.args.clone();
    }

    let mode = args.mode();
    if args.dry_run {
        print_dry_run(&cfg, mode);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    signals::cancel_on_shutdown_signal(cancel.clone());

    supervise(&cfg, mode, cancel).await?;
    Ok(())
}

/// Build the supervisor for `mode` from a validated config and run it until
/// it finishes or `cancel` fires.
pub async fn supervise(
    cfg: &ConfigFile,
    mode: RunMode,
    cancel: CancellationToken,
) -> errors::Result<()> {
    let builder = CommandBuilder::new(&cfg.build.cmd, &cfg.root, cfg.source_patterns()?)
        .with_depfile(cfg.build.depfile.clone());

    let options = SupervisorOptions {
        watch: mode == RunMode::Watch,
        debounce: cfg.watch.debounce,
        stop_timeout: cfg.run.grace_period,
    };

    info!(?mode, root = %cfg.root.display(), "starting devloop");

    match mode {
        RunMode::BuildOnly => {
            let launcher = BuildOnlyLauncher::new(&cfg.build.artifact);
            Supervisor::new(options, builder, launcher, WatchedPathSet::unwatched())
                .run(cancel)
                .await
        }
        RunMode::Once => {
            Supervisor::new(options, builder, command_launcher(cfg), WatchedPathSet::unwatched())
                .run(cancel)
                .await
        }
        RunMode::Watch => {
            let (watcher, events) = FsWatcher::new()?;
            let mut paths = WatchedPathSet::with_registry(Box::new(watcher));
            paths.seed(&cfg.build.entrypoints)?;
            debug!(seeded = paths.len(), "entry points watched");

            Supervisor::new(options, builder, command_launcher(cfg), paths)
                .with_watch_events(events)
                .run(cancel)
                .await
        }
    }
}

fn command_launcher(cfg: &ConfigFile) -> CommandLauncher {
    CommandLauncher::new(&cfg.build.artifact, &cfg.root)
        .runtime(cfg.run.runtime.clone())
        .args(cfg.run.args.clone())
        .grace_period(cfg.run.grace_period)
}

/// Print the resolved configuration without building anything.
fn print_dry_run(cfg: &ConfigFile, mode: RunMode) {
    println!("devloop dry-run");
    println!("  mode: {mode:?}");
    println!("  root: {}", cfg.root.display());
    println!();

    println!("build:");
    println!("  cmd: {}", cfg.build.cmd);
    println!("  artifact: {}", cfg.build.artifact.display());
    if !cfg.build.entrypoints.is_empty() {
        println!("  entrypoints:");
        for entry in &cfg.build.entrypoints {
            println!("    - {}", entry.display());
        }
    }
    if !cfg.build.watch.is_empty() {
        println!("  watch: {:?}", cfg.build.watch);
    }
    if !cfg.build.exclude.is_empty() {
        println!("  exclude: {:?}", cfg.build.exclude);
    }
    if let Some(depfile) = &cfg.build.depfile {
        println!("  depfile: {}", depfile.display());
    }

    println!("run:");
    if let Some(runtime) = &cfg.run.runtime {
        println!("  runtime: {runtime}");
    }
    if !cfg.run.args.is_empty() {
        println!("  args: {:?}", cfg.run.args);
    }
    println!("  grace_period: {:?}", cfg.run.grace_period);

    println!("watch:");
    println!("  debounce: {:?}", cfg.watch.debounce);

    debug!("dry-run complete (no execution)");
}
