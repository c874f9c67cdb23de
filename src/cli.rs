// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `devloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devloop",
    version,
    about = "Build a program, run it, and rebuild/restart it when its sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Devloop.toml")]
    pub config: String,

    /// Keep watching sources; rebuild and restart on every change.
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Build once and print the artifact path instead of running it.
    #[arg(long, conflicts_with = "watch")]
    pub build_only: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVLOOP_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the config, print it, and exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Arguments passed to the program, replacing `[run].args`.
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

impl CliArgs {
    pub fn mode(&self) -> RunMode {
        if self.build_only {
            RunMode::BuildOnly
        } else if self.watch {
            RunMode::Watch
        } else {
            RunMode::Once
        }
    }
}

/// What the supervisor does after a successful build.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Run the program once and exit with its status.
    Once,
    /// Run the program and restart it on changes until interrupted.
    Watch,
    /// Print the artifact path; never run or watch.
    BuildOnly,
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

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
