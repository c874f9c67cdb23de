// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] defines the [`Process`] contract (start / wait / two-phase
//!   stop) and [`CommandProcess`], the `tokio::process` implementation.
//! - [`launcher`] provides the [`ProcessLauncher`] factories the supervisor
//!   calls for every (re)start: [`CommandLauncher`] runs the artifact, and
//!   [`BuildOnlyLauncher`] only prints its path.

pub mod launcher;
pub mod process;

pub use launcher::{BuildOnlyLauncher, CommandLauncher, ProcessLauncher};
pub use process::{CommandProcess, DEFAULT_GRACE_PERIOD, Process, ProcessState, WaitFuture};
