// src/engine/mod.rs

//! Supervisor engine for devloop.
//!
//! This module ties together:
//! - the builder (initial build and rebuilds)
//! - the process launcher (one live process at a time)
//! - the restart signals coming from the watch relay
//! - external cancellation
//!
//! The pure state machine lives in [`core`]; the async/IO shell that runs
//! builds, owns the process and multiplexes signals is implemented in
//! [`runtime`].

use std::time::Duration;

use crate::build::BuildOutcome;
use crate::errors::{DevloopError, Result};
use crate::exec::DEFAULT_GRACE_PERIOD;
use crate::watch::DEFAULT_DEBOUNCE;

pub mod core;
pub mod runtime;

pub use core::SupervisorCore;
pub use runtime::Supervisor;

/// Where the supervisor currently is in its build/run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Nothing has happened yet.
    Idle,
    /// A build or rebuild is running, or a process is being started.
    Starting,
    /// A process is alive.
    RunningProcess,
    /// Build, start or run failed (or the process exited) in watch mode;
    /// only a change or an abort moves on from here.
    WaitingForChange,
    /// A stop was issued; waiting for the exit to be observed.
    Stopping,
    /// The loop is done.
    Terminated,
}

/// What to do once a stopping process has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterStop {
    Rebuild,
    Terminate,
}

/// Events flowing into the core, produced by the shell.
#[derive(Debug)]
pub enum SupervisorEvent {
    /// Kick off the initial build.
    Begin,
    /// A build or rebuild resolved.
    BuildFinished(BuildOutcome),
    /// The process was created.
    ProcessStarted,
    /// The process could not be created.
    ProcessStartFailed(DevloopError),
    /// The process exited on its own.
    ProcessExited(Result<()>),
    /// Debounced "sources changed".
    RestartRequested,
    /// Shutdown: external cancellation or a broken watcher.
    AbortRequested,
    /// A stop was issued and the exit observed.
    ProcessStopped,
}

/// Command produced by the pure core, executed by the IO shell.
#[derive(Debug)]
pub enum CoreCommand {
    Build,
    Rebuild,
    StartProcess,
    StopProcess,
    /// Leave the loop with this result.
    Finish(Result<()>),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Default)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
}

impl CoreStep {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn one(command: CoreCommand) -> Self {
        Self {
            commands: vec![command],
        }
    }
}

/// Options shared by the core and the shell.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// Keep rebuilding and restarting on changes instead of running once.
    pub watch: bool,
    /// Quiet window used by the relay and by the shell when absorbing
    /// back-to-back restart signals.
    pub debounce: Duration,
    /// How long to wait for a process whose stop request failed before
    /// giving up on it.
    pub stop_timeout: Duration,
}

impl SupervisorOptions {
    pub fn one_shot() -> Self {
        Self {
            watch: false,
            debounce: DEFAULT_DEBOUNCE,
            stop_timeout: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn watch() -> Self {
        Self {
            watch: true,
            debounce: DEFAULT_DEBOUNCE,
            stop_timeout: DEFAULT_GRACE_PERIOD,
        }
    }
}
