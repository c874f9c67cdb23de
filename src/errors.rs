// src/errors.rs

//! Crate-wide error type and result alias.

use std::fmt;

use thiserror::Error;

/// How a supervised process ended when it did not exit cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitFailure {
    /// Non-zero exit code.
    Code(i32),
    /// Terminated by a signal (unix only).
    Signaled(i32),
}

impl ExitFailure {
    /// Exit code the CLI should report for this failure.
    ///
    /// Abnormal termination never maps to success, so signals become 1.
    pub fn exit_code(&self) -> i32 {
        match *self {
            ExitFailure::Code(code) => code,
            ExitFailure::Signaled(_) => 1,
        }
    }
}

impl fmt::Display for ExitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitFailure::Code(code) => write!(f, "exit status {code}"),
            ExitFailure::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DevloopError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("build error")]
    BuildFailed,

    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error: {artifact} does not provide an entry point")]
    EntryPointMissing { artifact: String },

    #[error("process failed: {0}")]
    ProcessFailed(ExitFailure),

    #[error("could not signal process: {0}")]
    Signal(String),

    #[error("file watch error: {0}")]
    Watch(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DevloopError {
    /// Exit code `main` uses when this error terminates the supervisor.
    pub fn exit_code(&self) -> i32 {
        match self {
            DevloopError::ProcessFailed(failure) => failure.exit_code(),
            _ => 1,
        }
    }
}

impl From<notify::Error> for DevloopError {
    fn from(err: notify::Error) -> Self {
        DevloopError::Watch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DevloopError>;
