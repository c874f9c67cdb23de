// src/build/mod.rs

//! Build layer.
//!
//! The supervisor only sees the [`Builder`] trait: a first full `build` and
//! an incremental `rebuild`, each resolving to a [`BuildOutcome`]. Building
//! never fails structurally; a broken build is an outcome with
//! `succeeded = false` and error diagnostics.
//!
//! - [`command`] holds [`CommandBuilder`], which shells out to an external
//!   compiler/bundler.
//! - [`diagnostics`] parses compiler stderr into [`Diagnostic`]s.
//! - [`depfile`] reads make-style dependency files.
//!
//! Every source file a build loads is reported through a [`LoadHook`]. The
//! supervisor passes its `WatchedPathSet` here, which is how the watch set
//! grows beyond the configured entry points.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::errors::Result;

pub mod command;
pub mod depfile;
pub mod diagnostics;

pub use command::CommandBuilder;

/// Severity of a single diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Source position a diagnostic refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
    pub column: Option<u32>,
}

/// A single message produced by a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: Option<u32>) -> Self {
        self.location = Some(Location {
            file: file.into(),
            line,
            column,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.location {
            Some(Location {
                file,
                line,
                column: Some(col),
            }) => write!(f, "{}:{line}:{col}: {level}: {}", file.display(), self.message),
            Some(Location { file, line, .. }) => {
                write!(f, "{}:{line}: {level}: {}", file.display(), self.message)
            }
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

/// Result of one build attempt.
///
/// Superseded by the next rebuild's outcome, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub succeeded: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// 0 for the initial build, incremented on every rebuild.
    pub generation: u64,
}

impl BuildOutcome {
    pub fn success(generation: u64) -> Self {
        Self {
            succeeded: true,
            diagnostics: Vec::new(),
            generation,
        }
    }

    pub fn failure(generation: u64, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            succeeded: false,
            diagnostics,
            generation,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

/// Callback invoked synchronously once per source file a build loads.
pub trait LoadHook: Send {
    fn on_load(&mut self, path: &Path) -> Result<()>;
}

pub type BuildFuture<'a> = Pin<Box<dyn Future<Output = BuildOutcome> + Send + 'a>>;

/// Incremental build capability driven by the supervisor.
///
/// Calls are strictly sequential: the supervisor never starts a rebuild
/// before the previous build has resolved.
pub trait Builder: Send {
    /// First, full build.
    fn build<'a>(&'a mut self, hook: &'a mut dyn LoadHook) -> BuildFuture<'a>;

    /// Rebuild after sources may have changed since `previous`.
    fn rebuild<'a>(
        &'a mut self,
        previous: &'a BuildOutcome,
        hook: &'a mut dyn LoadHook,
    ) -> BuildFuture<'a>;
}
