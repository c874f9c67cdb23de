// src/exec/launcher.rs

//! Factories for the process the supervisor runs after each good build.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::process::{CommandProcess, DEFAULT_GRACE_PERIOD, Process, WaitFuture};
use crate::errors::Result;

/// Creates a fresh, not-yet-started [`Process`] for every (re)start.
pub trait ProcessLauncher: Send {
    fn create(&mut self) -> Box<dyn Process>;
}

/// Runs the build artifact, optionally through an interpreter.
///
/// With `runtime = Some("node")` the command is `node <artifact> <args..>`,
/// otherwise `<artifact> <args..>`. Stdio is inherited so the program's
/// output reaches the terminal unmodified.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    artifact: PathBuf,
    runtime: Option<String>,
    args: Vec<String>,
    workdir: PathBuf,
    grace_period: Duration,
}

impl CommandLauncher {
    pub fn new(artifact: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            runtime: None,
            args: Vec::new(),
            workdir: workdir.into(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn runtime(mut self, runtime: Option<String>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

impl ProcessLauncher for CommandLauncher {
    fn create(&mut self) -> Box<dyn Process> {
        let (program, mut cmd) = match &self.runtime {
            Some(runtime) => {
                let mut cmd = Command::new(runtime);
                cmd.arg(&self.artifact);
                (runtime.clone(), cmd)
            }
            None => (
                self.artifact.display().to_string(),
                Command::new(&self.artifact),
            ),
        };

        cmd.args(&self.args)
            .current_dir(&self.workdir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        debug!(%program, args = ?self.args, "prepared process command");

        Box::new(
            CommandProcess::new(program, cmd)
                .with_entry(&self.artifact)
                .with_grace_period(self.grace_period),
        )
    }
}

/// Used by `--build-only`: "running" the artifact prints its path.
#[derive(Debug, Clone)]
pub struct BuildOnlyLauncher {
    artifact: PathBuf,
}

impl BuildOnlyLauncher {
    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
        }
    }
}

impl ProcessLauncher for BuildOnlyLauncher {
    fn create(&mut self) -> Box<dyn Process> {
        Box::new(PrintArtifact {
            artifact: self.artifact.clone(),
        })
    }
}

#[derive(Debug)]
struct PrintArtifact {
    artifact: PathBuf,
}

impl Process for PrintArtifact {
    fn start(&mut self) -> Result<()> {
        println!("{}", self.artifact.display());
        Ok(())
    }

    fn wait(&mut self) -> WaitFuture {
        Box::pin(async { Ok(()) })
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}
