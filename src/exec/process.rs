// src/exec/process.rs

//! Child process lifecycle: start, wait, and two-phase stop.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::errors::{DevloopError, ExitFailure, Result};

/// Default time a process gets to exit after the graceful signal.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Future returned by [`Process::wait`]; detached from the handle so it can
/// run on its own task.
pub type WaitFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Lifecycle of a single process handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Stopping,
    Exited,
}

/// One supervised child process.
///
/// The supervisor owns at most one of these at a time and always issues
/// `stop` and observes `wait` before creating the next.
pub trait Process: Send {
    /// Create the OS process.
    fn start(&mut self) -> Result<()>;

    /// Resolve once the process has exited.
    ///
    /// Resolves to `Ok(())` immediately if the process was never started, and
    /// to [`DevloopError::ProcessFailed`] on a non-zero or abnormal exit.
    fn wait(&mut self) -> WaitFuture;

    /// Ask the process to terminate.
    ///
    /// Returns once the request has been issued, not once the process is
    /// gone; callers `wait` for that. Stopping a process that never started
    /// or already exited succeeds.
    fn stop(&mut self) -> Result<()>;
}

/// How the reaper saw the child end.
#[derive(Debug, Clone)]
enum Exit {
    Status(ExitStatus),
    WaitFailed(String),
}

/// [`Process`] over a `tokio::process::Command`.
///
/// On unix the child runs in its own process group. `stop` sends SIGTERM to
/// the group and arms a timer that sends SIGKILL to the group after the
/// grace period. Elsewhere `stop` kills the single process immediately.
pub struct CommandProcess {
    program: String,
    command: Option<Command>,
    entry: Option<PathBuf>,
    grace_period: Duration,
    state: ProcessState,
    pid: Option<u32>,
    exit_rx: Option<watch::Receiver<Option<Exit>>>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl fmt::Debug for CommandProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandProcess")
            .field("program", &self.program)
            .field("state", &self.state)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl CommandProcess {
    pub fn new(program: impl Into<String>, command: Command) -> Self {
        Self {
            program: program.into(),
            command: Some(command),
            entry: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            state: ProcessState::NotStarted,
            pid: None,
            exit_rx: None,
            kill_tx: None,
        }
    }

    /// Require `entry` to exist as a file before starting.
    pub fn with_entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn state(&mut self) -> ProcessState {
        if self.has_exited() {
            self.state = ProcessState::Exited;
        }
        self.state
    }

    fn has_exited(&self) -> bool {
        self.exit_rx
            .as_ref()
            .is_some_and(|rx| rx.borrow().is_some())
    }

    #[cfg(unix)]
    fn signal_stop(&mut self, pid: u32) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let pgid = Pid::from_raw(pid as i32);
        match killpg(pgid, Signal::SIGTERM) {
            Ok(()) => debug!(pid, "sent SIGTERM to process group"),
            Err(Errno::ESRCH) => {
                debug!(pid, "process group already gone");
                return Ok(());
            }
            Err(err) => {
                // Without SIGTERM there is no escalation either; kill the
                // direct child so the reaper still reports an exit.
                if let Some(kill_tx) = self.kill_tx.take() {
                    let _ = kill_tx.send(());
                }
                return Err(DevloopError::Signal(format!(
                    "SIGTERM to process group {pid}: {err}; killed process {pid} instead"
                )));
            }
        }

        // Arm the escalation once; later stops only resend SIGTERM.
        if let (Some(kill_tx), Some(mut exit_rx)) = (self.kill_tx.take(), self.exit_rx.clone()) {
            let grace = self.grace_period;
            tokio::spawn(async move {
                tokio::select! {
                    _ = exit_rx.wait_for(|exit| exit.is_some()) => {}
                    _ = tokio::time::sleep(grace) => {
                        warn!(pid, ?grace, "process did not exit within grace period; sending SIGKILL");
                        if let Err(err) = killpg(pgid, Signal::SIGKILL) {
                            if err != Errno::ESRCH {
                                warn!(pid, error = %err, "SIGKILL to process group failed; killing process only");
                                let _ = kill_tx.send(());
                            }
                        }
                    }
                }
            });
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn signal_stop(&mut self, pid: u32) -> Result<()> {
        match self.kill_tx.take() {
            Some(kill_tx) => {
                debug!(pid, "killing process");
                kill_tx
                    .send(())
                    .map_err(|_| DevloopError::Signal(format!("process {pid} already reaped")))
            }
            None => Ok(()),
        }
    }
}

impl Process for CommandProcess {
    fn start(&mut self) -> Result<()> {
        if let Some(entry) = &self.entry {
            if !entry.is_file() {
                return Err(DevloopError::EntryPointMissing {
                    artifact: entry.display().to_string(),
                });
            }
        }

        let mut command = self.command.take().ok_or_else(|| {
            DevloopError::Other(anyhow::anyhow!("process {} already started", self.program))
        })?;

        #[cfg(unix)]
        command.process_group(0);
        command.kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| DevloopError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let pid = child.id();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        // The reaper owns the child; kill_on_drop covers runtime shutdown.
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = kill_rx => {
                    if let Err(err) = child.start_kill() {
                        warn!(error = %err, "failed to kill child process");
                    }
                    child.wait().await
                }
            };
            let exit = match status {
                Ok(status) => Exit::Status(status),
                Err(err) => Exit::WaitFailed(err.to_string()),
            };
            let _ = exit_tx.send(Some(exit));
        });

        info!(program = %self.program, pid, "process started");
        self.pid = pid;
        self.exit_rx = Some(exit_rx);
        self.kill_tx = Some(kill_tx);
        self.state = ProcessState::Running;
        Ok(())
    }

    fn wait(&mut self) -> WaitFuture {
        let Some(mut exit_rx) = self.exit_rx.clone() else {
            return Box::pin(async { Ok(()) });
        };
        let program = self.program.clone();

        Box::pin(async move {
            let exit = match exit_rx.wait_for(|exit| exit.is_some()).await {
                Ok(exit) => (*exit).clone(),
                Err(_) => None,
            };
            match exit {
                Some(Exit::Status(status)) => exit_result(&program, status),
                Some(Exit::WaitFailed(err)) => Err(DevloopError::Other(anyhow::anyhow!(
                    "waiting for {program}: {err}"
                ))),
                None => Err(DevloopError::Other(anyhow::anyhow!(
                    "reaper for {program} vanished"
                ))),
            }
        })
    }

    fn stop(&mut self) -> Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        if self.has_exited() {
            self.state = ProcessState::Exited;
            return Ok(());
        }

        info!(program = %self.program, pid, "stopping process");
        self.state = ProcessState::Stopping;
        self.signal_stop(pid)
    }
}

fn exit_result(program: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        debug!(program, "process exited successfully");
        return Ok(());
    }

    if let Some(code) = status.code() {
        return Err(DevloopError::ProcessFailed(ExitFailure::Code(code)));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return Err(DevloopError::ProcessFailed(ExitFailure::Signaled(sig)));
        }
    }

    Err(DevloopError::ProcessFailed(ExitFailure::Code(1)))
}
