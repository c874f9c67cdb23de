// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::build::{BuildOutcome, Builder};
use crate::errors::{DevloopError, Result};
use crate::exec::{Process, ProcessLauncher};
use crate::watch::{WatchEvent, WatchedPathSet, run_relay};

use super::core::SupervisorCore;
use super::{CoreCommand, SupervisorEvent, SupervisorOptions};

/// Drives the build/run cycle.
///
/// This is the async IO shell around [`SupervisorCore`]: it runs builds,
/// owns the single live process, and multiplexes abort, restart and exit
/// signals into core events. In watch mode it also runs the relay that turns
/// raw watch events into restart signals.
pub struct Supervisor<B: Builder, L: ProcessLauncher> {
    core: SupervisorCore,
    options: SupervisorOptions,
    builder: B,
    launcher: L,
    paths: WatchedPathSet,
    events: Option<mpsc::UnboundedReceiver<WatchEvent>>,
}

impl<B: Builder, L: ProcessLauncher> fmt::Debug for Supervisor<B, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("core", &self.core)
            .field("watched", &self.paths.len())
            .finish_non_exhaustive()
    }
}

/// The live process plus the channel its exit is reported on.
struct Running {
    process: Box<dyn Process>,
    done_rx: mpsc::Receiver<Result<()>>,
}

impl<B: Builder, L: ProcessLauncher> Supervisor<B, L> {
    pub fn new(
        options: SupervisorOptions,
        builder: B,
        launcher: L,
        paths: WatchedPathSet,
    ) -> Self {
        Self {
            core: SupervisorCore::new(options),
            options,
            builder,
            launcher,
            paths,
            events: None,
        }
    }

    /// Raw watch notifications to relay into restarts (watch mode only).
    pub fn with_watch_events(mut self, events: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run until the cycle finishes or `cancel` fires.
    ///
    /// Returns the control loop's result, unless the relay failed, in which
    /// case the relay's error wins since it is what ended the loop.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(watch = self.options.watch, "devloop supervisor started");

        let abort = cancel.child_token();
        let (restart_tx, restart_rx) = mpsc::channel::<()>(1);

        let relay: Option<JoinHandle<Result<()>>> = match self.events.take() {
            Some(events) if self.options.watch => Some(tokio::spawn(run_relay(
                events,
                restart_tx,
                abort.clone(),
                self.options.debounce,
            ))),
            _ => {
                drop(restart_tx);
                None
            }
        };

        let loop_result = self.control_loop(restart_rx, &abort).await;
        abort.cancel();

        if let Some(handle) = relay {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(err),
                Err(join) => {
                    return Err(DevloopError::Other(anyhow!("watch relay panicked: {join}")));
                }
            }
        }

        info!("supervisor exiting");
        loop_result
    }

    async fn control_loop(
        &mut self,
        restart_rx: mpsc::Receiver<()>,
        abort: &CancellationToken,
    ) -> Result<()> {
        let mut restart_rx = Some(restart_rx);
        let mut running: Option<Running> = None;
        let mut pending = VecDeque::from([SupervisorEvent::Begin]);

        loop {
            while let Some(event) = pending.pop_front() {
                debug!(?event, "supervisor event");
                let step = self.core.step(event);

                for command in step.commands {
                    match command {
                        CoreCommand::Build => {
                            let outcome = self.builder.build(&mut self.paths).await;
                            report(&outcome);
                            pending.push_back(SupervisorEvent::BuildFinished(outcome));
                        }
                        CoreCommand::Rebuild => {
                            let outcome = match self.core.outcome() {
                                Some(previous) => {
                                    self.builder.rebuild(previous, &mut self.paths).await
                                }
                                None => self.builder.build(&mut self.paths).await,
                            };
                            report(&outcome);
                            pending.push_back(SupervisorEvent::BuildFinished(outcome));
                        }
                        CoreCommand::StartProcess => {
                            if abort.is_cancelled() {
                                pending.push_back(SupervisorEvent::AbortRequested);
                                continue;
                            }
                            match self.start_process() {
                                Ok(live) => {
                                    running = Some(live);
                                    pending.push_back(SupervisorEvent::ProcessStarted);
                                }
                                Err(err) => {
                                    pending.push_back(SupervisorEvent::ProcessStartFailed(err));
                                }
                            }
                        }
                        CoreCommand::StopProcess => {
                            if let Some(live) = running.take() {
                                stop_and_wait(live, self.options.stop_timeout).await;
                            }
                            pending.push_back(SupervisorEvent::ProcessStopped);
                        }
                        CoreCommand::Finish(result) => return result,
                    }
                }
            }

            let event = tokio::select! {
                biased;

                _ = abort.cancelled() => SupervisorEvent::AbortRequested,

                signal = next_restart(&mut restart_rx) => match signal {
                    Some(()) => {
                        if let Some(rx) = restart_rx.as_mut() {
                            absorb_restarts(rx, self.options.debounce).await;
                        }
                        SupervisorEvent::RestartRequested
                    }
                    None => {
                        debug!("restart channel closed");
                        restart_rx = None;
                        continue;
                    }
                },

                exit = next_exit(&mut running) => {
                    running = None;
                    SupervisorEvent::ProcessExited(exit.unwrap_or_else(|| {
                        Err(DevloopError::Other(anyhow!("lost track of process exit")))
                    }))
                }
            };

            pending.push_back(event);
        }
    }

    fn start_process(&mut self) -> Result<Running> {
        let mut process = self.launcher.create();
        process.start()?;

        let (done_tx, done_rx) = mpsc::channel(1);
        let wait = process.wait();
        tokio::spawn(async move {
            let _ = done_tx.send(wait.await).await;
        });

        Ok(Running { process, done_rx })
    }
}

/// Issue a stop and wait for the exit to be observed.
///
/// A failed stop is logged. The exit is still awaited so the next process is
/// never started next to the old one, but only for `timeout`: a process that
/// could not be signalled must not hold up shutdown.
async fn stop_and_wait(mut live: Running, timeout: Duration) {
    let exit = match live.process.stop() {
        Ok(()) => live.done_rx.recv().await,
        Err(err) => {
            warn!(error = %err, "could not stop process");
            match tokio::time::timeout(timeout, live.done_rx.recv()).await {
                Ok(exit) => exit,
                Err(_) => {
                    warn!(?timeout, "process did not exit after a failed stop; abandoning it");
                    return;
                }
            }
        }
    };
    match exit {
        Some(Ok(())) => debug!("stopped process exited cleanly"),
        Some(Err(err)) => debug!(error = %err, "stopped process exited"),
        None => warn!("lost track of stopped process"),
    }
}

/// Swallow restart signals until `window` passes without one.
async fn absorb_restarts(rx: &mut mpsc::Receiver<()>, window: Duration) {
    loop {
        tokio::select! {
            Some(()) = rx.recv() => debug!("absorbed extra restart signal"),
            _ = tokio::time::sleep(window) => break,
        }
    }
}

async fn next_restart(rx: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_exit(running: &mut Option<Running>) -> Option<Result<()>> {
    match running {
        Some(live) => live.done_rx.recv().await,
        None => std::future::pending().await,
    }
}

fn report(outcome: &BuildOutcome) {
    if outcome.succeeded {
        info!(generation = outcome.generation, "build succeeded");
    } else {
        warn!(
            generation = outcome.generation,
            errors = outcome.error_count(),
            "build failed"
        );
    }
}
