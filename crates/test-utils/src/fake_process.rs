use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use devloop::errors::{DevloopError, ExitFailure, Result};
use devloop::exec::{Process, ProcessLauncher, WaitFuture};

use crate::recorder::Recorder;

/// How a [`FakeProcess`] behaves once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Runs until stopped; then exits with 143 after the stop delay.
    RunUntilStopped,
    /// Exits on its own with `code` after the given time.
    ExitAfter(Duration, i32),
    /// `start` fails with an entry-point error.
    FailStart,
    /// Runs forever; every `stop` fails with a signal error.
    Unstoppable,
}

/// Hands out [`FakeProcess`]es following a script of behaviours.
pub struct FakeLauncher {
    recorder: Recorder,
    script: VecDeque<Behaviour>,
    fallback: Behaviour,
    stop_delay: Duration,
    next_id: usize,
}

impl FakeLauncher {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            script: VecDeque::new(),
            fallback: Behaviour::RunUntilStopped,
            stop_delay: Duration::from_millis(10),
            next_id: 0,
        }
    }

    pub fn script(mut self, behaviours: impl IntoIterator<Item = Behaviour>) -> Self {
        self.script = behaviours.into_iter().collect();
        self
    }

    /// Behaviour once the script is exhausted.
    pub fn fallback(mut self, behaviour: Behaviour) -> Self {
        self.fallback = behaviour;
        self
    }

    /// How long a stopped process takes to actually exit.
    pub fn stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }
}

impl ProcessLauncher for FakeLauncher {
    fn create(&mut self) -> Box<dyn Process> {
        self.next_id += 1;
        self.recorder.lock().created += 1;

        let behaviour = self.script.pop_front().unwrap_or(self.fallback);
        let (exit_tx, exit_rx) = watch::channel(None);
        Box::new(FakeProcess {
            id: self.next_id,
            behaviour,
            stop_delay: self.stop_delay,
            recorder: self.recorder.clone(),
            exit_tx: Arc::new(exit_tx),
            exit_rx,
            started: false,
        })
    }
}

/// In-memory process whose lifecycle is recorded in a [`Recorder`].
pub struct FakeProcess {
    id: usize,
    behaviour: Behaviour,
    stop_delay: Duration,
    recorder: Recorder,
    exit_tx: Arc<watch::Sender<Option<i32>>>,
    exit_rx: watch::Receiver<Option<i32>>,
    started: bool,
}

impl FakeProcess {
    fn exit_later(&self, after: Duration, code: i32) {
        let exit_tx = Arc::clone(&self.exit_tx);
        let recorder = self.recorder.clone();
        let id = self.id;
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            exit_tx.send_if_modified(|exit| {
                if exit.is_some() {
                    return false;
                }
                recorder.process_exited(id);
                *exit = Some(code);
                true
            });
        });
    }
}

impl Process for FakeProcess {
    fn start(&mut self) -> Result<()> {
        if self.behaviour == Behaviour::FailStart {
            self.recorder.push(format!("start-failed {}", self.id));
            return Err(DevloopError::EntryPointMissing {
                artifact: format!("fake-{}", self.id),
            });
        }

        self.started = true;
        self.recorder.process_started(self.id);
        if let Behaviour::ExitAfter(after, code) = self.behaviour {
            self.exit_later(after, code);
        }
        Ok(())
    }

    fn wait(&mut self) -> WaitFuture {
        if !self.started {
            return Box::pin(async { Ok(()) });
        }
        let mut exit_rx = self.exit_rx.clone();
        Box::pin(async move {
            let code = match exit_rx.wait_for(|exit| exit.is_some()).await {
                Ok(exit) => (*exit).unwrap_or(0),
                Err(_) => 0,
            };
            match code {
                0 => Ok(()),
                code => Err(DevloopError::ProcessFailed(ExitFailure::Code(code))),
            }
        })
    }

    fn stop(&mut self) -> Result<()> {
        if !self.started || self.exit_rx.borrow().is_some() {
            return Ok(());
        }
        if self.behaviour == Behaviour::Unstoppable {
            self.recorder.push(format!("stop-failed {}", self.id));
            return Err(DevloopError::Signal(format!(
                "SIGTERM to process group {}: EPERM",
                self.id
            )));
        }
        {
            let mut log = self.recorder.lock();
            log.stop_requests += 1;
            log.timeline.push(format!("stop {}", self.id));
        }
        self.exit_later(self.stop_delay, 143);
        Ok(())
    }
}
