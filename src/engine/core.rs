// src/engine/core.rs

//! Pure supervisor state machine.
//!
//! [`SupervisorCore`] consumes [`SupervisorEvent`]s and answers with
//! [`CoreCommand`]s for the IO shell (`engine::runtime::Supervisor`) to
//! execute. It owns no channels, processes or builders, so every transition
//! can be unit tested synchronously.
//!
//! The shell guarantees that a start attempt or build is never interrupted:
//! events are fed strictly one at a time, in the order the shell observed
//! them.

use tracing::{debug, info, warn};

use crate::build::BuildOutcome;
use crate::errors::{DevloopError, Result};
use crate::engine::{
    AfterStop, CoreCommand, CoreStep, SupervisorEvent, SupervisorOptions, SupervisorState,
};

#[derive(Debug)]
pub struct SupervisorCore {
    options: SupervisorOptions,
    state: SupervisorState,
    after_stop: Option<AfterStop>,
    aborted: bool,
    outcome: Option<BuildOutcome>,
}

impl SupervisorCore {
    pub fn new(options: SupervisorOptions) -> Self {
        Self {
            options,
            state: SupervisorState::Idle,
            after_stop: None,
            aborted: false,
            outcome: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SupervisorState::Terminated
    }

    /// Latest build outcome, the input to the next rebuild.
    pub fn outcome(&self) -> Option<&BuildOutcome> {
        self.outcome.as_ref()
    }

    /// Handle a single event, returning what the shell should do next.
    pub fn step(&mut self, event: SupervisorEvent) -> CoreStep {
        if self.is_terminated() {
            debug!(?event, "supervisor terminated; ignoring event");
            return CoreStep::none();
        }

        match event {
            SupervisorEvent::Begin => self.on_begin(),
            SupervisorEvent::BuildFinished(outcome) => self.on_build_finished(outcome),
            SupervisorEvent::ProcessStarted => self.on_started(),
            SupervisorEvent::ProcessStartFailed(err) => self.on_start_failed(err),
            SupervisorEvent::ProcessExited(result) => self.on_exited(result),
            SupervisorEvent::RestartRequested => self.on_restart(),
            SupervisorEvent::AbortRequested => self.on_abort(),
            SupervisorEvent::ProcessStopped => self.on_stopped(),
        }
    }

    fn on_begin(&mut self) -> CoreStep {
        if self.state != SupervisorState::Idle {
            return CoreStep::none();
        }
        self.state = SupervisorState::Starting;
        CoreStep::one(CoreCommand::Build)
    }

    fn on_build_finished(&mut self, outcome: BuildOutcome) -> CoreStep {
        let succeeded = outcome.succeeded;
        let generation = outcome.generation;
        self.outcome = Some(outcome);

        if self.aborted {
            return self.terminate(Ok(()));
        }

        if succeeded {
            debug!(generation, "build succeeded; starting process");
            return CoreStep::one(CoreCommand::StartProcess);
        }

        if !self.options.watch {
            return self.terminate(Err(DevloopError::BuildFailed));
        }

        warn!(generation, "build failed; waiting for changes");
        self.state = SupervisorState::WaitingForChange;
        CoreStep::none()
    }

    fn on_started(&mut self) -> CoreStep {
        if self.state == SupervisorState::Starting {
            self.state = SupervisorState::RunningProcess;
        }
        CoreStep::none()
    }

    fn on_start_failed(&mut self, err: DevloopError) -> CoreStep {
        if !self.options.watch {
            return self.terminate(Err(err));
        }
        warn!(error = %err, "could not start; waiting for changes");
        self.state = SupervisorState::WaitingForChange;
        CoreStep::none()
    }

    fn on_exited(&mut self, result: Result<()>) -> CoreStep {
        if self.state != SupervisorState::RunningProcess {
            debug!(state = ?self.state, "process exit outside of running state; ignoring");
            return CoreStep::none();
        }

        if !self.options.watch {
            return self.terminate(result);
        }

        match result {
            Ok(()) => info!("process finished"),
            Err(err) => warn!(error = %err, "process failure"),
        }
        self.state = SupervisorState::WaitingForChange;
        CoreStep::none()
    }

    fn on_restart(&mut self) -> CoreStep {
        if !self.options.watch || self.aborted {
            return CoreStep::none();
        }

        match self.state {
            SupervisorState::RunningProcess => {
                info!("sources changed; restarting");
                self.state = SupervisorState::Stopping;
                self.after_stop = Some(AfterStop::Rebuild);
                CoreStep::one(CoreCommand::StopProcess)
            }
            SupervisorState::WaitingForChange => {
                info!("sources changed; rebuilding");
                self.state = SupervisorState::Starting;
                CoreStep::one(CoreCommand::Rebuild)
            }
            // Picked up again at the next select.
            _ => CoreStep::none(),
        }
    }

    fn on_abort(&mut self) -> CoreStep {
        self.aborted = true;

        match self.state {
            SupervisorState::RunningProcess => {
                info!("shutting down; stopping process");
                self.state = SupervisorState::Stopping;
                self.after_stop = Some(AfterStop::Terminate);
                CoreStep::one(CoreCommand::StopProcess)
            }
            SupervisorState::Stopping => {
                self.after_stop = Some(AfterStop::Terminate);
                CoreStep::none()
            }
            _ => self.terminate(Ok(())),
        }
    }

    fn on_stopped(&mut self) -> CoreStep {
        if self.state != SupervisorState::Stopping {
            return CoreStep::none();
        }

        match self.after_stop.take() {
            Some(AfterStop::Rebuild) if !self.aborted => {
                self.state = SupervisorState::Starting;
                CoreStep::one(CoreCommand::Rebuild)
            }
            _ => self.terminate(Ok(())),
        }
    }

    fn terminate(&mut self, result: Result<()>) -> CoreStep {
        match &result {
            Ok(()) => info!("supervisor finished"),
            Err(err) => info!(error = %err, "supervisor finished with error"),
        }
        self.state = SupervisorState::Terminated;
        CoreStep::one(CoreCommand::Finish(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::Diagnostic;
    use crate::errors::ExitFailure;

    fn ok_build(generation: u64) -> SupervisorEvent {
        SupervisorEvent::BuildFinished(BuildOutcome::success(generation))
    }

    fn bad_build(generation: u64) -> SupervisorEvent {
        SupervisorEvent::BuildFinished(BuildOutcome::failure(
            generation,
            vec![Diagnostic::error("boom")],
        ))
    }

    fn only(step: CoreStep) -> CoreCommand {
        let mut commands = step.commands;
        assert_eq!(commands.len(), 1, "expected exactly one command: {commands:?}");
        commands.remove(0)
    }

    fn running(options: SupervisorOptions) -> SupervisorCore {
        let mut core = SupervisorCore::new(options);
        assert!(matches!(only(core.step(SupervisorEvent::Begin)), CoreCommand::Build));
        assert!(matches!(only(core.step(ok_build(0))), CoreCommand::StartProcess));
        assert!(core.step(SupervisorEvent::ProcessStarted).commands.is_empty());
        assert_eq!(core.state(), SupervisorState::RunningProcess);
        core
    }

    #[test]
    fn one_shot_build_failure_is_terminal() {
        let mut core = SupervisorCore::new(SupervisorOptions::one_shot());
        core.step(SupervisorEvent::Begin);

        match only(core.step(bad_build(0))) {
            CoreCommand::Finish(Err(DevloopError::BuildFailed)) => {}
            other => panic!("expected build error, got {other:?}"),
        }
        assert!(core.is_terminated());
    }

    #[test]
    fn watch_build_failure_waits_then_rebuilds() {
        let mut core = SupervisorCore::new(SupervisorOptions::watch());
        core.step(SupervisorEvent::Begin);

        assert!(core.step(bad_build(0)).commands.is_empty());
        assert_eq!(core.state(), SupervisorState::WaitingForChange);

        assert!(matches!(
            only(core.step(SupervisorEvent::RestartRequested)),
            CoreCommand::Rebuild
        ));
        assert_eq!(core.state(), SupervisorState::Starting);
        assert_eq!(core.outcome().map(|o| o.generation), Some(0));
    }

    #[test]
    fn one_shot_propagates_exit_result() {
        let mut core = running(SupervisorOptions::one_shot());

        let cmd = only(core.step(SupervisorEvent::ProcessExited(Err(
            DevloopError::ProcessFailed(ExitFailure::Code(7)),
        ))));
        match cmd {
            CoreCommand::Finish(Err(err)) => assert_eq!(err.exit_code(), 7),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn one_shot_start_failure_is_terminal() {
        let mut core = SupervisorCore::new(SupervisorOptions::one_shot());
        core.step(SupervisorEvent::Begin);
        core.step(ok_build(0));

        let cmd = only(core.step(SupervisorEvent::ProcessStartFailed(
            DevloopError::EntryPointMissing {
                artifact: "app".into(),
            },
        )));
        assert!(matches!(
            cmd,
            CoreCommand::Finish(Err(DevloopError::EntryPointMissing { .. }))
        ));
    }

    #[test]
    fn watch_start_failure_waits_for_change() {
        let mut core = SupervisorCore::new(SupervisorOptions::watch());
        core.step(SupervisorEvent::Begin);
        core.step(ok_build(0));

        let step = core.step(SupervisorEvent::ProcessStartFailed(DevloopError::BuildFailed));
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), SupervisorState::WaitingForChange);
    }

    #[test]
    fn watch_exit_does_not_rebuild() {
        let mut core = running(SupervisorOptions::watch());

        let step = core.step(SupervisorEvent::ProcessExited(Err(DevloopError::ProcessFailed(
            ExitFailure::Code(1),
        ))));
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), SupervisorState::WaitingForChange);
    }

    #[test]
    fn restart_stops_then_rebuilds_then_starts() {
        let mut core = running(SupervisorOptions::watch());

        assert!(matches!(
            only(core.step(SupervisorEvent::RestartRequested)),
            CoreCommand::StopProcess
        ));
        assert_eq!(core.state(), SupervisorState::Stopping);

        assert!(matches!(
            only(core.step(SupervisorEvent::ProcessStopped)),
            CoreCommand::Rebuild
        ));
        assert!(matches!(only(core.step(ok_build(1))), CoreCommand::StartProcess));
        core.step(SupervisorEvent::ProcessStarted);
        assert_eq!(core.state(), SupervisorState::RunningProcess);
    }

    #[test]
    fn restart_is_ignored_in_one_shot_mode() {
        let mut core = running(SupervisorOptions::one_shot());
        assert!(core.step(SupervisorEvent::RestartRequested).commands.is_empty());
        assert_eq!(core.state(), SupervisorState::RunningProcess);
    }

    #[test]
    fn abort_while_running_stops_then_finishes_ok() {
        let mut core = running(SupervisorOptions::watch());

        assert!(matches!(
            only(core.step(SupervisorEvent::AbortRequested)),
            CoreCommand::StopProcess
        ));
        assert!(matches!(
            only(core.step(SupervisorEvent::ProcessStopped)),
            CoreCommand::Finish(Ok(()))
        ));
        assert!(core.is_terminated());
    }

    #[test]
    fn abort_during_restart_stop_wins() {
        let mut core = running(SupervisorOptions::watch());
        core.step(SupervisorEvent::RestartRequested);
        core.step(SupervisorEvent::AbortRequested);

        assert!(matches!(
            only(core.step(SupervisorEvent::ProcessStopped)),
            CoreCommand::Finish(Ok(()))
        ));
    }

    #[test]
    fn abort_while_building_never_starts() {
        let mut core = SupervisorCore::new(SupervisorOptions::watch());
        core.step(SupervisorEvent::Begin);

        assert!(matches!(
            only(core.step(SupervisorEvent::AbortRequested)),
            CoreCommand::Finish(Ok(()))
        ));
        assert!(core.step(ok_build(0)).commands.is_empty());
    }

    #[test]
    fn abort_while_waiting_finishes_ok() {
        let mut core = SupervisorCore::new(SupervisorOptions::watch());
        core.step(SupervisorEvent::Begin);
        core.step(bad_build(0));

        assert!(matches!(
            only(core.step(SupervisorEvent::AbortRequested)),
            CoreCommand::Finish(Ok(()))
        ));
    }

    #[test]
    fn terminated_core_ignores_everything() {
        let mut core = SupervisorCore::new(SupervisorOptions::one_shot());
        core.step(SupervisorEvent::Begin);
        core.step(bad_build(0));

        assert!(core.step(SupervisorEvent::RestartRequested).commands.is_empty());
        assert!(core.step(SupervisorEvent::AbortRequested).commands.is_empty());
        assert!(core.step(SupervisorEvent::Begin).commands.is_empty());
    }
}
