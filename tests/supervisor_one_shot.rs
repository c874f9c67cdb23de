// tests/supervisor_one_shot.rs

use std::error::Error;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use devloop::engine::{Supervisor, SupervisorOptions};
use devloop::errors::{DevloopError, ExitFailure};
use devloop::watch::WatchedPathSet;
use devloop_test_utils::{
    Behaviour, FakeBuilder, FakeLauncher, Recorder, init_tracing, with_timeout,
};

type TestResult = Result<(), Box<dyn Error>>;

fn supervisor(builder: FakeBuilder, launcher: FakeLauncher) -> Supervisor<FakeBuilder, FakeLauncher> {
    Supervisor::new(
        SupervisorOptions::one_shot(),
        builder,
        launcher,
        WatchedPathSet::unwatched(),
    )
}

#[tokio::test]
async fn successful_run_exits_cleanly() -> TestResult {
    init_tracing();
    let recorder = Recorder::new();
    let builder = FakeBuilder::new(recorder.clone());
    let launcher = FakeLauncher::new(recorder.clone())
        .script([Behaviour::ExitAfter(Duration::from_millis(20), 0)]);

    with_timeout(supervisor(builder, launcher).run(CancellationToken::new())).await?;

    assert_eq!(recorder.timeline(), vec!["build 0", "start 1", "exit 1"]);
    let log = recorder.snapshot();
    assert_eq!(log.rebuilds, 0);
    assert_eq!(log.stop_requests, 0);
    Ok(())
}

#[tokio::test]
async fn failed_build_never_starts_a_process() -> TestResult {
    init_tracing();
    let recorder = Recorder::new();
    let builder = FakeBuilder::new(recorder.clone()).outcomes([false]);
    let launcher = FakeLauncher::new(recorder.clone());

    let err = with_timeout(supervisor(builder, launcher).run(CancellationToken::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, DevloopError::BuildFailed));
    assert_eq!(err.to_string(), "build error");
    assert_eq!(err.exit_code(), 1);
    assert_eq!(recorder.snapshot().created, 0);
    Ok(())
}

#[tokio::test]
async fn process_exit_code_is_propagated() -> TestResult {
    init_tracing();
    let recorder = Recorder::new();
    let builder = FakeBuilder::new(recorder.clone());
    let launcher = FakeLauncher::new(recorder.clone())
        .script([Behaviour::ExitAfter(Duration::from_millis(5), 3)]);

    let err = with_timeout(supervisor(builder, launcher).run(CancellationToken::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, DevloopError::ProcessFailed(ExitFailure::Code(3))));
    assert_eq!(err.exit_code(), 3);
    Ok(())
}

#[tokio::test]
async fn start_failure_is_terminal() -> TestResult {
    init_tracing();
    let recorder = Recorder::new();
    let builder = FakeBuilder::new(recorder.clone());
    let launcher = FakeLauncher::new(recorder.clone()).script([Behaviour::FailStart]);

    let err = with_timeout(supervisor(builder, launcher).run(CancellationToken::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, DevloopError::EntryPointMissing { .. }));
    assert_eq!(recorder.timeline(), vec!["build 0", "start-failed 1"]);
    Ok(())
}

#[tokio::test]
async fn cancellation_stops_the_process_and_succeeds() -> TestResult {
    init_tracing();
    let recorder = Recorder::new();
    let builder = FakeBuilder::new(recorder.clone());
    let launcher = FakeLauncher::new(recorder.clone());
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(supervisor(builder, launcher).run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.snapshot().live, 1);

    cancel.cancel();
    with_timeout(handle).await??;

    assert_eq!(recorder.timeline(), vec!["build 0", "start 1", "stop 1", "exit 1"]);
    assert_eq!(recorder.snapshot().live, 0);
    Ok(())
}

#[tokio::test]
async fn cancellation_during_build_never_starts() -> TestResult {
    init_tracing();
    let recorder = Recorder::new();
    let builder = FakeBuilder::new(recorder.clone()).delay(Duration::from_millis(100));
    let launcher = FakeLauncher::new(recorder.clone());
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(supervisor(builder, launcher).run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    with_timeout(handle).await??;
    assert_eq!(recorder.snapshot().started, 0);
    Ok(())
}

#[tokio::test]
async fn failed_stop_does_not_block_shutdown() -> TestResult {
    init_tracing();
    let recorder = Recorder::new();
    let builder = FakeBuilder::new(recorder.clone());
    let launcher = FakeLauncher::new(recorder.clone()).script([Behaviour::Unstoppable]);
    let options = SupervisorOptions {
        stop_timeout: Duration::from_millis(100),
        ..SupervisorOptions::one_shot()
    };
    let cancel = CancellationToken::new();

    let sup = Supervisor::new(options, builder, launcher, WatchedPathSet::unwatched());
    let handle = tokio::spawn(sup.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.snapshot().live, 1);

    cancel.cancel();
    with_timeout(handle).await??;

    assert_eq!(recorder.timeline(), vec!["build 0", "start 1", "stop-failed 1"]);
    Ok(())
}
