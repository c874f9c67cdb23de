// tests/supervisor_watch.rs

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use devloop::engine::{Supervisor, SupervisorOptions};
use devloop::errors::{DevloopError, Result};
use devloop::watch::{WatchEvent, WatchedPathSet};
use devloop_test_utils::{
    Behaviour, FakeBuilder, FakeLauncher, Recorder, RecordingRegistry, init_tracing,
    with_timeout,
};

type TestResult = std::result::Result<(), Box<dyn Error>>;

struct Harness {
    recorder: Recorder,
    events: mpsc::UnboundedSender<WatchEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl Harness {
    fn spawn(recorder: Recorder, builder: FakeBuilder, launcher: FakeLauncher) -> Self {
        Self::spawn_with_paths(recorder, builder, launcher, WatchedPathSet::unwatched())
    }

    fn spawn_with_paths(
        recorder: Recorder,
        builder: FakeBuilder,
        launcher: FakeLauncher,
        paths: WatchedPathSet,
    ) -> Self {
        let (events, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let supervisor = Supervisor::new(SupervisorOptions::watch(), builder, launcher, paths)
            .with_watch_events(event_rx);
        let handle = tokio::spawn(supervisor.run(cancel.clone()));
        Self {
            recorder,
            events,
            cancel,
            handle,
        }
    }

    fn change(&self, name: &str) {
        self.events
            .send(WatchEvent::Changed(PathBuf::from(name)))
            .expect("relay should be listening");
    }

    async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        with_timeout(self.handle).await.expect("supervisor task panicked")
    }
}

fn recorder_pair() -> (Recorder, FakeBuilder, FakeLauncher) {
    let recorder = Recorder::new();
    let builder = FakeBuilder::new(recorder.clone());
    let launcher = FakeLauncher::new(recorder.clone());
    (recorder, builder, launcher)
}

#[tokio::test]
async fn change_restarts_running_process() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    let h = Harness::spawn(recorder.clone(), builder, launcher);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.timeline(), vec!["build 0", "start 1"]);

    h.change("src/main.rs");
    sleep(Duration::from_millis(250)).await;
    assert_eq!(
        recorder.timeline(),
        vec!["build 0", "start 1", "stop 1", "exit 1", "rebuild 1", "start 2"]
    );

    h.shutdown().await?;
    assert_eq!(
        recorder.timeline()[6..].to_vec(),
        vec!["stop 2".to_string(), "exit 2".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn failed_build_waits_for_change() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    let h = Harness::spawn(recorder.clone(), builder.outcomes([false, true]), launcher);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.timeline(), vec!["build 0"]);
    assert_eq!(recorder.snapshot().created, 0);

    h.change("src/lib.rs");
    sleep(Duration::from_millis(200)).await;
    assert_eq!(recorder.timeline(), vec!["build 0", "rebuild 1", "start 1"]);

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn failed_rebuild_leaves_nothing_running() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    let h = Harness::spawn(recorder.clone(), builder.outcomes([true, false]), launcher);

    sleep(Duration::from_millis(50)).await;
    h.change("a.rs");
    sleep(Duration::from_millis(200)).await;
    assert_eq!(
        recorder.timeline(),
        vec!["build 0", "start 1", "stop 1", "exit 1", "rebuild 1"]
    );
    assert_eq!(recorder.snapshot().live, 0);

    h.change("a.rs");
    sleep(Duration::from_millis(200)).await;
    assert_eq!(
        recorder.timeline()[5..].to_vec(),
        vec!["rebuild 2".to_string(), "start 2".to_string()]
    );

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn burst_of_changes_rebuilds_once() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    let h = Harness::spawn(recorder.clone(), builder, launcher);

    sleep(Duration::from_millis(50)).await;
    for name in ["a.rs", "b.rs", "c.rs", "a.rs", "d.rs"] {
        h.change(name);
        sleep(Duration::from_millis(5)).await;
    }
    sleep(Duration::from_millis(300)).await;

    let log = recorder.snapshot();
    assert_eq!(log.rebuilds, 1);
    assert_eq!(log.started, 2);

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn exited_process_is_not_restarted_without_change() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    let launcher = launcher.script([Behaviour::ExitAfter(Duration::from_millis(20), 1)]);
    let h = Harness::spawn(recorder.clone(), builder, launcher);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(recorder.timeline(), vec!["build 0", "start 1", "exit 1"]);
    assert_eq!(recorder.snapshot().rebuilds, 0);

    h.change("main.rs");
    sleep(Duration::from_millis(200)).await;
    assert_eq!(
        recorder.timeline()[3..].to_vec(),
        vec!["rebuild 1".to_string(), "start 2".to_string()]
    );

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn start_failure_in_watch_mode_waits_for_change() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    let launcher = launcher.script([Behaviour::FailStart]);
    let h = Harness::spawn(recorder.clone(), builder, launcher);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.timeline(), vec!["build 0", "start-failed 1"]);

    h.change("main.rs");
    sleep(Duration::from_millis(200)).await;
    assert_eq!(recorder.snapshot().live, 1);

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn never_more_than_one_live_process() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    // Slow exits widen the window in which an overlap could happen.
    let launcher = launcher.stop_delay(Duration::from_millis(40));
    let h = Harness::spawn(recorder.clone(), builder, launcher);

    sleep(Duration::from_millis(50)).await;
    for _ in 0..5 {
        h.change("main.rs");
        sleep(Duration::from_millis(150)).await;
    }

    h.shutdown().await?;
    let log = recorder.snapshot();
    assert_eq!(log.started, 6);
    assert_eq!(log.max_live, 1);
    assert_eq!(log.live, 0);
    Ok(())
}

#[tokio::test]
async fn watcher_error_stops_process_and_is_returned() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    let h = Harness::spawn(recorder.clone(), builder, launcher);

    sleep(Duration::from_millis(50)).await;
    h.events.send(WatchEvent::Error("too many open files".into()))?;

    let res = with_timeout(h.handle).await?;
    assert!(matches!(res, Err(DevloopError::Watch(ref reason)) if reason.contains("open files")));
    assert_eq!(
        recorder.timeline(),
        vec!["build 0", "start 1", "stop 1", "exit 1"]
    );
    Ok(())
}

#[tokio::test]
async fn closed_event_stream_keeps_supervisor_alive() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    let h = Harness::spawn(recorder.clone(), builder, launcher);

    sleep(Duration::from_millis(50)).await;
    let Harness {
        recorder: _,
        events,
        cancel,
        handle,
    } = h;
    drop(events);

    sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());
    assert_eq!(recorder.snapshot().live, 1);

    cancel.cancel();
    with_timeout(handle).await??;
    assert_eq!(recorder.snapshot().live, 0);
    Ok(())
}

#[tokio::test]
async fn builds_grow_the_watched_set_once() -> TestResult {
    init_tracing();
    let (recorder, builder, launcher) = recorder_pair();
    let builder = builder.loads([
        PathBuf::from("/project/src/main.js"),
        PathBuf::from("/project/src/util.js"),
    ]);
    let registry = RecordingRegistry::new(recorder.clone());
    let mut paths = WatchedPathSet::with_registry(Box::new(registry));
    paths.seed(&[PathBuf::from("/project/src/main.js")])?;

    let h = Harness::spawn_with_paths(recorder.clone(), builder, launcher, paths);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(
        recorder.timeline(),
        vec![
            "watch /project/src/main.js",
            "build 0",
            "watch /project/src/util.js",
            "start 1",
        ]
    );

    h.change("/project/src/util.js");
    sleep(Duration::from_millis(250)).await;
    h.change("/project/src/main.js");
    sleep(Duration::from_millis(250)).await;
    h.shutdown().await?;

    let timeline = recorder.timeline();
    let watches: Vec<&String> = timeline.iter().filter(|e| e.starts_with("watch ")).collect();
    assert_eq!(
        watches,
        vec!["watch /project/src/main.js", "watch /project/src/util.js"]
    );
    assert_eq!(recorder.snapshot().rebuilds, 2);
    Ok(())
}
