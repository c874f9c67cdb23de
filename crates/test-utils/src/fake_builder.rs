use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use devloop::build::{BuildFuture, BuildOutcome, Builder, Diagnostic, LoadHook};

use crate::recorder::Recorder;

/// A scriptable builder.
///
/// - Each call pops the next scripted result (`true` = success); once the
///   script runs out every build succeeds.
/// - Every build reports `loads` to the hook.
/// - An optional `delay` makes builds take time, for abort-during-build tests.
pub struct FakeBuilder {
    recorder: Recorder,
    script: VecDeque<bool>,
    loads: Vec<PathBuf>,
    delay: Option<Duration>,
}

impl FakeBuilder {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            script: VecDeque::new(),
            loads: Vec::new(),
            delay: None,
        }
    }

    pub fn outcomes(mut self, script: impl IntoIterator<Item = bool>) -> Self {
        self.script = script.into_iter().collect();
        self
    }

    pub fn loads(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.loads = paths.into_iter().collect();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn run(&mut self, generation: u64, hook: &mut dyn LoadHook) -> BuildOutcome {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut diagnostics = Vec::new();
        for path in &self.loads {
            if let Err(err) = hook.on_load(path) {
                diagnostics.push(Diagnostic::error(format!("watching {}: {err}", path.display())));
            }
        }

        let succeeded = self.script.pop_front().unwrap_or(true) && diagnostics.is_empty();
        if succeeded {
            BuildOutcome::success(generation)
        } else {
            if diagnostics.is_empty() {
                diagnostics.push(Diagnostic::error("scripted failure"));
            }
            BuildOutcome::failure(generation, diagnostics)
        }
    }
}

impl Builder for FakeBuilder {
    fn build<'a>(&'a mut self, hook: &'a mut dyn LoadHook) -> BuildFuture<'a> {
        {
            let mut log = self.recorder.lock();
            log.builds += 1;
            log.timeline.push("build 0".to_string());
        }
        Box::pin(self.run(0, hook))
    }

    fn rebuild<'a>(
        &'a mut self,
        previous: &'a BuildOutcome,
        hook: &'a mut dyn LoadHook,
    ) -> BuildFuture<'a> {
        let generation = previous.generation + 1;
        {
            let mut log = self.recorder.lock();
            log.rebuilds += 1;
            log.timeline.push(format!("rebuild {generation}"));
        }
        Box::pin(self.run(generation, hook))
    }
}
