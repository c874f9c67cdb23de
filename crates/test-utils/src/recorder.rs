use std::sync::{Arc, Mutex, MutexGuard};

/// Everything the fakes observed, in one place so tests can assert ordering
/// across builds and processes.
#[derive(Debug, Default, Clone)]
pub struct Log {
    /// e.g. `["build 0", "start 1", "stop 1", "exit 1", "rebuild 1", ...]`.
    pub timeline: Vec<String>,
    pub builds: usize,
    pub rebuilds: usize,
    pub created: usize,
    pub started: usize,
    pub stop_requests: usize,
    pub live: usize,
    pub max_live: usize,
}

/// Shared, cloneable handle to a [`Log`].
#[derive(Debug, Default, Clone)]
pub struct Recorder(Arc<Mutex<Log>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, Log> {
        self.0.lock().expect("recorder lock poisoned")
    }

    pub fn snapshot(&self) -> Log {
        self.lock().clone()
    }

    pub fn timeline(&self) -> Vec<String> {
        self.lock().timeline.clone()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.lock().timeline.push(entry.into());
    }

    pub(crate) fn process_started(&self, id: usize) {
        let mut log = self.lock();
        log.started += 1;
        log.live += 1;
        log.max_live = log.max_live.max(log.live);
        log.timeline.push(format!("start {id}"));
    }

    pub(crate) fn process_exited(&self, id: usize) {
        let mut log = self.lock();
        log.live = log.live.saturating_sub(1);
        log.timeline.push(format!("exit {id}"));
    }
}
