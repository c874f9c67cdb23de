use std::path::Path;

use devloop::errors::Result;
use devloop::watch::WatchRegistry;

use crate::recorder::Recorder;

/// [`WatchRegistry`] that records every registration as `"watch <path>"`
/// on the shared timeline.
#[derive(Debug, Clone)]
pub struct RecordingRegistry {
    recorder: Recorder,
}

impl RecordingRegistry {
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

impl WatchRegistry for RecordingRegistry {
    fn watch(&mut self, path: &Path) -> Result<()> {
        self.recorder.push(format!("watch {}", path.display()));
        Ok(())
    }
}
