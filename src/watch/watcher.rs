// src/watch/watcher.rs

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{DevloopError, Result};
use crate::watch::paths::WatchRegistry;

/// A single notification from the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A watched path changed (written, created, removed, renamed).
    Changed(PathBuf),
    /// The notification source failed; watching can no longer be trusted.
    Error(String),
}

/// Paths the callback lets through.
#[derive(Debug, Default)]
struct Interest {
    files: HashSet<PathBuf>,
    dirs: HashSet<PathBuf>,
}

impl Interest {
    fn wants(&self, path: &Path) -> bool {
        if self.files.contains(path) || self.dirs.contains(path) {
            return true;
        }
        path.parent().is_some_and(|parent| self.dirs.contains(parent))
    }
}

/// `notify`-backed notification source.
///
/// Files are watched through their parent directory so that editors which
/// save by writing a temporary file and renaming it over the original keep
/// producing events. Events for unrelated siblings are filtered out.
///
/// Dropping the watcher closes the event stream.
pub struct FsWatcher {
    inner: RecommendedWatcher,
    interest: Arc<Mutex<Interest>>,
    watched_dirs: HashSet<PathBuf>,
}

impl fmt::Debug for FsWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsWatcher")
            .field("watched_dirs", &self.watched_dirs)
            .finish_non_exhaustive()
    }
}

impl FsWatcher {
    /// Create the watcher and the stream of events it produces.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<WatchEvent>();
        let interest = Arc::new(Mutex::new(Interest::default()));

        // Called synchronously by notify on its own thread.
        let inner = RecommendedWatcher::new(
            {
                let interest = Arc::clone(&interest);
                move |res: notify::Result<Event>| match res {
                    Ok(event) => {
                        // Reads and opens are not changes; a build reading its
                        // sources must not retrigger itself.
                        if event.kind.is_access() {
                            return;
                        }
                        let Ok(interest) = interest.lock() else {
                            return;
                        };
                        for path in event.paths {
                            if interest.wants(&path) {
                                let _ = event_tx.send(WatchEvent::Changed(path));
                            }
                        }
                    }
                    Err(err) => {
                        let _ = event_tx.send(WatchEvent::Error(err.to_string()));
                    }
                }
            },
            Config::default(),
        )?;

        info!("file watcher created");

        Ok((
            Self {
                inner,
                interest,
                watched_dirs: HashSet::new(),
            },
            event_rx,
        ))
    }

    fn watch_dir(&mut self, dir: &Path) -> Result<()> {
        if self.watched_dirs.contains(dir) {
            return Ok(());
        }
        self.inner.watch(dir, RecursiveMode::NonRecursive)?;
        self.watched_dirs.insert(dir.to_path_buf());
        debug!(dir = %dir.display(), "watching directory");
        Ok(())
    }
}

impl WatchRegistry for FsWatcher {
    fn watch(&mut self, path: &Path) -> Result<()> {
        if path.is_dir() {
            self.watch_dir(path)?;
            let mut interest = self
                .interest
                .lock()
                .map_err(|_| DevloopError::Watch("watch interest lock poisoned".into()))?;
            interest.dirs.insert(path.to_path_buf());
            return Ok(());
        }

        if !path.exists() {
            return Err(DevloopError::Watch(format!(
                "{}: no such file or directory",
                path.display()
            )));
        }

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        self.watch_dir(&parent)?;

        let mut interest = self
            .interest
            .lock()
            .map_err(|_| DevloopError::Watch("watch interest lock poisoned".into()))?;
        interest.files.insert(path.to_path_buf());
        Ok(())
    }
}
