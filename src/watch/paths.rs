// src/watch/paths.rs

//! The set of paths registered with the notification source.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::build::LoadHook;
use crate::errors::Result;

/// Registration side of a notification source.
pub trait WatchRegistry: Send {
    /// Start delivering change notifications for `path`.
    fn watch(&mut self, path: &Path) -> Result<()>;
}

/// Paths currently registered for change notifications.
///
/// Seeded with the entry points before the first build in watch mode, then
/// grown by the builder through [`LoadHook`]. Paths are never removed. In
/// one-shot mode there is no registry and the set only records what was
/// loaded.
pub struct WatchedPathSet {
    paths: BTreeSet<PathBuf>,
    registry: Option<Box<dyn WatchRegistry>>,
}

impl fmt::Debug for WatchedPathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedPathSet")
            .field("paths", &self.paths)
            .field("watching", &self.registry.is_some())
            .finish()
    }
}

impl WatchedPathSet {
    /// A set that only records paths.
    pub fn unwatched() -> Self {
        Self {
            paths: BTreeSet::new(),
            registry: None,
        }
    }

    /// A set that forwards every new path to `registry`.
    pub fn with_registry(registry: Box<dyn WatchRegistry>) -> Self {
        Self {
            paths: BTreeSet::new(),
            registry: Some(registry),
        }
    }

    /// Register `path`. Already-known paths are not registered twice.
    ///
    /// The path is only recorded once the registry accepted it.
    pub fn add(&mut self, path: &Path) -> Result<bool> {
        if self.paths.contains(path) {
            return Ok(false);
        }
        if let Some(registry) = self.registry.as_mut() {
            registry.watch(path)?;
            debug!(path = %path.display(), "watching path");
        }
        self.paths.insert(path.to_path_buf());
        Ok(true)
    }

    /// Register the configured entry points.
    pub fn seed<'a>(&mut self, entrypoints: impl IntoIterator<Item = &'a PathBuf>) -> Result<()> {
        for path in entrypoints {
            self.add(path)?;
        }
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }
}

impl LoadHook for WatchedPathSet {
    fn on_load(&mut self, path: &Path) -> Result<()> {
        self.add(path).map(|_| ())
    }
}
