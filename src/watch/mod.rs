// src/watch/mod.rs

//! File watching and restart signalling.
//!
//! This module is responsible for:
//! - Compiling `watch` / `exclude` glob patterns used to discover sources.
//! - The [`WatchedPathSet`] the builder grows as it loads files.
//! - A `notify`-backed notification source ([`FsWatcher`]).
//! - The relay that debounces change notifications into restart signals.
//!
//! It does **not** know about processes or builds; it only turns filesystem
//! changes into "something changed" and "watching broke".

pub mod path_utils;
pub mod paths;
pub mod patterns;
pub mod relay;
pub mod watcher;

pub use paths::{WatchRegistry, WatchedPathSet};
pub use patterns::{SourcePatterns, collect_matching_files};
pub use relay::{DEFAULT_DEBOUNCE, run_relay};
pub use watcher::{FsWatcher, WatchEvent};
