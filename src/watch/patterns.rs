// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::watch::path_utils::relative_str;

/// Compiled `watch` / `exclude` glob patterns from `[build]`.
///
/// Patterns are relative to the project root, e.g. `"src/**/*.rs"`. A path
/// matches when it matches at least one watch pattern and no exclude pattern.
#[derive(Clone)]
pub struct SourcePatterns {
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
    watch_len: usize,
}

impl fmt::Debug for SourcePatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourcePatterns")
            .field("watch_len", &self.watch_len)
            .finish_non_exhaustive()
    }
}

impl SourcePatterns {
    pub fn new(watch: &[String], exclude: &[String]) -> Result<Self> {
        let watch_set = build_globset(watch).context("building watch globset")?;

        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };

        Ok(Self {
            watch_set,
            exclude_set,
            watch_len: watch.len(),
        })
    }

    /// Patterns that match nothing.
    pub fn empty() -> Self {
        Self {
            watch_set: GlobSet::empty(),
            exclude_set: None,
            watch_len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.watch_len == 0
    }

    /// Whether the given root-relative path (forward slashes) is a source.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Whether everything below the root-relative directory `rel_dir` is
    /// excluded, so a walk can skip it.
    pub fn excludes_dir(&self, rel_dir: &str) -> bool {
        self.exclude_set.as_ref().is_some_and(|exclude| {
            exclude.is_match(rel_dir) || exclude.is_match(format!("{rel_dir}/"))
        })
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect all files under `root` matching `patterns`, sorted.
///
/// Symlinked directories are not followed and excluded directories are not
/// entered. Symlinks to files are reported under their link path.
pub fn collect_matching_files(root: &Path, patterns: &SourcePatterns) -> Result<Vec<PathBuf>> {
    let keep = |entry: &DirEntry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        relative_str(root, entry.path()).is_none_or(|rel| !patterns.excludes_dir(&rel))
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).into_iter().filter_entry(keep) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.file_type().is_dir() || !entry.path().is_file() {
            continue;
        }
        if let Some(rel) = relative_str(root, entry.path()) {
            if patterns.matches(&rel) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    Ok(files)
}
