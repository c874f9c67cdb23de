// src/watch/path_utils.rs

//! Path helpers shared by source discovery and the watch set.

use std::path::{Path, PathBuf};

/// Convert `path` into a forward-slash string relative to `root`.
///
/// Tries a plain `strip_prefix` first, then retries with both sides
/// canonicalized (symlinked roots, `/private/var` on macOS). Returns `None`
/// if `path` does not live under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}

/// Resolve `path` against `root` unless it is already absolute.
pub fn resolve_against(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
