// src/build/depfile.rs

//! Make-style dependency files (`target: dep1 dep2 \`).
//!
//! Compilers such as rustc (`--emit=dep-info`), gcc/clang (`-MD`) and most
//! bundlers can write one of these next to the artifact. Its prerequisites
//! are exactly the source files the build read, so they are the files worth
//! watching.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::errors::Result;

/// Read and parse the depfile at `path`, resolving relative entries
/// against `root`.
///
/// Entries are canonicalized so they compare equal to the paths the watcher
/// reports. Entries that do not exist are normalized lexically instead.
///
/// A missing file yields an empty list: the build may simply not have
/// produced it (yet).
pub fn read_depfile(path: &Path, root: &Path) -> Result<Vec<PathBuf>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    Ok(parse_depfile(&contents)
        .into_iter()
        .map(|p| resolve(root, &p))
        .collect())
}

fn resolve(root: &Path, entry: &Path) -> PathBuf {
    let joined = root.join(entry);
    joined
        .canonicalize()
        .unwrap_or_else(|_| normalize_lexically(&joined))
}

/// Drop `.` components and fold `..` into the preceding component.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Parse depfile contents into the list of prerequisites, deduplicated and in
/// first-seen order. Targets are not included.
pub fn parse_depfile(contents: &str) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut deps = Vec::new();

    // Join line continuations first.
    let joined = contents.replace("\\\r\n", " ").replace("\\\n", " ");

    for line in joined.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(rest) = split_rule(line) else {
            continue;
        };

        for word in split_words(rest) {
            if seen.insert(word.clone()) {
                deps.push(PathBuf::from(word));
            }
        }
    }

    deps
}

/// Return the prerequisite part of `target: prereqs`.
///
/// The separator is the first `:` followed by whitespace or end of line, so
/// drive letters like `C:\src` stay intact.
fn split_rule(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b':' && (i + 1 == bytes.len() || bytes[i + 1].is_ascii_whitespace()) {
            return Some(&line[i + 1..]);
        }
    }
    None
}

/// Split on whitespace, honouring `\ ` escapes.
fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                current.push(' ');
                chars.next();
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
}
