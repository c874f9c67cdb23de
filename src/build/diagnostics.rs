// src/build/diagnostics.rs

//! Turn compiler stderr into structured [`Diagnostic`]s.
//!
//! Two common shapes are recognised:
//!
//! ```text
//! src/app.c:12:5: error: expected ';' before '}' token
//! error[E0425]: cannot find value `x` in this scope
//!   --> src/main.rs:3:13
//! ```
//!
//! Anything else is ignored; the raw text is still echoed to the user.

use std::sync::LazyLock;

use regex::Regex;

use super::{Diagnostic, Severity};

static LOCATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>[^:\s][^:]*):(?P<line>\d+)(?::(?P<col>\d+))?:\s*(?:fatal\s+)?(?P<level>error|warning):\s*(?P<msg>.*)$",
    )
    .expect("located diagnostic regex")
});

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<level>error|warning)(?:\[[A-Za-z0-9]+\])?:\s*(?P<msg>.*)$")
        .expect("header diagnostic regex")
});

static ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-->\s*(?P<file>[^:]+):(?P<line>\d+)(?::(?P<col>\d+))?\s*$")
        .expect("arrow location regex")
});

/// Incremental parser fed one stderr line at a time.
#[derive(Debug, Default)]
pub struct DiagnosticParser {
    diagnostics: Vec<Diagnostic>,
    /// Index of the last header-style diagnostic still waiting for `-->`.
    pending_location: Option<usize>,
}

impl DiagnosticParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        if let Some(caps) = LOCATED.captures(line) {
            let diag = Diagnostic {
                severity: severity(&caps["level"]),
                message: caps["msg"].trim().to_string(),
                location: None,
            };
            let line_no = caps["line"].parse().unwrap_or(0);
            let col = caps.name("col").and_then(|m| m.as_str().parse().ok());
            self.diagnostics.push(diag.at(&caps["file"], line_no, col));
            self.pending_location = None;
            return;
        }

        if let Some(caps) = HEADER.captures(line) {
            let msg = caps["msg"].trim();
            // rustc/cargo summary lines are not diagnostics of their own.
            if msg.starts_with("could not compile") || msg.starts_with("aborting due to") {
                self.pending_location = None;
                return;
            }
            self.diagnostics.push(Diagnostic {
                severity: severity(&caps["level"]),
                message: msg.to_string(),
                location: None,
            });
            self.pending_location = Some(self.diagnostics.len() - 1);
            return;
        }

        if let Some(idx) = self.pending_location {
            if let Some(caps) = ARROW.captures(line) {
                let line_no = caps["line"].parse().unwrap_or(0);
                let col = caps.name("col").and_then(|m| m.as_str().parse().ok());
                let diag = self.diagnostics[idx].clone();
                self.diagnostics[idx] = diag.at(caps["file"].trim(), line_no, col);
                self.pending_location = None;
            }
        }
    }

    pub fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

fn severity(level: &str) -> Severity {
    if level == "warning" {
        Severity::Warning
    } else {
        Severity::Error
    }
}

/// Parse a whole stderr blob at once.
pub fn parse_diagnostics(text: &str) -> Vec<Diagnostic> {
    let mut parser = DiagnosticParser::new();
    for line in text.lines() {
        parser.push_line(line);
    }
    parser.finish()
}
