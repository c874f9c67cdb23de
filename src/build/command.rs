// src/build/command.rs

//! [`Builder`] backed by an external build command.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::depfile::read_depfile;
use super::diagnostics::DiagnosticParser;
use super::{BuildFuture, BuildOutcome, Builder, Diagnostic, LoadHook};
use crate::watch::patterns::{SourcePatterns, collect_matching_files};

/// Runs a shell command to produce the artifact, then reports every source
/// file it depends on to the load hook.
///
/// Sources are discovered from the depfile (when configured) and from the
/// `watch`/`exclude` globs evaluated under the project root. The command is
/// expected to be incremental on its own; `rebuild` simply runs it again.
#[derive(Debug)]
pub struct CommandBuilder {
    cmd: String,
    root: PathBuf,
    patterns: SourcePatterns,
    depfile: Option<PathBuf>,
}

impl CommandBuilder {
    pub fn new(cmd: impl Into<String>, root: impl Into<PathBuf>, patterns: SourcePatterns) -> Self {
        Self {
            cmd: cmd.into(),
            root: root.into(),
            patterns,
            depfile: None,
        }
    }

    pub fn with_depfile(mut self, depfile: Option<PathBuf>) -> Self {
        self.depfile = depfile;
        self
    }

    async fn run(&mut self, generation: u64, hook: &mut dyn LoadHook) -> BuildOutcome {
        info!(generation, cmd = %self.cmd, "running build command");

        match run_command(&self.cmd, &self.root).await {
            Ok((succeeded, diagnostics)) => {
                let sources = self.sources().await;
                finish(generation, succeeded, diagnostics, sources, hook)
            }
            Err(diag) => {
                warn!(generation, error = %diag, "build command could not be run");
                BuildOutcome::failure(generation, vec![diag])
            }
        }
    }

    /// Discover sources on the blocking pool.
    async fn sources(&self) -> Vec<PathBuf> {
        let root = self.root.clone();
        let patterns = self.patterns.clone();
        let depfile = self.depfile.clone();

        match tokio::task::spawn_blocking(move || {
            discover_sources(&root, &patterns, depfile.as_deref())
        })
        .await
        {
            Ok(sources) => sources,
            Err(err) => {
                warn!(error = %err, "source discovery task failed");
                Vec::new()
            }
        }
    }
}

fn finish(
    generation: u64,
    mut succeeded: bool,
    mut diagnostics: Vec<Diagnostic>,
    sources: Vec<PathBuf>,
    hook: &mut dyn LoadHook,
) -> BuildOutcome {
    // Register sources even for failed builds so fixing a broken file
    // triggers the next attempt.
    for path in sources {
        if let Err(err) = hook.on_load(&path) {
            warn!(path = %path.display(), error = %err, "could not register source file");
            diagnostics.push(Diagnostic::error(format!(
                "watching {}: {err}",
                path.display()
            )));
            succeeded = false;
        }
    }

    let outcome = BuildOutcome {
        succeeded,
        diagnostics,
        generation,
    };
    info!(
        generation,
        succeeded,
        errors = outcome.error_count(),
        "build finished"
    );
    outcome
}

fn discover_sources(
    root: &Path,
    patterns: &SourcePatterns,
    depfile: Option<&Path>,
) -> Vec<PathBuf> {
    let mut sources = Vec::new();

    if let Some(depfile) = depfile {
        match read_depfile(depfile, root) {
            Ok(deps) => sources.extend(deps),
            Err(err) => warn!(
                depfile = %depfile.display(),
                error = %err,
                "failed to read depfile"
            ),
        }
    }

    if !patterns.is_empty() {
        match collect_matching_files(root, patterns) {
            Ok(files) => sources.extend(files),
            Err(err) => warn!(
                root = %root.display(),
                error = %err,
                "failed to collect watched source files"
            ),
        }
    }

    debug!(count = sources.len(), "discovered build sources");
    sources
}

impl Builder for CommandBuilder {
    fn build<'a>(&'a mut self, hook: &'a mut dyn LoadHook) -> BuildFuture<'a> {
        Box::pin(self.run(0, hook))
    }

    fn rebuild<'a>(
        &'a mut self,
        previous: &'a BuildOutcome,
        hook: &'a mut dyn LoadHook,
    ) -> BuildFuture<'a> {
        Box::pin(self.run(previous.generation + 1, hook))
    }
}

/// Run the command, echoing stderr unmodified while collecting diagnostics.
///
/// Returns whether the command succeeded, or a diagnostic describing why it
/// could not be run at all.
async fn run_command(
    cmd: &str,
    root: &Path,
) -> std::result::Result<(bool, Vec<Diagnostic>), Diagnostic> {
    let mut command = shell_command(cmd);
    command
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|err| Diagnostic::error(format!("could not run build command `{cmd}`: {err}")))?;

    let mut parser = DiagnosticParser::new();
    if let Some(stderr) = child.stderr.take() {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            eprintln!("{line}");
            parser.push_line(&line);
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|err| Diagnostic::error(format!("waiting for build command `{cmd}`: {err}")))?;

    let mut diagnostics = parser.finish();
    if !status.success() && !diagnostics.iter().any(Diagnostic::is_error) {
        diagnostics.push(Diagnostic::error(format!(
            "build command exited with {status}"
        )));
    }

    Ok((status.success(), diagnostics))
}

/// Build a shell command appropriate for the platform.
pub(crate) fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use super::*;
    use crate::build::Severity;

    #[derive(Default)]
    struct Recorder(Vec<PathBuf>);

    impl LoadHook for Recorder {
        fn on_load(&mut self, path: &Path) -> crate::errors::Result<()> {
            self.0.push(path.to_path_buf());
            Ok(())
        }
    }

    struct Refusing;

    impl LoadHook for Refusing {
        fn on_load(&mut self, _path: &Path) -> crate::errors::Result<()> {
            Err(crate::errors::DevloopError::Watch("no more watches".into()))
        }
    }

    fn patterns(watch: &[&str]) -> SourcePatterns {
        let watch: Vec<String> = watch.iter().map(|s| s.to_string()).collect();
        SourcePatterns::new(&watch, &[]).unwrap()
    }

    #[tokio::test]
    async fn successful_command_registers_matching_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.txt"), "hello").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let mut builder = CommandBuilder::new("true", dir.path(), patterns(&["src/**/*.txt"]));
        let mut hook = Recorder::default();
        let outcome = builder.build(&mut hook).await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.generation, 0);
        assert_eq!(hook.0, vec![dir.path().join("src/main.txt")]);
    }

    #[tokio::test]
    async fn failing_command_yields_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = CommandBuilder::new(
            "echo 'src/app.c:3:1: error: nope' >&2; exit 2",
            dir.path(),
            SourcePatterns::empty(),
        );
        let mut hook = Recorder::default();
        let outcome = builder.build(&mut hook).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].severity, Severity::Error);
        assert_eq!(outcome.diagnostics[0].message, "nope");
    }

    #[tokio::test]
    async fn silent_failure_gets_synthetic_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = CommandBuilder::new("exit 3", dir.path(), SourcePatterns::empty());
        let first = builder.build(&mut Recorder::default()).await;
        let outcome = builder.rebuild(&first, &mut Recorder::default()).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.generation, 1);
        assert!(outcome.diagnostics[0].message.contains("build command exited with"));
    }

    #[tokio::test]
    async fn depfile_entries_are_registered() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = CommandBuilder::new(
            "printf 'app: a.rs b.rs\\n' > app.d",
            dir.path(),
            SourcePatterns::empty(),
        )
        .with_depfile(Some(dir.path().join("app.d")));

        let mut hook = Recorder::default();
        let outcome = builder.build(&mut hook).await;

        assert!(outcome.succeeded);
        assert_eq!(hook.0, vec![dir.path().join("a.rs"), dir.path().join("b.rs")]);
    }

    #[tokio::test]
    async fn hook_failure_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.txt"), "x").unwrap();
        let mut builder = CommandBuilder::new("true", dir.path(), patterns(&["*.txt"]));

        let outcome = builder.build(&mut Refusing).await;

        assert!(!outcome.succeeded);
        assert!(outcome.diagnostics[0].message.contains("no more watches"));
    }
}
