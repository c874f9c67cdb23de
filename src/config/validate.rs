// src/config/validate.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{
    BuildSection, ConfigFile, RawConfigFile, RunSection, WatchSection,
};
use crate::errors::{DevloopError, Result};
use crate::exec::DEFAULT_GRACE_PERIOD;
use crate::watch::DEFAULT_DEBOUNCE;
use crate::watch::SourcePatterns;
use crate::watch::path_utils::resolve_against;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DevloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_build(&raw)?;
        let grace_period = duration_field("run.grace_period", raw.run.grace_period.as_deref())?
            .unwrap_or(DEFAULT_GRACE_PERIOD);
        let debounce = duration_field("watch.debounce", raw.watch.debounce.as_deref())?
            .unwrap_or(DEFAULT_DEBOUNCE);

        if debounce.is_zero() {
            return Err(DevloopError::Config(
                "[watch].debounce must be greater than zero".to_string(),
            ));
        }

        let root = raw.root;
        let build = raw.build;

        Ok(ConfigFile {
            build: BuildSection {
                cmd: build.cmd,
                entrypoints: resolve_all(&root, &build.entrypoints),
                depfile: build.depfile.map(|p| resolve_against(&root, Path::new(&p))),
                artifact: resolve_against(&root, Path::new(&build.artifact)),
                watch: build.watch,
                exclude: build.exclude,
            },
            run: RunSection {
                runtime: raw.run.runtime.filter(|r| !r.trim().is_empty()),
                args: raw.run.args,
                grace_period,
            },
            watch: WatchSection { debounce },
            root,
        })
    }
}

impl ConfigFile {
    /// Compiled `watch`/`exclude` globs.
    pub fn source_patterns(&self) -> Result<SourcePatterns> {
        SourcePatterns::new(&self.build.watch, &self.build.exclude)
            .map_err(|e| DevloopError::Config(format!("{e:#}")))
    }
}

fn validate_build(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.cmd.trim().is_empty() {
        return Err(DevloopError::Config(
            "[build].cmd must not be empty".to_string(),
        ));
    }
    if cfg.build.artifact.trim().is_empty() {
        return Err(DevloopError::Config(
            "[build].artifact must not be empty".to_string(),
        ));
    }
    if let Some(entry) = cfg.build.entrypoints.iter().find(|e| e.trim().is_empty()) {
        return Err(DevloopError::Config(format!(
            "[build].entrypoints contains an empty path ({entry:?})"
        )));
    }

    SourcePatterns::new(&cfg.build.watch, &cfg.build.exclude)
        .map_err(|e| DevloopError::Config(format!("[build] globs: {e:#}")))?;

    Ok(())
}

fn duration_field(name: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|s| {
            parse_duration(s).map_err(|e| DevloopError::Config(format!("{name}: {e}")))
        })
        .transpose()
}

fn resolve_all(root: &Path, paths: &[String]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|p| resolve_against(root, Path::new(p)))
        .collect()
}
