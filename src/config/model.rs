// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Raw configuration as read from a TOML file, before validation.
///
/// ```toml
/// [build]
/// cmd = "cargo build"
/// entrypoints = ["src/main.rs"]
/// watch = ["src/**/*.rs"]
/// exclude = ["src/**/generated/**"]
/// depfile = "target/debug/app.d"
/// artifact = "target/debug/app"
///
/// [run]
/// runtime = "node"
/// args = ["--port", "8080"]
/// grace_period = "5s"
///
/// [watch]
/// debounce = "50ms"
/// ```
///
/// Only `[build]` with `cmd` and `artifact` is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    pub build: RawBuildSection,

    #[serde(default)]
    pub run: RawRunSection,

    #[serde(default)]
    pub watch: RawWatchSection,

    /// Directory relative paths resolve against; filled in by the loader.
    #[serde(skip)]
    pub root: PathBuf,
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBuildSection {
    /// Shell command producing the artifact.
    pub cmd: String,

    /// Files seeded into the watch set before the first build.
    #[serde(default)]
    pub entrypoints: Vec<String>,

    /// Globs for source files registered after every build.
    #[serde(default)]
    pub watch: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Make-style dependency file written by the build command.
    #[serde(default)]
    pub depfile: Option<String>,

    /// The file the process stage runs.
    pub artifact: String,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawRunSection {
    /// Interpreter used to run the artifact, e.g. `"node"`.
    #[serde(default)]
    pub runtime: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// e.g. `"5s"`.
    #[serde(default)]
    pub grace_period: Option<String>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawWatchSection {
    /// e.g. `"50ms"`.
    #[serde(default)]
    pub debounce: Option<String>,
}

/// Validated configuration with paths resolved against the project root.
///
/// Only constructible through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub root: PathBuf,
    pub build: BuildSection,
    pub run: RunSection,
    pub watch: WatchSection,
}

#[derive(Debug, Clone)]
pub struct BuildSection {
    pub cmd: String,
    pub entrypoints: Vec<PathBuf>,
    pub watch: Vec<String>,
    pub exclude: Vec<String>,
    pub depfile: Option<PathBuf>,
    pub artifact: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunSection {
    pub runtime: Option<String>,
    pub args: Vec<String>,
    pub grace_period: Duration,
}

#[derive(Debug, Clone)]
pub struct WatchSection {
    pub debounce: Duration,
}
