#![allow(dead_code)]

use std::path::{Path, PathBuf};

use devloop::config::model::{RawBuildSection, RawRunSection, RawWatchSection};
use devloop::config::{ConfigFile, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new(root: impl AsRef<Path>, cmd: &str, artifact: &str) -> Self {
        Self {
            config: RawConfigFile {
                build: RawBuildSection {
                    cmd: cmd.to_string(),
                    entrypoints: Vec::new(),
                    watch: Vec::new(),
                    exclude: Vec::new(),
                    depfile: None,
                    artifact: artifact.to_string(),
                },
                run: RawRunSection::default(),
                watch: RawWatchSection::default(),
                root: root.as_ref().to_path_buf(),
            },
        }
    }

    pub fn entrypoint(mut self, path: &str) -> Self {
        self.config.build.entrypoints.push(path.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.config.build.watch.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.build.exclude.push(pattern.to_string());
        self
    }

    pub fn depfile(mut self, path: &str) -> Self {
        self.config.build.depfile = Some(path.to_string());
        self
    }

    pub fn runtime(mut self, runtime: &str) -> Self {
        self.config.run.runtime = Some(runtime.to_string());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.config.run.args.push(arg.to_string());
        self
    }

    pub fn grace_period(mut self, value: &str) -> Self {
        self.config.run.grace_period = Some(value.to_string());
        self
    }

    pub fn debounce(mut self, value: &str) -> Self {
        self.config.watch.debounce = Some(value.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Write `contents` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(&path, contents).expect("write file");
    path
}
