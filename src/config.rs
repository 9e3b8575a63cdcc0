//! Watcher configuration.
//!
//! Configuration is plain data: built in code with the `with_*` methods or
//! loaded from a `.livereload.toml` file. It is validated once when the
//! reloader is constructed and never changes afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{ReloadError, Result};

/// Default file name looked up in the working directory by [`WatcherConfig::load`].
pub const CONFIG_FILE_NAME: &str = ".livereload.toml";

/// Default sleep between two poll cycles, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.0;

/// How the current process is replaced once a change is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadMode {
    /// Replace the process image in place (same PID). Unix only.
    Exec,
    /// Spawn a new process with the same invocation, then end this one.
    SpawnExit,
}

impl Default for ReloadMode {
    fn default() -> Self {
        if cfg!(unix) {
            ReloadMode::Exec
        } else {
            ReloadMode::SpawnExit
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Seconds to sleep between poll cycles.
    pub poll_interval_secs: f64,
    /// A path is dropped when it contains any of these substrings.
    pub exclude_patterns: BTreeSet<String>,
    /// Extra files or directories to track. Directories are walked recursively.
    pub extra_paths: BTreeSet<PathBuf>,
    /// Track only module files under the working directory.
    pub working_dir_only: bool,
    pub reload_mode: ReloadMode,
    /// In `spawn_exit` mode, exit immediately instead of interrupting the host.
    pub force_exit: bool,
    /// Wake the poll loop early on filesystem events.
    pub fs_events: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            exclude_patterns: BTreeSet::new(),
            extra_paths: BTreeSet::new(),
            working_dir_only: false,
            reload_mode: ReloadMode::default(),
            force_exit: false,
            fs_events: false,
        }
    }
}

impl WatcherConfig {
    /// Load `.livereload.toml` from the current directory, or the defaults
    /// when no such file exists.
    pub fn load() -> Result<Self> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WatcherConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded watcher config");
        Ok(config)
    }

    pub fn with_poll_interval_secs(mut self, secs: f64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.insert(pattern.into());
        self
    }

    pub fn with_extra_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_paths.insert(path.into());
        self
    }

    pub fn with_working_dir_only(mut self, enabled: bool) -> Self {
        self.working_dir_only = enabled;
        self
    }

    pub fn with_reload_mode(mut self, mode: ReloadMode) -> Self {
        self.reload_mode = mode;
        self
    }

    pub fn with_force_exit(mut self, enabled: bool) -> Self {
        self.force_exit = enabled;
        self
    }

    pub fn with_fs_events(mut self, enabled: bool) -> Self {
        self.fs_events = enabled;
        self
    }

    /// The poll interval as a `Duration`. Only meaningful after `validate`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    /// Whether `path` matches any exclude pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let path = path.to_string_lossy();
        self.exclude_patterns
            .iter()
            .any(|pattern| path.contains(pattern.as_str()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.poll_interval_secs.is_finite() || self.poll_interval_secs <= 0.0 {
            return Err(ReloadError::Config(format!(
                "poll_interval_secs must be a positive number, got {}",
                self.poll_interval_secs
            )));
        }

        if self.exclude_patterns.iter().any(|p| p.is_empty()) {
            return Err(ReloadError::Config(
                "exclude_patterns must not contain an empty pattern".into(),
            ));
        }

        if self.reload_mode == ReloadMode::Exec && !cfg!(unix) {
            return Err(ReloadError::Config(
                "reload_mode 'exec' is only supported on Unix".into(),
            ));
        }

        Ok(())
    }
}
