//! Error types for livereload.
//!
//! Only `Startup` and `Config` ever reach the hosting application. The other
//! variants are produced inside the watcher thread, logged there, and
//! contained.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReloadError {
    /// A module's backing file could not be inspected during discovery.
    #[error("discovery error: {0}")]
    Discovery(String),

    /// `stat` failed on a tracked path for a reason other than the file
    /// being gone.
    #[error("signature error for {}: {source}", .path.display())]
    Signature {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Re-executing or spawning the replacement process failed.
    #[error("failed to replace process with {}: {source}", .executable.display())]
    ProcessReplacement {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The watcher thread could not be spawned.
    #[error("failed to start watcher thread: {0}")]
    Startup(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ReloadError>;

impl ReloadError {
    /// Whether the error only affects the current poll cycle.
    pub fn is_contained(&self) -> bool {
        matches!(
            self,
            ReloadError::Discovery(_)
                | ReloadError::Signature { .. }
                | ReloadError::ProcessReplacement { .. }
        )
    }
}
