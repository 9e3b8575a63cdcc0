//! Change detection — cheap per-file signatures.
//!
//! A signature is the file's modification time plus its size, taken from a
//! single `stat`. Contents are never read, so a poll cycle costs one
//! metadata call per tracked file regardless of file size.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use crate::error::{ReloadError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub modified: SystemTime,
    /// Tie-breaker for filesystems with coarse timestamps.
    pub len: u64,
}

impl Signature {
    /// Read the current signature of `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn of(path: &Path) -> Result<Option<Self>> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if is_gone(&e) => return Ok(None),
            Err(e) => {
                return Err(ReloadError::Signature {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let modified = metadata.modified().map_err(|e| ReloadError::Signature {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Some(Self {
            modified,
            len: metadata.len(),
        }))
    }
}

/// Whether a `stat` failure means the file is no longer there. A parent
/// directory replaced by a regular file reports `ENOTDIR`.
fn is_gone(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::NotFound {
        return true;
    }
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::ENOTDIR)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Compare `path` against the signature recorded for it in the previous cycle.
///
/// Returns whether the file changed and its fresh signature (`None` when the
/// file is gone). A file seen for the first time (`previous == None`) is
/// never reported as changed. A file that disappeared is.
pub fn has_changed(path: &Path, previous: Option<&Signature>) -> Result<(bool, Option<Signature>)> {
    let current = Signature::of(path)?;

    let changed = match (previous, &current) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(prev), Some(curr)) => prev != curr,
    };

    Ok((changed, current))
}
