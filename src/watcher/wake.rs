//! Filesystem-event nudging.
//!
//! Watches the parent directory of every tracked file and wakes the poll loop
//! when anything in them changes. A nudge only cuts the current sleep short;
//! the poll cycle still decides whether a reload happens.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::TrackedFileSet;

pub struct EventNudger {
    debouncer: Debouncer<notify::RecommendedWatcher>,
    watched: BTreeSet<PathBuf>,
}

impl EventNudger {
    pub fn new(wake: Sender<()>, debounce: Duration) -> Result<Self, notify::Error> {
        let debouncer = new_debouncer(debounce, move |result: DebounceEventResult| match result {
            Ok(events) => {
                if !events.is_empty() {
                    trace!(count = events.len(), "filesystem events, waking watcher");
                    let _ = wake.send(());
                }
            }
            Err(e) => {
                warn!(error = %e, "file watcher error");
            }
        })?;

        Ok(Self {
            debouncer,
            watched: BTreeSet::new(),
        })
    }

    /// Directories currently registered with the OS watcher.
    pub fn watched(&self) -> &BTreeSet<PathBuf> {
        &self.watched
    }

    /// Bring the set of watched directories in line with the tracked files.
    pub fn sync(&mut self, tracked: &TrackedFileSet) {
        let wanted: BTreeSet<PathBuf> = tracked
            .keys()
            .filter_map(|path| path.parent().map(Path::to_path_buf))
            .collect();

        let stale: Vec<PathBuf> = self.watched.difference(&wanted).cloned().collect();
        for dir in stale {
            if let Err(e) = self.debouncer.watcher().unwatch(&dir) {
                debug!(dir = %dir.display(), error = %e, "unwatch failed");
            }
            self.watched.remove(&dir);
        }

        let fresh: Vec<PathBuf> = wanted.difference(&self.watched).cloned().collect();
        for dir in fresh {
            match self.debouncer.watcher().watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    self.watched.insert(dir);
                }
                Err(e) => {
                    // Retried next cycle since it stays out of `watched`.
                    debug!(dir = %dir.display(), error = %e, "watch failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Signature;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn tracked_set(paths: &[PathBuf]) -> TrackedFileSet {
        paths
            .iter()
            .map(|p| (p.clone(), Signature::of(p).unwrap().unwrap()))
            .collect()
    }

    #[test]
    fn test_sync_adds_and_removes_dirs() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        let a_file = a.join("x.rs");
        let b_file = b.join("y.rs");
        std::fs::write(&a_file, "x").unwrap();
        std::fs::write(&b_file, "y").unwrap();

        let (tx, _rx) = mpsc::channel();
        let mut nudger = EventNudger::new(tx, Duration::from_millis(20)).unwrap();

        nudger.sync(&tracked_set(&[a_file.clone(), b_file.clone()]));
        assert_eq!(nudger.watched().len(), 2);

        nudger.sync(&tracked_set(&[a_file]));
        assert_eq!(nudger.watched().iter().collect::<Vec<_>>(), vec![&a]);
    }

    #[test]
    fn test_event_wakes_receiver() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("main.rs");
        std::fs::write(&file, "v1").unwrap();

        let (tx, rx) = mpsc::channel();
        let mut nudger = EventNudger::new(tx, Duration::from_millis(20)).unwrap();
        nudger.sync(&tracked_set(&[file.clone()]));

        std::thread::sleep(Duration::from_millis(100));
        std::fs::write(&file, "v2").unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
