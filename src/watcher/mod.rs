//! Watcher loop — the background poll cycle that decides when to reload.
//!
//! Every cycle rediscovers the tracked files, compares each one against the
//! signature committed at the end of the previous cycle, and either commits
//! the fresh set and sleeps, or fires the restart trigger once and ends.
//!
//! ```text
//!  ┌─────────┐   ┌──────────┐   ┌───────────┐  changed   ┌─────────┐
//!  │ discover│──▶│ compare  │──▶│  commit   │──────────▶ │ restart │
//!  └─────────┘   └──────────┘   └───────────┘            └─────────┘
//!       ▲                            │ unchanged
//!       └──────── sleep / nudge ◀────┘
//! ```

pub mod wake;

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::WatcherConfig;
use crate::discovery::{discover, ModuleSource};
use crate::reloader::{set_state, ReloaderState};
use crate::restart::{Invocation, Restarter};
use crate::signature::{has_changed, Signature};

use wake::EventNudger;

/// Debounce applied to filesystem events before they wake the loop.
const NUDGE_DEBOUNCE: Duration = Duration::from_millis(50);

/// Tracked path → signature committed at the end of the last cycle.
pub type TrackedFileSet = HashMap<PathBuf, Signature>;

/// Outcome of a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollCycle {
    /// Nothing changed; `tracked` files are now being watched.
    Unchanged { tracked: usize },
    /// At least one tracked file was modified or deleted.
    Changed { paths: Vec<PathBuf> },
}

/// Everything the background thread needs besides the loop state itself.
pub(crate) struct LoopControl {
    pub stop: Arc<AtomicBool>,
    pub wake: Receiver<()>,
    pub wake_tx: Sender<()>,
    pub restarter: Arc<dyn Restarter>,
    pub invocation: Arc<Invocation>,
    pub state: Arc<RwLock<ReloaderState>>,
}

pub struct WatcherLoop {
    config: WatcherConfig,
    working_dir: PathBuf,
    source: Arc<dyn ModuleSource>,
    tracked: TrackedFileSet,
    cycles: u64,
}

impl WatcherLoop {
    pub fn new(config: WatcherConfig, working_dir: PathBuf, source: Arc<dyn ModuleSource>) -> Self {
        Self {
            config,
            working_dir,
            source,
            tracked: TrackedFileSet::new(),
            cycles: 0,
        }
    }

    /// Files tracked as of the last completed cycle.
    pub fn tracked(&self) -> &TrackedFileSet {
        &self.tracked
    }

    /// Number of completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one discover + compare pass and commit the refreshed signatures.
    pub fn poll_once(&mut self) -> PollCycle {
        let discovered = discover(&self.config, self.source.as_ref(), &self.working_dir);
        let mut next = TrackedFileSet::with_capacity(discovered.len());
        let mut changed = Vec::new();

        for path in &discovered {
            let previous = self.tracked.get(path);
            match has_changed(path, previous) {
                Ok((is_changed, current)) => {
                    if is_changed {
                        debug!(path = %path.display(), "tracked file changed");
                        changed.push(path.clone());
                    }
                    if let Some(sig) = current {
                        next.insert(path.clone(), sig);
                    }
                }
                Err(e) => {
                    // Unchanged this cycle: carry the old signature forward.
                    warn!(error = %e, "skipping file this cycle");
                    if let Some(prev) = previous {
                        next.insert(path.clone(), *prev);
                    }
                }
            }
        }

        // Files tracked last cycle that discovery no longer reports: gone from
        // disk means deleted, otherwise the module was simply unloaded.
        for (path, previous) in &self.tracked {
            if discovered.contains(path) {
                continue;
            }
            match has_changed(path, Some(previous)) {
                Ok((_, None)) => {
                    debug!(path = %path.display(), "tracked file deleted");
                    changed.push(path.clone());
                }
                Ok((_, Some(_))) => {
                    debug!(path = %path.display(), "module no longer loaded");
                }
                Err(e) => {
                    // Unchanged this cycle: keep it tracked until stat succeeds.
                    warn!(error = %e, "skipping file this cycle");
                    next.insert(path.clone(), *previous);
                }
            }
        }

        self.tracked = next;
        self.cycles += 1;

        if changed.is_empty() {
            PollCycle::Unchanged {
                tracked: self.tracked.len(),
            }
        } else {
            changed.sort();
            PollCycle::Changed { paths: changed }
        }
    }

    /// Drive poll cycles until a stop is requested or a reload is triggered.
    pub(crate) fn run(mut self, control: LoopControl) {
        set_state(&control.state, ReloaderState::Running);

        let interval = self.config.poll_interval();
        let mut nudger = if self.config.fs_events {
            match EventNudger::new(control.wake_tx.clone(), NUDGE_DEBOUNCE) {
                Ok(nudger) => Some(nudger),
                Err(e) => {
                    warn!(error = %e, "filesystem events unavailable, polling only");
                    None
                }
            }
        } else {
            None
        };

        loop {
            if control.stop.load(Ordering::SeqCst) {
                debug!(cycles = self.cycles, "watcher loop stopping");
                break;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| self.poll_once())) {
                Ok(PollCycle::Changed { paths }) => {
                    info!(
                        count = paths.len(),
                        first = %paths[0].display(),
                        "change detected, reloading"
                    );
                    set_state(&control.state, ReloaderState::ReloadTriggered);
                    if let Err(e) = control.restarter.restart(&control.invocation) {
                        error!(error = %e, "reload failed, process keeps running unreloaded");
                    }
                    return;
                }
                Ok(PollCycle::Unchanged { tracked }) => {
                    debug!(cycle = self.cycles, tracked, "no changes");
                    if let Some(nudger) = nudger.as_mut() {
                        nudger.sync(&self.tracked);
                    }
                }
                Err(_) => {
                    error!(cycle = self.cycles, "poll cycle panicked, continuing");
                }
            }

            match control.wake.recv_timeout(interval) {
                Ok(()) => while control.wake.try_recv().is_ok() {},
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => std::thread::sleep(interval),
            }
        }
    }
}
