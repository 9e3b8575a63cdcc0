//! Reloader facade — the one type a hosting application touches.
//!
//! ```rust,no_run
//! use livereload::{LiveReloader, WatcherConfig};
//!
//! let config = WatcherConfig::default().with_extra_path("src");
//! let reloader = LiveReloader::new(config)?;
//! reloader.start_watcher_task()?;
//! // ... run the server ...
//! # Ok::<(), livereload::ReloadError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::WatcherConfig;
use crate::discovery::{ModuleSource, ProcessModules};
use crate::error::{ReloadError, Result};
use crate::restart::{Invocation, ProcessRestarter, Restarter};
use crate::watcher::{LoopControl, WatcherLoop};

const WATCHER_THREAD_NAME: &str = "livereload-watcher";

/// Lifecycle of the reloader within one process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloaderState {
    Idle,
    /// Thread spawned, first cycle not yet begun.
    Started,
    Running,
    /// Terminal. The next process instance starts over from `Idle`.
    ReloadTriggered,
}

pub(crate) fn set_state(state: &RwLock<ReloaderState>, next: ReloaderState) {
    match state.write() {
        Ok(mut guard) => *guard = next,
        Err(poisoned) => *poisoned.into_inner() = next,
    }
}

fn get_state(state: &RwLock<ReloaderState>) -> ReloaderState {
    match state.read() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

struct WatcherTask {
    stop: Arc<AtomicBool>,
    wake: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct LiveReloader {
    config: WatcherConfig,
    invocation: Arc<Invocation>,
    source: Arc<dyn ModuleSource>,
    restarter: Arc<dyn Restarter>,
    state: Arc<RwLock<ReloaderState>>,
    task: Mutex<Option<WatcherTask>>,
}

impl LiveReloader {
    /// Build a reloader for the current process, capturing its invocation now.
    pub fn new(config: WatcherConfig) -> Result<Self> {
        config.validate()?;
        let invocation = Invocation::capture()?;
        let restarter = ProcessRestarter::new(config.reload_mode, config.force_exit);
        Self::with_parts(config, invocation, Arc::new(ProcessModules), Arc::new(restarter))
    }

    /// Build a reloader from explicit parts: a custom module source, a custom
    /// restart strategy, or a pre-captured invocation.
    pub fn with_parts(
        config: WatcherConfig,
        invocation: Invocation,
        source: Arc<dyn ModuleSource>,
        restarter: Arc<dyn Restarter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            invocation: Arc::new(invocation),
            source,
            restarter,
            state: Arc::new(RwLock::new(ReloaderState::Idle)),
            task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn state(&self) -> ReloaderState {
        get_state(&self.state)
    }

    /// Start the background watcher thread.
    ///
    /// Does nothing if a watcher is already running or a reload has already
    /// been triggered in this process.
    pub fn start_watcher_task(&self) -> Result<()> {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());

        if self.state() == ReloaderState::ReloadTriggered {
            debug!("reload already triggered, not starting watcher");
            return Ok(());
        }

        if let Some(existing) = task.as_ref() {
            if !existing.handle.is_finished() {
                debug!("watcher already running");
                return Ok(());
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = mpsc::channel();

        let watcher = WatcherLoop::new(
            self.config.clone(),
            self.invocation.working_dir.clone(),
            Arc::clone(&self.source),
        );
        let control = LoopControl {
            stop: Arc::clone(&stop),
            wake: wake_rx,
            wake_tx: wake_tx.clone(),
            restarter: Arc::clone(&self.restarter),
            invocation: Arc::clone(&self.invocation),
            state: Arc::clone(&self.state),
        };

        set_state(&self.state, ReloaderState::Started);

        let handle = thread::Builder::new()
            .name(WATCHER_THREAD_NAME.to_string())
            .spawn(move || watcher.run(control))
            .map_err(|e| {
                set_state(&self.state, ReloaderState::Idle);
                ReloadError::Startup(e)
            })?;

        info!(
            interval_secs = self.config.poll_interval_secs,
            extra_paths = self.config.extra_paths.len(),
            mode = ?self.config.reload_mode,
            "live reload watcher started"
        );

        *task = Some(WatcherTask {
            stop,
            wake: wake_tx,
            handle,
        });
        Ok(())
    }

    /// Stop the watcher after its in-flight cycle completes.
    ///
    /// Returns `false` if no watcher was running.
    pub fn stop_watcher_task(&self) -> bool {
        let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return false;
        };

        task.stop.store(true, Ordering::SeqCst);
        let _ = task.wake.send(());

        if task.handle.join().is_err() {
            warn!("watcher thread panicked");
        }

        if self.state() != ReloaderState::ReloadTriggered {
            set_state(&self.state, ReloaderState::Idle);
        }

        info!("live reload watcher stopped");
        true
    }
}
