//! End-to-end tests for the live reloader.
//!
//! The real process is never replaced here: a counting restarter stands in
//! for `exec`, and a static module source stands in for the loaded-module
//! registry.

use livereload::{
    Invocation, LiveReloader, ModuleEntry, ReloadError, ReloaderState, Restarter, StaticModules,
    WatcherConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    restarts: Arc<AtomicUsize>,
    source: Arc<StaticModules>,
    reloader: LiveReloader,
}

impl Harness {
    fn new(config: WatcherConfig, files: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "original").unwrap();
            paths.push(path);
        }

        let restarts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&restarts);
        let restarter: Arc<dyn Restarter> = Arc::new(move |_: &Invocation| -> livereload::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let source = Arc::new(StaticModules::from_paths(paths));
        let invocation = Invocation {
            executable: dir.path().join("server"),
            args: vec!["server".into(), "--port".into(), "8000".into()],
            env: vec![("APP_ENV".into(), "dev".into())],
            working_dir: dir.path().to_path_buf(),
        };

        let reloader =
            LiveReloader::with_parts(config, invocation, source.clone(), restarter).unwrap();

        Self {
            dir,
            restarts,
            source,
            reloader,
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.path().join(file)
    }

    fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Start and wait until at least one full cycle has recorded signatures.
    fn start(&self, settle: Duration) {
        self.reloader.start_watcher_task().unwrap();
        thread::sleep(settle);
        assert_eq!(self.reloader.state(), ReloaderState::Running);
    }
}

fn edit(path: &Path) {
    fs::write(path, "edited, and longer than before").unwrap();
}

fn wait_for_restart(harness: &Harness, deadline: Duration) -> Option<Duration> {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if harness.restarts() > 0 {
            return Some(start.elapsed());
        }
        thread::sleep(Duration::from_millis(10));
    }
    None
}

#[test]
fn test_quiet_files_never_restart() {
    let harness = Harness::new(
        WatcherConfig::default().with_poll_interval_secs(0.01),
        &["src/main.rs", "src/lib.rs"],
    );
    harness.start(Duration::from_millis(50));

    // Dozens of cycles with nothing touched.
    thread::sleep(Duration::from_millis(300));
    assert_eq!(harness.restarts(), 0);
    assert_eq!(harness.reloader.state(), ReloaderState::Running);
    assert!(harness.reloader.stop_watcher_task());
}

#[test]
fn test_excluded_dependency_edit_is_ignored_app_edit_reloads() {
    let harness = Harness::new(
        WatcherConfig::default()
            .with_poll_interval_secs(1.0)
            .with_exclude_pattern("/deps/"),
        &["app/main.src", "deps/lib.src"],
    );
    harness.start(Duration::from_millis(200));

    edit(&harness.path("deps/lib.src"));
    thread::sleep(Duration::from_millis(2200));
    assert_eq!(harness.restarts(), 0, "excluded file must not reload");

    edit(&harness.path("app/main.src"));
    let latency = wait_for_restart(&harness, Duration::from_secs(3));
    assert!(latency.is_some(), "app edit must reload");
    assert!(latency.unwrap() <= Duration::from_secs(2));
    assert_eq!(harness.reloader.state(), ReloaderState::ReloadTriggered);
}

#[test]
fn test_exactly_one_restart_for_many_edits() {
    let harness = Harness::new(
        WatcherConfig::default().with_poll_interval_secs(0.01),
        &["a.rs", "b.rs", "c.rs"],
    );
    harness.start(Duration::from_millis(50));

    for file in ["a.rs", "b.rs", "c.rs"] {
        edit(&harness.path(file));
    }
    assert!(wait_for_restart(&harness, Duration::from_secs(2)).is_some());

    edit(&harness.path("a.rs"));
    thread::sleep(Duration::from_millis(200));
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_deleting_tracked_file_reloads() {
    let harness = Harness::new(
        WatcherConfig::default().with_poll_interval_secs(0.01),
        &["handlers.rs", "main.rs"],
    );
    harness.start(Duration::from_millis(50));

    fs::remove_file(harness.path("handlers.rs")).unwrap();
    assert!(wait_for_restart(&harness, Duration::from_secs(2)).is_some());
}

#[test]
fn test_late_loaded_module_does_not_reload() {
    let harness = Harness::new(
        WatcherConfig::default().with_poll_interval_secs(0.01),
        &["main.rs"],
    );
    harness.start(Duration::from_millis(50));

    let plugin = harness.path("plugin.rs");
    fs::write(&plugin, "fn plugin() {}").unwrap();
    harness.source.set(vec![
        ModuleEntry::file(harness.path("main.rs")),
        ModuleEntry::file(&plugin),
    ]);

    thread::sleep(Duration::from_millis(200));
    assert_eq!(harness.restarts(), 0);

    // Once tracked, editing it does reload.
    edit(&plugin);
    assert!(wait_for_restart(&harness, Duration::from_secs(2)).is_some());
}

#[test]
fn test_extra_directory_is_watched() {
    let harness = Harness::new(
        WatcherConfig::default()
            .with_poll_interval_secs(0.01)
            .with_extra_path("templates"),
        &["main.rs", "templates/pages/index.html"],
    );
    harness.source.set(vec![ModuleEntry::file(harness.path("main.rs"))]);
    harness.start(Duration::from_millis(50));

    edit(&harness.path("templates/pages/index.html"));
    assert!(wait_for_restart(&harness, Duration::from_secs(2)).is_some());
}

#[test]
fn test_empty_discovery_runs_forever_quietly() {
    let harness = Harness::new(WatcherConfig::default().with_poll_interval_secs(0.01), &[]);
    harness.start(Duration::from_millis(50));

    thread::sleep(Duration::from_millis(300));
    assert_eq!(harness.restarts(), 0);
    assert_eq!(harness.reloader.state(), ReloaderState::Running);
    assert!(harness.reloader.stop_watcher_task());
    assert_eq!(harness.reloader.state(), ReloaderState::Idle);
}

#[test]
fn test_double_start_single_task() {
    let harness = Harness::new(
        WatcherConfig::default().with_poll_interval_secs(0.01),
        &["main.rs"],
    );
    harness.reloader.start_watcher_task().unwrap();
    harness.reloader.start_watcher_task().unwrap();
    thread::sleep(Duration::from_millis(50));

    edit(&harness.path("main.rs"));
    assert!(wait_for_restart(&harness, Duration::from_secs(2)).is_some());
    thread::sleep(Duration::from_millis(100));
    // A second loop would have fired its own restart.
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_stopped_watcher_ignores_edits() {
    let harness = Harness::new(
        WatcherConfig::default().with_poll_interval_secs(0.01),
        &["main.rs"],
    );
    harness.start(Duration::from_millis(50));
    assert!(harness.reloader.stop_watcher_task());

    edit(&harness.path("main.rs"));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(harness.restarts(), 0);

    // A fresh start records the edited file as first-seen, not as changed.
    harness.start(Duration::from_millis(50));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(harness.restarts(), 0);
    assert!(harness.reloader.stop_watcher_task());
}

#[test]
fn test_fs_event_wakes_loop_before_interval() {
    let harness = Harness::new(
        WatcherConfig::default()
            .with_poll_interval_secs(30.0)
            .with_fs_events(true),
        &["main.rs"],
    );
    harness.start(Duration::from_millis(200));

    edit(&harness.path("main.rs"));
    let latency = wait_for_restart(&harness, Duration::from_secs(5));
    assert!(latency.is_some(), "event must cut the 30s sleep short");
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reload.toml");
    fs::write(&path, "poll_interval_secs = 0\n").unwrap();

    assert!(matches!(
        WatcherConfig::load_from_path(&path),
        Err(ReloadError::Config(_))
    ));
}
