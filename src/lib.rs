//! # livereload
//!
//! Restart a running program when the files it was loaded from change.
//!
//! A background thread periodically lists the files backing the program
//! (its executable, mapped shared objects, and any registered source or
//! template directories), compares cheap `mtime + size` signatures against
//! the previous cycle, and on the first change re-executes the program with
//! its original arguments, environment and working directory.
//!
//! ## Key Features
//!
//! - **Polling**: one `stat` per tracked file per cycle, no content hashing
//! - **Full restart**: the new process re-binds its own sockets on startup
//! - **Contained failures**: per-file and restart errors are logged, never
//!   propagated into the host
//! - **Optional nudging**: filesystem events can cut the poll sleep short
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livereload::{LiveReloader, WatcherConfig};
//!
//! let config = WatcherConfig::default()
//!     .with_extra_path("src")
//!     .with_exclude_pattern("/target/");
//!
//! let reloader = LiveReloader::new(config)?;
//! reloader.start_watcher_task()?;
//!
//! // Enter the server loop as usual.
//! # Ok::<(), livereload::ReloadError>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod reloader;
pub mod restart;
pub mod signature;
pub mod watcher;

// Re-exports for convenience
pub use config::{ReloadMode, WatcherConfig};
pub use discovery::{discover, ModuleEntry, ModuleSource, ProcessModules, StaticModules};
pub use error::{ReloadError, Result};
pub use reloader::{LiveReloader, ReloaderState};
pub use restart::{Invocation, ProcessRestarter, Restarter};
pub use signature::{has_changed, Signature};
pub use watcher::{PollCycle, TrackedFileSet, WatcherLoop};
