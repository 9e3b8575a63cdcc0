//! Module sources — where the list of loaded modules comes from.

use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::{ReloadError, Result};

/// Marker the kernel appends to a mapping whose file was replaced on disk.
const DELETED_SUFFIX: &str = " (deleted)";

/// One loaded module of the running program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    pub name: String,
    /// Backing file, or `None` for modules that have no on-disk file.
    pub path: Option<PathBuf>,
}

impl ModuleEntry {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path: Some(path),
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }
}

/// Read-only query over the program's loaded modules.
pub trait ModuleSource: Send + Sync {
    fn modules(&self) -> Result<Vec<ModuleEntry>>;
}

/// The modules of the current process: its executable image and, on Linux,
/// every shared object mapped executable into it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessModules;

impl ModuleSource for ProcessModules {
    #[cfg(target_os = "linux")]
    fn modules(&self) -> Result<Vec<ModuleEntry>> {
        let maps = std::fs::read_to_string("/proc/self/maps")
            .map_err(|e| ReloadError::Discovery(format!("/proc/self/maps: {}", e)))?;
        Ok(parse_proc_maps(&maps))
    }

    #[cfg(not(target_os = "linux"))]
    fn modules(&self) -> Result<Vec<ModuleEntry>> {
        let exe = std::env::current_exe()
            .map_err(|e| ReloadError::Discovery(format!("current executable: {}", e)))?;
        Ok(vec![ModuleEntry::file(exe)])
    }
}

/// A fixed, replaceable module list. Useful for embedding hosts that track
/// their own plugin files, and for tests.
#[derive(Debug, Default)]
pub struct StaticModules {
    entries: RwLock<Vec<ModuleEntry>>,
}

impl StaticModules {
    pub fn new(entries: Vec<ModuleEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(paths.into_iter().map(ModuleEntry::file).collect())
    }

    /// Replace the module list, as if modules were loaded or unloaded.
    pub fn set(&self, entries: Vec<ModuleEntry>) {
        match self.entries.write() {
            Ok(mut guard) => *guard = entries,
            Err(poisoned) => *poisoned.into_inner() = entries,
        }
    }
}

impl ModuleSource for StaticModules {
    fn modules(&self) -> Result<Vec<ModuleEntry>> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .map_err(|e| ReloadError::Discovery(format!("module list lock: {}", e)))
    }
}

/// Parse the contents of `/proc/<pid>/maps` into file-backed executable
/// modules, deduplicated and in first-seen order.
///
/// Each line reads `address perms offset dev inode [pathname]`. Anonymous
/// mappings and pseudo entries such as `[vdso]` are dropped.
pub fn parse_proc_maps(maps: &str) -> Vec<ModuleEntry> {
    let mut seen = std::collections::HashSet::new();
    let mut entries = Vec::new();

    for line in maps.lines() {
        let Some((perms, pathname)) = split_maps_line(line) else {
            continue;
        };

        if !perms.contains('x') || !pathname.starts_with('/') {
            continue;
        }

        let pathname = pathname.strip_suffix(DELETED_SUFFIX).unwrap_or(pathname);
        if seen.insert(pathname.to_string()) {
            entries.push(ModuleEntry::file(pathname));
        }
    }

    entries
}

/// Split a maps line into its permission field and its (possibly empty)
/// pathname. The pathname may itself contain spaces.
fn split_maps_line(line: &str) -> Option<(&str, &str)> {
    let mut rest = line;
    let mut perms = "";

    for field in 0..5 {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if field == 1 {
            perms = &rest[..end];
        }
        rest = &rest[end..];
    }

    Some((perms, rest.trim()))
}
