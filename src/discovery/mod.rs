//! File set discovery — which files back the running program right now.
//!
//! A discovery pass is a read-only snapshot: ask the [`ModuleSource`] for
//! loaded modules, keep those with an existing backing file, drop excluded
//! paths, then union in the configured extra files and directories.

pub mod modules;

use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::config::WatcherConfig;
use crate::error::ReloadError;

pub use modules::{parse_proc_maps, ModuleEntry, ModuleSource, ProcessModules, StaticModules};

/// Enumerate the absolute paths of every file to track this cycle.
///
/// Never fails: modules without a file, files deleted mid-run, and
/// unreadable directory entries are omitted.
pub fn discover(
    config: &WatcherConfig,
    source: &dyn ModuleSource,
    working_dir: &Path,
) -> BTreeSet<PathBuf> {
    let mut files = BTreeSet::new();

    match source.modules() {
        Ok(modules) => {
            for module in modules {
                let Some(path) = module.path else {
                    trace!(module = %module.name, "module has no backing file");
                    continue;
                };
                let path = absolutize(&path, working_dir);

                if config.working_dir_only && !path.starts_with(working_dir) {
                    continue;
                }
                if config.is_excluded(&path) || !path.is_file() {
                    continue;
                }
                files.insert(path);
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to list loaded modules");
        }
    }

    let extra_roots = shortest_paths(
        config
            .extra_paths
            .iter()
            .map(|p| absolutize(p, working_dir)),
    );

    for root in extra_roots {
        if root.is_dir() {
            expand_dir(&root, config, &mut files);
        } else if root.is_file() && !config.is_excluded(&root) {
            files.insert(root);
        } else {
            debug!(path = %root.display(), "extra path does not exist");
        }
    }

    files
}

/// Walk `root` recursively, adding every regular file that is not excluded.
fn expand_dir(root: &Path, config: &WatcherConfig, files: &mut BTreeSet<PathBuf>) {
    // Registered directories are taken whole: no hidden-file or ignore-file filtering.
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        match entry {
            Ok(entry) => {
                if !entry.file_type().map_or(false, |ft| ft.is_file()) {
                    continue;
                }
                if config.is_excluded(entry.path()) {
                    continue;
                }
                files.insert(entry.into_path());
            }
            Err(e) => {
                let err = ReloadError::Discovery(e.to_string());
                debug!(root = %root.display(), error = %err, "skipping unreadable entry");
            }
        }
    }
}

/// Reduce a set of paths to those not nested inside another member.
///
/// E.g. given `/srv/app` and `/srv/app/src`, only `/srv/app` is kept.
pub fn shortest_paths<I>(paths: I) -> BTreeSet<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let sorted: BTreeSet<PathBuf> = paths.into_iter().collect();
    let mut kept = BTreeSet::new();
    let mut last: Option<PathBuf> = None;

    // Component-wise ordering places every descendant right after its ancestor.
    for path in sorted {
        if let Some(ancestor) = &last {
            if path.starts_with(ancestor) {
                continue;
            }
        }
        last = Some(path.clone());
        kept.insert(path);
    }

    kept
}

fn absolutize(path: &Path, working_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_shortest_paths() {
        let kept = shortest_paths(
            ["/home/dev/app/src", "/home/dev/app", "/home/dev/app-old", "/usr/lib", "/home/dev/app/src/bin"]
                .into_iter()
                .map(PathBuf::from),
        );
        let expected: BTreeSet<PathBuf> = ["/home/dev/app", "/home/dev/app-old", "/usr/lib"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_shortest_paths_empty() {
        assert!(shortest_paths(Vec::<PathBuf>::new()).is_empty());
    }

    #[test]
    fn test_discover_skips_builtin_and_missing() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("main.rs");
        touch(&main);

        let source = StaticModules::new(vec![
            ModuleEntry::builtin("sys"),
            ModuleEntry::file(&main),
            ModuleEntry::file(dir.path().join("deleted.rs")),
        ]);

        let files = discover(&WatcherConfig::default(), &source, dir.path());
        assert_eq!(files.into_iter().collect::<Vec<_>>(), vec![main]);
    }

    #[test]
    fn test_discover_applies_excludes() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("app/main.src");
        let lib = dir.path().join("deps/lib.src");
        touch(&main);
        touch(&lib);

        let source = StaticModules::from_paths([&main, &lib]);
        let config = WatcherConfig::default().with_exclude_pattern("/deps/");

        let files = discover(&config, &source, dir.path());
        assert!(files.contains(&main));
        assert!(!files.contains(&lib));
    }

    #[test]
    fn test_discover_relative_module_paths() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("src/lib.rs"));

        let source = StaticModules::from_paths(["src/lib.rs"]);
        let files = discover(&WatcherConfig::default(), &source, dir.path());
        assert!(files.contains(&dir.path().join("src/lib.rs")));
    }

    #[test]
    fn test_discover_working_dir_only() {
        let inside = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let a = inside.path().join("a.rs");
        let b = outside.path().join("b.rs");
        touch(&a);
        touch(&b);

        let source = StaticModules::from_paths([&a, &b]);

        let all = discover(&WatcherConfig::default(), &source, inside.path());
        assert_eq!(all.len(), 2);

        let config = WatcherConfig::default().with_working_dir_only(true);
        let local = discover(&config, &source, inside.path());
        assert_eq!(local.into_iter().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_discover_expands_extra_dirs() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("templates/index.html"));
        touch(&dir.path().join("templates/partials/nav.html"));
        touch(&dir.path().join("templates/.hidden"));
        touch(&dir.path().join("templates/vendor/big.js"));
        touch(&dir.path().join("settings.toml"));

        let config = WatcherConfig::default()
            .with_extra_path("templates")
            .with_extra_path("templates/partials")
            .with_extra_path("settings.toml")
            .with_extra_path("missing.toml")
            .with_exclude_pattern("/vendor/");

        let files = discover(&config, &StaticModules::default(), dir.path());
        let names: BTreeSet<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        let expected: BTreeSet<PathBuf> = [
            "templates/index.html",
            "templates/partials/nav.html",
            "templates/.hidden",
            "settings.toml",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_discover_empty() {
        let dir = TempDir::new().unwrap();
        let files = discover(&WatcherConfig::default(), &StaticModules::default(), dir.path());
        assert!(files.is_empty());
    }
}
