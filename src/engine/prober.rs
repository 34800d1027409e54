// src/engine/prober.rs

//! Entry prober: bring one path (and, for new directories, everything below
//! it) in line with the permission policy.
//!
//! A probe never fails as a whole. A path that vanished is deregistered and
//! skipped silently; any other error is reported for that path and the sweep
//! continues with the next one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::engine::stop::StopSignal;
use crate::errors::{is_not_found, report_failure};
use crate::fs::{EntryStat, FileSystem};
use crate::policy::corrected_mode;
use crate::watch::WatchRegistry;

/// Which directories a probe descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeScope {
    /// Change-driven probes. The probed path itself is subscribed afresh if
    /// it is a watched directory; below it, only directories not yet in the
    /// registry are expanded.
    NewDirectories,
    /// Every directory reached, registered or not (full scans).
    Everything,
}

/// Counters for one probe run, used for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Entries opened successfully.
    pub checked: usize,
    /// Entries whose mode was changed.
    pub corrected: usize,
    /// Paths that no longer existed.
    pub vanished: usize,
    /// Reported failures (open, stat, chmod, close, listing).
    pub failures: usize,
    /// The run gave up early because a stop was requested.
    pub interrupted: bool,
}

impl ProbeReport {
    pub fn merge(&mut self, other: ProbeReport) {
        self.checked += other.checked;
        self.corrected += other.corrected;
        self.vanished += other.vanished;
        self.failures += other.failures;
        self.interrupted |= other.interrupted;
    }
}

/// Borrowed view over the filesystem and the watch registry for the
/// duration of one probe.
#[derive(Debug)]
pub struct Prober<'a> {
    fs: &'a dyn FileSystem,
    registry: &'a mut WatchRegistry,
    stop: StopSignal,
    reached: HashSet<PathBuf>,
    report: ProbeReport,
}

impl<'a> Prober<'a> {
    pub fn new(fs: &'a dyn FileSystem, registry: &'a mut WatchRegistry) -> Self {
        Self {
            fs,
            registry,
            stop: StopSignal::new(),
            reached: HashSet::new(),
            report: ProbeReport::default(),
        }
    }

    /// Give up between entries once `stop` is raised.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Probe `path` and expand directories according to `scope`.
    pub fn run(self, path: &Path, scope: ProbeScope) -> ProbeReport {
        self.walk(path, scope).0
    }

    /// Like [`Prober::run`], also returning every directory the walk got to
    /// (symlinks excluded).
    ///
    /// Descent uses an explicit worklist, so deep trees do not grow the call
    /// stack. No order is guaranteed between siblings.
    pub fn walk(mut self, path: &Path, scope: ProbeScope) -> (ProbeReport, HashSet<PathBuf>) {
        let mut pending: Vec<PathBuf> = vec![path.to_path_buf()];

        while let Some(current) = pending.pop() {
            if self.stop.is_raised() {
                debug!(
                    path = %current.display(),
                    remaining = pending.len() + 1,
                    "probe interrupted"
                );
                self.report.interrupted = true;
                break;
            }

            let Some(stat) = self.fix_entry(&current) else {
                continue;
            };
            if !stat.is_dir || self.fs.is_symlink(&current) {
                // A directory replaced by something else takes its watches along.
                if self.registry.is_registered(&current) {
                    self.registry.unregister_tree(&current);
                }
                continue;
            }
            self.reached.insert(current.clone());

            // The kernel drops a watch together with its directory, so a
            // watched directory reported as changed may hold a dead
            // subscription under a live name.
            if scope == ProbeScope::NewDirectories && current.as_path() == path {
                self.registry.unregister(&current);
            }

            let newly_registered = self.registry.register(&current);
            let expand = match scope {
                ProbeScope::Everything => true,
                // A directory we could not subscribe is still expanded; it
                // stays unregistered and will be retried on the next probe.
                ProbeScope::NewDirectories => {
                    newly_registered || !self.registry.is_registered(&current)
                }
            };
            if expand {
                self.list_children(&current, &mut pending);
            }
        }

        (self.report, self.reached)
    }

    /// Open, stat, correct and close one entry. Returns its stat if the entry
    /// could be inspected.
    fn fix_entry(&mut self, path: &Path) -> Option<EntryStat> {
        debug!(path = %path.display(), "checking path");

        let mut handle = match self.fs.open(path) {
            Ok(handle) => handle,
            Err(err) if is_not_found(&err) => {
                self.forget(path);
                return None;
            }
            Err(err) => {
                self.fail(path, &err);
                return None;
            }
        };
        self.report.checked += 1;

        let stat = match handle.stat() {
            Ok(stat) => Some(stat),
            Err(err) => {
                self.fail(path, &err);
                None
            }
        };

        if let Some(stat) = stat {
            let new_mode = corrected_mode(stat.mode);
            if new_mode != stat.mode {
                info!(
                    path = %path.display(),
                    old_mode = %format!("{:o}", stat.mode & 0o7777),
                    new_mode = %format!("{:o}", new_mode & 0o7777),
                    "applying new mode"
                );
                match handle.set_mode(new_mode) {
                    Ok(()) => self.report.corrected += 1,
                    Err(err) => self.fail(path, &err),
                }
            }
        }

        if let Err(err) = handle.close() {
            self.fail(path, &err);
        }

        stat
    }

    fn list_children(&mut self, dir: &Path, pending: &mut Vec<PathBuf>) {
        let listing = self.fs.read_dir(dir);
        // Whatever was enumerated is probed, even if the listing broke off.
        pending.extend(listing.entries);

        if let Some(err) = listing.error {
            if is_not_found(&err) {
                self.forget(dir);
            } else {
                self.fail(dir, &err);
            }
        }
    }

    fn forget(&mut self, path: &Path) {
        debug!(path = %path.display(), "path vanished before it could be checked");
        self.report.vanished += 1;
        // A renamed or deleted directory takes its subdirectories with it.
        if self.registry.is_registered(path) {
            self.registry.unregister_tree(path);
        }
    }

    fn fail(&mut self, path: &Path, err: &anyhow::Error) {
        self.report.failures += 1;
        report_failure(path, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::watch::DetachedBackend;
    use std::io;

    fn registry() -> WatchRegistry {
        WatchRegistry::new(Box::new(DetachedBackend::default()))
    }

    #[test]
    fn file_modes_are_corrected() {
        let fs = MockFileSystem::new();
        fs.add_file("/plain", 0o644);
        fs.add_file("/script", 0o740);
        let mut reg = registry();

        Prober::new(&fs, &mut reg).run(Path::new("/plain"), ProbeScope::NewDirectories);
        Prober::new(&fs, &mut reg).run(Path::new("/script"), ProbeScope::NewDirectories);

        assert_eq!(fs.mode_of("/plain"), Some(0o666));
        assert_eq!(fs.mode_of("/script"), Some(0o777));
        assert!(reg.is_empty());
    }

    #[test]
    fn compliant_entry_is_not_touched() {
        let fs = MockFileSystem::new();
        fs.add_file("/ok", 0o666);
        let mut reg = registry();

        let report = Prober::new(&fs, &mut reg).run(Path::new("/ok"), ProbeScope::NewDirectories);

        assert_eq!(report.checked, 1);
        assert_eq!(report.corrected, 0);
        assert!(fs.chmods().is_empty());
    }

    #[test]
    fn new_directory_is_registered_and_expanded() {
        let fs = MockFileSystem::new();
        fs.add_dir("/d", 0o755);
        fs.add_file("/d/f", 0o600);
        fs.add_dir("/d/sub", 0o700);
        fs.add_file("/d/sub/g", 0o604);
        let mut reg = registry();

        let report = Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::NewDirectories);

        assert_eq!(fs.mode_of("/d"), Some(0o777));
        assert_eq!(fs.mode_of("/d/f"), Some(0o666));
        assert_eq!(fs.mode_of("/d/sub"), Some(0o777));
        assert_eq!(fs.mode_of("/d/sub/g"), Some(0o666));
        assert!(reg.is_registered(Path::new("/d")));
        assert!(reg.is_registered(Path::new("/d/sub")));
        assert_eq!(report.checked, 4);
        assert_eq!(report.corrected, 4);
    }

    #[test]
    fn registered_directory_is_resubscribed_but_its_watched_children_are_not_expanded() {
        let fs = MockFileSystem::new();
        fs.add_dir("/d", 0o777);
        fs.add_file("/d/f", 0o666);
        fs.add_dir("/d/sub", 0o777);
        fs.add_file("/d/sub/g", 0o666);
        let mut reg = registry();
        reg.register(Path::new("/d"));
        reg.register(Path::new("/d/sub"));
        let first = reg.subscription_of(Path::new("/d"));

        Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::NewDirectories);

        assert_ne!(reg.subscription_of(Path::new("/d")), first);
        assert_eq!(fs.open_count("/d/f"), 1);
        assert_eq!(fs.open_count("/d/sub"), 1);
        assert_eq!(fs.open_count("/d/sub/g"), 0);

        Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::Everything);
        assert_eq!(fs.open_count("/d/sub/g"), 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn vanished_directory_releases_its_subdirectories() {
        let fs = MockFileSystem::new();
        fs.add_dir("/d/sub/deeper", 0o777);
        fs.add_dir("/dx", 0o777);
        let mut reg = registry();
        Prober::new(&fs, &mut reg).run(Path::new("/"), ProbeScope::Everything);
        assert_eq!(reg.len(), 5);

        fs.remove("/d");
        Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::NewDirectories);

        let mut left: Vec<_> = reg.paths().map(Path::to_path_buf).collect();
        left.sort();
        assert_eq!(left, vec![PathBuf::from("/"), PathBuf::from("/dx")]);
    }

    #[test]
    fn directory_replaced_by_a_file_is_unwatched() {
        let fs = MockFileSystem::new();
        fs.add_dir("/d/sub", 0o777);
        let mut reg = registry();
        Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::NewDirectories);

        fs.remove("/d");
        fs.add_file("/d", 0o666);
        Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::NewDirectories);

        assert!(reg.is_empty());
    }

    #[test]
    fn raised_stop_signal_ends_the_walk_between_entries() {
        let fs = MockFileSystem::new();
        fs.add_file("/d/f", 0o600);
        let mut reg = registry();
        let stop = StopSignal::new();
        stop.raise();

        let report = Prober::new(&fs, &mut reg)
            .with_stop_signal(stop)
            .run(Path::new("/d"), ProbeScope::NewDirectories);

        assert!(report.interrupted);
        assert_eq!(report.checked, 0);
        assert_eq!(fs.open_count("/d"), 0);
    }

    #[test]
    fn vanished_path_is_deregistered_without_failure() {
        let fs = MockFileSystem::new();
        fs.add_dir("/gone", 0o777);
        let mut reg = registry();
        reg.register(Path::new("/gone"));
        fs.remove("/gone");

        let report = Prober::new(&fs, &mut reg).run(Path::new("/gone"), ProbeScope::NewDirectories);

        assert!(!reg.is_registered(Path::new("/gone")));
        assert_eq!(report.vanished, 1);
        assert_eq!(report.failures, 0);
    }

    #[test]
    fn open_failure_aborts_only_that_path() {
        let fs = MockFileSystem::new();
        fs.add_dir("/d", 0o755);
        fs.add_file("/d/locked", 0o600);
        fs.add_file("/d/open", 0o600);
        fs.fail_open("/d/locked", io::ErrorKind::PermissionDenied);
        let mut reg = registry();

        let report = Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::NewDirectories);

        assert_eq!(report.failures, 1);
        assert_eq!(fs.mode_of("/d/locked"), Some(0o600));
        assert_eq!(fs.mode_of("/d/open"), Some(0o666));
    }

    #[test]
    fn chmod_and_close_failures_are_reported_and_descent_continues() {
        let fs = MockFileSystem::new();
        fs.add_dir("/d", 0o700);
        fs.add_file("/d/f", 0o600);
        fs.fail_chmod("/d");
        fs.fail_close("/d/f");
        let mut reg = registry();

        let report = Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::NewDirectories);

        assert_eq!(report.failures, 2);
        assert_eq!(fs.mode_of("/d"), Some(0o700));
        assert_eq!(fs.mode_of("/d/f"), Some(0o666));
        assert!(reg.is_registered(Path::new("/d")));
    }

    #[test]
    fn partial_listing_still_probes_enumerated_children() {
        let fs = MockFileSystem::new();
        fs.add_dir("/d", 0o777);
        fs.add_file("/d/a", 0o600);
        fs.add_file("/d/b", 0o600);
        fs.add_file("/d/c", 0o600);
        fs.fail_listing_after("/d", 2);
        let mut reg = registry();

        let report = Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::NewDirectories);

        assert_eq!(report.failures, 1);
        assert_eq!(fs.mode_of("/d/a"), Some(0o666));
        assert_eq!(fs.mode_of("/d/b"), Some(0o666));
        assert_eq!(fs.mode_of("/d/c"), Some(0o600));
    }

    #[test]
    fn symlinked_directories_are_fixed_but_not_descended() {
        let fs = MockFileSystem::new();
        fs.add_dir("/d", 0o755);
        fs.add_symlink("/d/loop", "/d");
        let mut reg = registry();

        Prober::new(&fs, &mut reg).run(Path::new("/d"), ProbeScope::Everything);

        assert!(reg.is_registered(Path::new("/d")));
        assert!(!reg.is_registered(Path::new("/d/loop")));
        assert_eq!(fs.open_count("/d/loop"), 1);
    }
}
