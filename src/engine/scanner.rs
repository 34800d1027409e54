// src/engine/scanner.rs

use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::engine::prober::{ProbeReport, ProbeScope, Prober};
use crate::engine::stop::StopSignal;
use crate::fs::FileSystem;
use crate::watch::WatchRegistry;

/// Walk the whole tree below `root`, fixing every entry and registering
/// every directory.
///
/// One pass visits each reachable entry once. Directories that are already
/// registered are descended into but not subscribed again, so a rescan keeps
/// exactly one subscription per directory. A completed pass also releases
/// every subscription for a directory it did not reach (moved away, or
/// deleted without a notification). An interrupted pass releases nothing.
///
/// The scan is not atomic: changes reported while it runs are queued and
/// handled by the next flush.
pub fn scan_from(
    fs: &dyn FileSystem,
    registry: &mut WatchRegistry,
    root: &Path,
    stop: &StopSignal,
) -> ProbeReport {
    info!(root = %root.display(), "full scan started");
    let started = Instant::now();

    let (report, reached) = Prober::new(fs, registry)
        .with_stop_signal(stop.clone())
        .walk(root, ProbeScope::Everything);

    let released = if report.interrupted {
        0
    } else {
        registry.unregister_unreached(&reached)
    };

    info!(
        root = %root.display(),
        checked = report.checked,
        corrected = report.corrected,
        vanished = report.vanished,
        failures = report.failures,
        released,
        interrupted = report.interrupted,
        watched_dirs = registry.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "full scan finished"
    );
    report
}
