//! Ready-made watcher setups for tests.

use std::sync::Arc;
use std::time::Duration;

use permwatch::config::ScheduleConfig;
use permwatch::engine::{RuntimeEvent, Watcher};
use permwatch::fs::mock::MockFileSystem;
use tokio::sync::mpsc;

use crate::fake_backend::RecordingBackend;

/// A watcher on `/` of a mock tree, with handles to everything a test wants
/// to look at.
pub struct WatcherHarness {
    pub watcher: Watcher,
    pub fs: MockFileSystem,
    pub backend: RecordingBackend,
    pub events_tx: mpsc::UnboundedSender<RuntimeEvent>,
    pub events_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
}

impl WatcherHarness {
    pub fn new(fs: MockFileSystem) -> Self {
        Self::with_schedule(fs, ScheduleConfig::default())
    }

    /// Harness whose flush job fires every `period`.
    pub fn with_flush_every(fs: MockFileSystem, period: Duration) -> Self {
        let schedule = ScheduleConfig {
            flush_interval: period,
            ..ScheduleConfig::default()
        };
        Self::with_schedule(fs, schedule)
    }

    pub fn with_schedule(fs: MockFileSystem, schedule: ScheduleConfig) -> Self {
        let backend = RecordingBackend::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let watcher = Watcher::new(
            "/",
            Arc::new(fs.clone()),
            Box::new(backend.clone()),
            schedule,
            events_tx.clone(),
        );
        Self {
            watcher,
            fs,
            backend,
            events_tx,
            events_rx,
        }
    }
}

/// Mock tree used by several tests:
///
/// ```text
/// /            0755
/// /docs        0755
/// /docs/a.txt  0644
/// /docs/old    0700
/// /docs/old/b  0600
/// /bin         0750
/// /bin/tool    0740
/// ```
pub fn sample_tree() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_dir("/docs", 0o755);
    fs.add_file("/docs/a.txt", 0o644);
    fs.add_dir("/docs/old", 0o700);
    fs.add_file("/docs/old/b", 0o600);
    fs.add_dir("/bin", 0o750);
    fs.add_file("/bin/tool", 0o740);
    fs
}
