// src/engine/watcher.rs

//! The watcher state machine.
//!
//! `Watcher` owns everything that changes while permwatch runs: the watch
//! registry, the change queue and the scheduled jobs. It is driven by
//! [`Watcher::handle`] from a single task, so none of that state needs a
//! lock. The async side (`engine::runtime::Runtime`) only moves events
//! from the channel into `handle`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ScheduleConfig;
use crate::engine::prober::{ProbeReport, ProbeScope, Prober};
use crate::engine::queue::ChangeQueue;
use crate::engine::scanner::scan_from;
use crate::engine::scheduler::Scheduler;
use crate::engine::stop::StopSignal;
use crate::engine::{RescanReason, RuntimeEvent};
use crate::errors::{PermwatchError, Result};
use crate::fs::FileSystem;
use crate::watch::{WatchBackend, WatchRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Running,
}

#[derive(Debug)]
pub struct Watcher {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    registry: WatchRegistry,
    queue: ChangeQueue,
    scheduler: Scheduler,
    schedule: ScheduleConfig,
    events_tx: mpsc::UnboundedSender<RuntimeEvent>,
    stop: StopSignal,
    state: WatcherState,
}

impl Watcher {
    /// Build a stopped watcher for `root`.
    ///
    /// `events_tx` is handed to the scheduled jobs; it should be the sending
    /// half of the channel the runtime reads from.
    pub fn new(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        backend: Box<dyn WatchBackend>,
        schedule: ScheduleConfig,
        events_tx: mpsc::UnboundedSender<RuntimeEvent>,
    ) -> Self {
        Self {
            root: root.into(),
            fs,
            registry: WatchRegistry::new(backend),
            queue: ChangeQueue::new(),
            scheduler: Scheduler::new(),
            schedule,
            events_tx,
            stop: StopSignal::new(),
            state: WatcherState::Stopped,
        }
    }

    /// `Stopped → Running`: scan the whole tree once, then arm the flush and
    /// rescan jobs. Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<ProbeReport> {
        if self.state == WatcherState::Running {
            return Err(PermwatchError::AlreadyRunning);
        }

        info!(root = %self.root.display(), "watcher starting");
        self.stop.reset();
        self.state = WatcherState::Running;
        let report = self.full_scan();
        self.scheduler.arm(&self.schedule, self.events_tx.clone());
        Ok(report)
    }

    /// `Running → Stopped`: forget queued changes, cancel both jobs and
    /// release every subscription. A no-op when already stopped.
    ///
    /// Nothing new is scheduled afterwards, but job firings or notifications
    /// already in the channel are still delivered; [`Watcher::handle`] drops
    /// them while stopped.
    pub fn stop(&mut self) {
        if self.state == WatcherState::Stopped {
            return;
        }

        info!(root = %self.root.display(), "watcher stopping");
        self.stop.raise();
        self.queue.clear();
        self.scheduler.cancel_all();
        self.registry.unregister_all();
        self.state = WatcherState::Stopped;
    }

    /// Feed one runtime event in. Returns `false` once the runtime should
    /// exit.
    pub fn handle(&mut self, event: RuntimeEvent) -> bool {
        match event {
            RuntimeEvent::PathChanged { path } => {
                self.path_changed(path);
            }
            RuntimeEvent::FlushDue => {
                if self.is_running() {
                    self.flush();
                }
            }
            RuntimeEvent::RescanDue { reason } => {
                if self.is_running() {
                    if reason == RescanReason::EventOverflow {
                        warn!("change notifications were lost; rescanning");
                    }
                    self.full_scan();
                }
            }
            RuntimeEvent::ShutdownRequested => {
                info!("shutdown requested, stopping watcher");
                self.stop();
                return false;
            }
        }
        true
    }

    /// Queue a path reported by the watch backend.
    ///
    /// Ignored while stopped, and for paths outside every subscribed
    /// directory (late events for a directory that was just unregistered).
    pub fn path_changed(&mut self, path: PathBuf) -> bool {
        if !self.is_running() || !self.registry.covers(&path) {
            debug!(path = %path.display(), "ignoring change outside watched directories");
            return false;
        }
        let inserted = self.queue.insert(path.clone());
        if inserted {
            debug!(path = %path.display(), "queued changed path");
        }
        inserted
    }

    /// Swap the change queue for an empty one and probe every drained path.
    pub fn flush(&mut self) -> ProbeReport {
        let paths = self.queue.take();
        let mut report = ProbeReport::default();
        if paths.is_empty() {
            return report;
        }

        debug!(paths = paths.len(), "flushing changed paths");
        for path in &paths {
            report.merge(self.probe(path));
        }
        if report.corrected > 0 || report.failures > 0 {
            info!(
                paths = paths.len(),
                corrected = report.corrected,
                failures = report.failures,
                "flush finished"
            );
        }
        report
    }

    /// Re-walk the tree from the root.
    pub fn full_scan(&mut self) -> ProbeReport {
        scan_from(self.fs.as_ref(), &mut self.registry, &self.root, &self.stop)
    }

    /// Change-driven probe of one path; only newly seen directories are
    /// expanded.
    pub fn probe(&mut self, path: &Path) -> ProbeReport {
        Prober::new(self.fs.as_ref(), &mut self.registry)
            .with_stop_signal(self.stop.clone())
            .run(path, ProbeScope::NewDirectories)
    }

    /// Handle for interrupting a scan or flush from another thread. Raising
    /// it makes the current pass return early; it does not stop the watcher
    /// by itself.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == WatcherState::Running
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &ChangeQueue {
        &self.queue
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
