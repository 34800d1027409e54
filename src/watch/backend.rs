// src/watch/backend.rs

//! Pluggable change-notification backend.
//!
//! The registry talks to a `WatchBackend` instead of a raw `notify` watcher,
//! which keeps the registry testable without inotify.
//!
//! - [`NotifyBackend`] subscribes directories on a single shared
//!   `RecommendedWatcher` and forwards every change as a
//!   [`RuntimeEvent::PathChanged`].
//! - [`DetachedBackend`] hands out subscriptions without listening to
//!   anything; it backs `--once` runs where no notification will ever be
//!   consumed.

use std::path::Path;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{RescanReason, RuntimeEvent};

/// Opaque handle for one active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

impl Subscription {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Something that can start and stop change notifications for a directory.
pub trait WatchBackend: Send + std::fmt::Debug {
    /// Begin listening for changes to the immediate children of `dir`.
    fn subscribe(&mut self, dir: &Path) -> Result<Subscription>;

    /// Stop listening for `dir`. Called at most once per subscription.
    fn unsubscribe(&mut self, dir: &Path, subscription: Subscription) -> Result<()>;
}

/// Backend built on `notify`'s platform watcher (inotify on Linux).
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
    next_id: u64,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl NotifyBackend {
    /// Create the platform watcher. Its callback runs on a thread owned by
    /// `notify` and only forwards events into `events_tx`.
    pub fn new(events_tx: mpsc::UnboundedSender<RuntimeEvent>) -> crate::errors::Result<Self> {
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => forward_event(&events_tx, event),
                Err(err) => warn!(error = %err, "file watch error"),
            },
            Config::default(),
        )?;

        Ok(Self { watcher, next_id: 0 })
    }
}

fn forward_event(events_tx: &mpsc::UnboundedSender<RuntimeEvent>, event: Event) {
    if event.need_rescan() {
        warn!("watch backend dropped events; requesting a full rescan");
        let _ = events_tx.send(RuntimeEvent::RescanDue {
            reason: RescanReason::EventOverflow,
        });
        return;
    }

    // Reads (including our own probes opening the entry) are not changes.
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }

    for path in event.paths {
        if events_tx.send(RuntimeEvent::PathChanged { path }).is_err() {
            debug!("runtime gone; dropping change notification");
            return;
        }
    }
}

impl WatchBackend for NotifyBackend {
    fn subscribe(&mut self, dir: &Path) -> Result<Subscription> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {:?}", dir))?;
        self.next_id += 1;
        Ok(Subscription::new(self.next_id))
    }

    fn unsubscribe(&mut self, dir: &Path, _subscription: Subscription) -> Result<()> {
        match self.watcher.unwatch(dir) {
            Ok(()) => Ok(()),
            // The kernel drops the watch by itself when the directory is deleted.
            Err(err) if matches!(err.kind, notify::ErrorKind::WatchNotFound) => {
                debug!(dir = %dir.display(), "watch already gone");
                Ok(())
            }
            Err(err) => Err(err).with_context(|| format!("unwatching {:?}", dir)),
        }
    }
}

/// Backend that subscribes nothing.
#[derive(Debug, Default)]
pub struct DetachedBackend {
    next_id: u64,
}

impl WatchBackend for DetachedBackend {
    fn subscribe(&mut self, _dir: &Path) -> Result<Subscription> {
        self.next_id += 1;
        Ok(Subscription::new(self.next_id))
    }

    fn unsubscribe(&mut self, _dir: &Path, _subscription: Subscription) -> Result<()> {
        Ok(())
    }
}
