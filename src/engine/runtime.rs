// src/engine/runtime.rs

use std::fmt;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{PermwatchError, Result};

use super::watcher::Watcher;
use super::RuntimeEvent;

/// Drives a [`Watcher`] from the runtime event channel.
///
/// Probing is plain blocking filesystem work, so the loop runs on Tokio's
/// blocking pool rather than on an executor thread: the signal handler, the
/// scheduled jobs and the `notify` callback keep running while a scan is in
/// progress. Only that one thread touches the watcher, so probes,
/// notifications and job firings never overlap.
pub struct Runtime {
    watcher: Watcher,
    events_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("watcher", &self.watcher)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(watcher: Watcher, events_rx: mpsc::UnboundedReceiver<RuntimeEvent>) -> Self {
        Self { watcher, events_rx }
    }

    /// Run the event loop until shutdown. Returns the stopped watcher so
    /// callers (and tests) can inspect its final state.
    ///
    /// To cut a long scan short, raise [`Watcher::stop_signal`] before
    /// sending [`RuntimeEvent::ShutdownRequested`].
    pub async fn run(self) -> Result<Watcher> {
        let Runtime { watcher, events_rx } = self;
        tokio::task::spawn_blocking(move || drive(watcher, events_rx))
            .await
            .map_err(|err| PermwatchError::Other(anyhow!("watcher loop panicked: {err}")))?
    }
}

fn drive(
    mut watcher: Watcher,
    mut events_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
) -> Result<Watcher> {
    watcher.start()?;
    info!(root = %watcher.root().display(), "permwatch runtime started");

    while let Some(event) = events_rx.blocking_recv() {
        debug!(?event, "runtime received event");
        if !watcher.handle(event) {
            break;
        }
    }

    watcher.stop();
    info!("runtime exiting");
    Ok(watcher)
}
