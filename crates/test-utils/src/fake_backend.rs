//! A `WatchBackend` that records subscriptions instead of watching.
//!
//! Tests keep a clone of the shared state to check which directories are
//! subscribed, and how often, while the watcher owns the backend itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use permwatch::watch::{Subscription, WatchBackend};

#[derive(Debug, Default)]
struct Recorded {
    active: HashMap<PathBuf, Subscription>,
    subscribe_calls: Vec<PathBuf>,
    unsubscribe_calls: Vec<PathBuf>,
    refused: Vec<PathBuf>,
    next_id: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future subscription of `dir` fail.
    pub fn refuse(&self, dir: impl AsRef<Path>) {
        self.state.lock().unwrap().refused.push(dir.as_ref().to_path_buf());
    }

    /// Directories with a live subscription, sorted.
    pub fn active(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.state.lock().unwrap().active.keys().cloned().collect();
        dirs.sort();
        dirs
    }

    pub fn is_active(&self, dir: impl AsRef<Path>) -> bool {
        self.state.lock().unwrap().active.contains_key(dir.as_ref())
    }

    pub fn subscribe_count(&self, dir: impl AsRef<Path>) -> usize {
        let state = self.state.lock().unwrap();
        state.subscribe_calls.iter().filter(|d| d.as_path() == dir.as_ref()).count()
    }

    pub fn total_subscribes(&self) -> usize {
        self.state.lock().unwrap().subscribe_calls.len()
    }

    pub fn total_unsubscribes(&self) -> usize {
        self.state.lock().unwrap().unsubscribe_calls.len()
    }
}

impl WatchBackend for RecordingBackend {
    fn subscribe(&mut self, dir: &Path) -> Result<Subscription> {
        let mut state = self.state.lock().unwrap();
        if state.refused.iter().any(|d| d == dir) {
            return Err(anyhow!("subscription refused for {:?}", dir));
        }
        if state.active.contains_key(dir) {
            return Err(anyhow!("duplicate subscription for {:?}", dir));
        }
        state.next_id += 1;
        let subscription = Subscription::new(state.next_id);
        state.active.insert(dir.to_path_buf(), subscription);
        state.subscribe_calls.push(dir.to_path_buf());
        Ok(subscription)
    }

    fn unsubscribe(&mut self, dir: &Path, subscription: Subscription) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.unsubscribe_calls.push(dir.to_path_buf());
        match state.active.remove(dir) {
            Some(active) if active == subscription => Ok(()),
            Some(other) => Err(anyhow!(
                "unsubscribe of {:?} with subscription {} but {} is active",
                dir,
                subscription.id(),
                other.id()
            )),
            None => Err(anyhow!("unsubscribe of {:?} which is not subscribed", dir)),
        }
    }
}
