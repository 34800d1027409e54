// src/watch/registry.rs

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::report_failure;
use crate::watch::backend::{Subscription, WatchBackend};

/// A directory under active change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedPath {
    pub path: PathBuf,
    pub subscription: Subscription,
}

/// Tracks which directories currently have a subscription.
///
/// A path is a key if and only if the backend holds an active subscription
/// for it; there is never more than one subscription per path.
#[derive(Debug)]
pub struct WatchRegistry {
    backend: Box<dyn WatchBackend>,
    watching: HashMap<PathBuf, WatchedPath>,
}

impl WatchRegistry {
    pub fn new(backend: Box<dyn WatchBackend>) -> Self {
        Self {
            backend,
            watching: HashMap::new(),
        }
    }

    /// Subscribe to changes under `dir`.
    ///
    /// Returns `true` if a new subscription was created. A directory that is
    /// already registered is left alone. A failed subscription is reported
    /// and nothing is recorded, so a later probe will try again.
    pub fn register(&mut self, dir: &Path) -> bool {
        if self.watching.contains_key(dir) {
            return false;
        }

        match self.backend.subscribe(dir) {
            Ok(subscription) => {
                info!(dir = %dir.display(), "watching directory");
                self.watching.insert(
                    dir.to_path_buf(),
                    WatchedPath {
                        path: dir.to_path_buf(),
                        subscription,
                    },
                );
                true
            }
            Err(err) => {
                report_failure(dir, &err);
                false
            }
        }
    }

    /// Release the subscription for `dir`, if any.
    pub fn unregister(&mut self, dir: &Path) {
        let Some(watched) = self.watching.remove(dir) else {
            return;
        };
        debug!(dir = %dir.display(), "no longer watching directory");
        if let Err(err) = self.backend.unsubscribe(&watched.path, watched.subscription) {
            report_failure(&watched.path, &err);
        }
    }

    /// Release `dir` and every registered directory below it.
    pub fn unregister_tree(&mut self, dir: &Path) {
        let doomed: Vec<PathBuf> = self
            .watching
            .keys()
            .filter(|path| path.starts_with(dir))
            .cloned()
            .collect();
        for path in doomed {
            self.unregister(&path);
        }
    }

    /// Release every subscription whose directory is not in `reached`.
    /// Returns how many were released.
    pub fn unregister_unreached(&mut self, reached: &HashSet<PathBuf>) -> usize {
        let stale: Vec<PathBuf> = self
            .watching
            .keys()
            .filter(|path| !reached.contains(*path))
            .cloned()
            .collect();
        for path in &stale {
            self.unregister(path);
        }
        stale.len()
    }

    /// Release every subscription.
    pub fn unregister_all(&mut self) {
        let released = self.watching.len();
        for (_, watched) in self.watching.drain() {
            if let Err(err) = self.backend.unsubscribe(&watched.path, watched.subscription) {
                report_failure(&watched.path, &err);
            }
        }
        debug!(released, "released all directory watches");
    }

    pub fn is_registered(&self, dir: &Path) -> bool {
        self.watching.contains_key(dir)
    }

    /// Whether a notification naming `path` can have come from one of our
    /// subscriptions: either the watched directory itself or a direct child.
    pub fn covers(&self, path: &Path) -> bool {
        self.watching.contains_key(path)
            || path.parent().is_some_and(|parent| self.watching.contains_key(parent))
    }

    pub fn subscription_of(&self, dir: &Path) -> Option<Subscription> {
        self.watching.get(dir).map(|watched| watched.subscription)
    }

    pub fn len(&self) -> usize {
        self.watching.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watching.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.watching.keys().map(PathBuf::as_path)
    }
}
