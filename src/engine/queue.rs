// src/engine/queue.rs

use std::collections::HashSet;
use std::mem;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Paths reported as changed since the last flush.
///
/// Semantics:
/// - A path is held at most once, however many notifications named it.
/// - `take()` swaps the contents out for an empty queue and returns the
///   paths in the order they were first inserted.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    order: Vec<PathBuf>,
    pending: HashSet<PathBuf>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a changed path. Returns `false` if it was already pending.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        if self.pending.contains(&path) {
            return false;
        }
        self.pending.insert(path.clone());
        self.order.push(path);
        true
    }

    /// Drain the queue, leaving it empty.
    pub fn take(&mut self) -> Vec<PathBuf> {
        self.pending.clear();
        let drained = mem::take(&mut self.order);
        debug!(drained = drained.len(), "drained change queue");
        drained
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.order.clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.pending.contains(path)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_collapse() {
        let mut q = ChangeQueue::new();
        assert!(q.insert(PathBuf::from("/a")));
        assert!(q.insert(PathBuf::from("/b")));
        assert!(!q.insert(PathBuf::from("/a")));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn take_returns_first_insertion_order_and_empties() {
        let mut q = ChangeQueue::new();
        for p in ["/c", "/a", "/c", "/b", "/a"] {
            q.insert(PathBuf::from(p));
        }
        let drained = q.take();
        assert_eq!(
            drained,
            vec![PathBuf::from("/c"), PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert!(q.is_empty());

        // Paths can be queued again after a flush.
        assert!(q.insert(PathBuf::from("/a")));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut q = ChangeQueue::new();
        q.insert(PathBuf::from("/a"));
        q.clear();
        assert!(q.is_empty());
        assert!(!q.contains(Path::new("/a")));
    }
}
