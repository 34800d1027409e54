// src/fs/mock.rs

use super::{DirListing, EntryHandle, EntryStat, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
const MAX_SYMLINK_HOPS: usize = 8;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { mode: u32 },
    Dir { mode: u32, children: Vec<String> }, // List of child names
    Symlink { target: PathBuf },
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    open_failures: HashMap<PathBuf, io::ErrorKind>,
    chmod_failures: HashSet<PathBuf>,
    close_failures: HashSet<PathBuf>,
    // Listing of the key fails after this many entries.
    listing_failures: HashMap<PathBuf, usize>,
    gates: HashMap<PathBuf, OpenGate>,
    chmods: Vec<(PathBuf, u32)>,
    opens: Vec<PathBuf>,
}

/// Holds every `open` of one path until released, standing in for a call
/// that hangs (a stale mount, say).
#[derive(Debug, Clone, Default)]
pub struct OpenGate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

#[derive(Debug, Default)]
struct GateState {
    reached: bool,
    released: bool,
}

impl OpenGate {
    /// Whether an `open` is (or was) waiting at the gate.
    pub fn is_reached(&self) -> bool {
        self.inner.0.lock().unwrap().reached
    }

    pub fn release(&self) {
        let (lock, released) = &*self.inner;
        lock.lock().unwrap().released = true;
        released.notify_all();
    }

    fn pass(&self) {
        let (lock, released) = &*self.inner;
        let mut state = lock.lock().unwrap();
        state.reached = true;
        while !state.released {
            state = released.wait(state).unwrap();
        }
    }
}

/// In-memory tree of absolute paths with permission bits.
///
/// Clones share the same tree, so a test can keep one clone for assertions
/// while the watcher owns another.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    /// A tree holding only `/` with mode `0o755`.
    pub fn new() -> Self {
        let mut state = MockState::default();
        state.entries.insert(
            PathBuf::from("/"),
            MockEntry::Dir {
                mode: 0o755,
                children: Vec::new(),
            },
        );
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, mode: u32) {
        self.insert(path.as_ref(), MockEntry::File { mode });
    }

    pub fn add_dir(&self, path: impl AsRef<Path>, mode: u32) {
        let path = path.as_ref();
        let mut state = self.state.lock().unwrap();
        // Re-adding an existing directory only changes its mode.
        if let Some(MockEntry::Dir { mode: existing, .. }) = state.entries.get_mut(path) {
            *existing = mode;
            return;
        }
        drop(state);
        self.insert(
            path,
            MockEntry::Dir {
                mode,
                children: Vec::new(),
            },
        );
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        self.insert(
            path.as_ref(),
            MockEntry::Symlink {
                target: target.as_ref().to_path_buf(),
            },
        );
    }

    /// List `name` under `parent` without creating it, as if it was deleted
    /// right after the directory was read.
    pub fn add_listing_only(&self, parent: impl AsRef<Path>, name: &str) {
        let mut state = self.state.lock().unwrap();
        let parent = parent.as_ref().to_path_buf();
        ensure_dir_entry(&mut state.entries, &parent);
        add_child_name(&mut state.entries, &parent, name);
    }

    /// Remove `path` and everything beneath it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.state.lock().unwrap();
        state.entries.retain(|p, _| !p.starts_with(path));
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(MockEntry::Dir { children, .. }) = state.entries.get_mut(parent) {
                children.retain(|c| c.as_str() != name.to_string_lossy());
            }
        }
    }

    pub fn set_mode(&self, path: impl AsRef<Path>, new_mode: u32) {
        let mut state = self.state.lock().unwrap();
        match state.entries.get_mut(path.as_ref()) {
            Some(MockEntry::File { mode }) | Some(MockEntry::Dir { mode, .. }) => *mode = new_mode,
            _ => {}
        }
    }

    /// Permission bits of `path` (symlinks not followed), if it exists.
    pub fn mode_of(&self, path: impl AsRef<Path>) -> Option<u32> {
        let state = self.state.lock().unwrap();
        match state.entries.get(path.as_ref()) {
            Some(MockEntry::File { mode }) | Some(MockEntry::Dir { mode, .. }) => Some(*mode),
            _ => None,
        }
    }

    pub fn fail_open(&self, path: impl AsRef<Path>, kind: io::ErrorKind) {
        let mut state = self.state.lock().unwrap();
        state.open_failures.insert(path.as_ref().to_path_buf(), kind);
    }

    pub fn fail_chmod(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.chmod_failures.insert(path.as_ref().to_path_buf());
    }

    pub fn fail_close(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.close_failures.insert(path.as_ref().to_path_buf());
    }

    /// Make listing `path` fail after `after` entries have been returned.
    pub fn fail_listing_after(&self, path: impl AsRef<Path>, after: usize) {
        let mut state = self.state.lock().unwrap();
        state.listing_failures.insert(path.as_ref().to_path_buf(), after);
    }

    /// Block opens of `path` until the returned gate is released.
    pub fn gate_open(&self, path: impl AsRef<Path>) -> OpenGate {
        let gate = OpenGate::default();
        let mut state = self.state.lock().unwrap();
        state.gates.insert(path.as_ref().to_path_buf(), gate.clone());
        gate
    }

    /// Every successful mode change, in order.
    pub fn chmods(&self) -> Vec<(PathBuf, u32)> {
        self.state.lock().unwrap().chmods.clone()
    }

    pub fn chmod_count(&self, path: impl AsRef<Path>) -> usize {
        let state = self.state.lock().unwrap();
        state.chmods.iter().filter(|(p, _)| p == path.as_ref()).count()
    }

    /// How many times `path` was opened (successfully or not).
    pub fn open_count(&self, path: impl AsRef<Path>) -> usize {
        let state = self.state.lock().unwrap();
        state.opens.iter().filter(|p| p.as_path() == path.as_ref()).count()
    }

    pub fn clear_history(&self) {
        let mut state = self.state.lock().unwrap();
        state.chmods.clear();
        state.opens.clear();
    }

    fn insert(&self, path: &Path, entry: MockEntry) {
        let mut state = self.state.lock().unwrap();
        state.entries.insert(path.to_path_buf(), entry);

        if let Some(parent) = path.parent() {
            ensure_dir_entry(&mut state.entries, parent);
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                add_child_name(&mut state.entries, parent, name);
            }
        }
    }
}

fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if entries.contains_key(path) {
        return;
    }
    entries.insert(
        path.to_path_buf(),
        MockEntry::Dir {
            mode: 0o755,
            children: Vec::new(),
        },
    );
    if let Some(parent) = path.parent() {
        ensure_dir_entry(entries, parent);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            add_child_name(entries, parent, name);
        }
    }
}

fn add_child_name(entries: &mut HashMap<PathBuf, MockEntry>, parent: &Path, name: &str) {
    if let Some(MockEntry::Dir { children, .. }) = entries.get_mut(parent) {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

fn not_found(path: &Path) -> anyhow::Error {
    anyhow::Error::new(io::Error::from(io::ErrorKind::NotFound))
        .context(format!("mock: no such entry {:?}", path))
}

fn resolve(state: &MockState, path: &Path) -> Result<PathBuf> {
    let mut current = path.to_path_buf();
    for _ in 0..MAX_SYMLINK_HOPS {
        match state.entries.get(&current) {
            Some(MockEntry::Symlink { target }) => current = target.clone(),
            Some(_) => return Ok(current),
            None => return Err(not_found(path)),
        }
    }
    Err(anyhow!("mock: too many levels of symbolic links at {:?}", path))
}

#[derive(Debug)]
struct MockHandle {
    state: Arc<Mutex<MockState>>,
    opened_as: PathBuf,
    resolved: PathBuf,
}

impl EntryHandle for MockHandle {
    fn stat(&self) -> Result<EntryStat> {
        let state = self.state.lock().unwrap();
        match state.entries.get(&self.resolved) {
            Some(MockEntry::File { mode }) => Ok(EntryStat {
                mode: S_IFREG | mode,
                is_dir: false,
            }),
            Some(MockEntry::Dir { mode, .. }) => Ok(EntryStat {
                mode: S_IFDIR | mode,
                is_dir: true,
            }),
            _ => Err(not_found(&self.opened_as)),
        }
    }

    fn set_mode(&mut self, new_mode: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.chmod_failures.contains(&self.opened_as) {
            return Err(anyhow::Error::new(io::Error::from(io::ErrorKind::PermissionDenied))
                .context(format!("mock: chmod {:?}", self.opened_as)));
        }
        match state.entries.get_mut(&self.resolved) {
            Some(MockEntry::File { mode }) | Some(MockEntry::Dir { mode, .. }) => {
                *mode = new_mode & 0o7777;
            }
            _ => return Err(not_found(&self.opened_as)),
        }
        state.chmods.push((self.opened_as.clone(), new_mode & 0o7777));
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let state = self.state.lock().unwrap();
        if state.close_failures.contains(&self.opened_as) {
            return Err(anyhow!("mock: close failed for {:?}", self.opened_as));
        }
        Ok(())
    }
}

impl FileSystem for MockFileSystem {
    fn open(&self, path: &Path) -> Result<Box<dyn EntryHandle>> {
        // Wait outside the state lock so the test can keep inspecting the tree.
        let gate = self.state.lock().unwrap().gates.get(path).cloned();
        if let Some(gate) = gate {
            gate.pass();
        }

        let mut state = self.state.lock().unwrap();
        state.opens.push(path.to_path_buf());
        if let Some(kind) = state.open_failures.get(path) {
            return Err(anyhow::Error::new(io::Error::from(*kind))
                .context(format!("mock: opening {:?}", path)));
        }
        let resolved = resolve(&state, path)?;
        Ok(Box::new(MockHandle {
            state: Arc::clone(&self.state),
            opened_as: path.to_path_buf(),
            resolved,
        }))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        matches!(state.entries.get(path), Some(MockEntry::Symlink { .. }))
    }

    fn read_dir(&self, path: &Path) -> DirListing {
        let state = self.state.lock().unwrap();
        let resolved = match resolve(&state, path) {
            Ok(p) => p,
            Err(err) => {
                return DirListing {
                    entries: Vec::new(),
                    error: Some(err),
                };
            }
        };
        match state.entries.get(&resolved) {
            Some(MockEntry::Dir { children, .. }) => {
                let limit = state.listing_failures.get(path).copied();
                let entries: Vec<PathBuf> = children
                    .iter()
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|name| path.join(name))
                    .collect();
                let error = limit.map(|_| anyhow!("mock: listing {:?} failed part-way", path));
                DirListing { entries, error }
            }
            _ => DirListing {
                entries: Vec::new(),
                error: Some(anyhow!("mock: not a directory {:?}", path)),
            },
        }
    }
}
