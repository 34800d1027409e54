// src/fs/mod.rs

//! Filesystem seam used by the prober.
//!
//! The prober works through an open handle the same way `open`/`fstat`/
//! `fchmod`/`close` would, so a path that is replaced between the stat and
//! the mode change cannot receive somebody else's mode. Tests swap in
//! [`mock::MockFileSystem`].

use std::fmt::Debug;
use std::fs;
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::os::unix::io::IntoRawFd;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// What a probe needs to know about an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    /// Full `st_mode`, file-type bits included.
    pub mode: u32,
    pub is_dir: bool,
}

/// Result of listing a directory.
///
/// A listing can fail part-way; `entries` then holds everything enumerated
/// before the failure and `error` the failure itself.
#[derive(Debug, Default)]
pub struct DirListing {
    pub entries: Vec<PathBuf>,
    pub error: Option<anyhow::Error>,
}

/// An open entry. Dropping it without `close` still releases it, but only
/// `close` reports a failure.
pub trait EntryHandle: Send + Debug {
    fn stat(&self) -> Result<EntryStat>;
    fn set_mode(&mut self, mode: u32) -> Result<()>;
    fn close(self: Box<Self>) -> Result<()>;
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Open `path` for reading, following symlinks.
    fn open(&self, path: &Path) -> Result<Box<dyn EntryHandle>>;

    /// Whether `path` itself is a symbolic link (not followed).
    fn is_symlink(&self, path: &Path) -> bool;

    /// Immediate children of `path`, as full paths.
    fn read_dir(&self, path: &Path) -> DirListing;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

#[derive(Debug)]
struct RealEntry {
    path: PathBuf,
    file: fs::File,
}

impl EntryHandle for RealEntry {
    fn stat(&self) -> Result<EntryStat> {
        let meta = self
            .file
            .metadata()
            .with_context(|| format!("stat {:?}", self.path))?;
        Ok(EntryStat {
            mode: meta.mode(),
            is_dir: meta.is_dir(),
        })
    }

    fn set_mode(&mut self, mode: u32) -> Result<()> {
        self.file
            .set_permissions(fs::Permissions::from_mode(mode))
            .with_context(|| format!("chmod {:o} {:?}", mode, self.path))
    }

    fn close(self: Box<Self>) -> Result<()> {
        let RealEntry { path, file } = *self;
        let fd = file.into_raw_fd();
        // SAFETY: `fd` was released from an owned `File` above and is closed
        // exactly once here.
        let rc = unsafe { libc::close(fd) };
        if rc == -1 {
            return Err(io::Error::last_os_error()).with_context(|| format!("closing {:?}", path));
        }
        Ok(())
    }
}

impl FileSystem for RealFileSystem {
    fn open(&self, path: &Path) -> Result<Box<dyn EntryHandle>> {
        // O_NONBLOCK keeps a FIFO without writers from hanging the probe.
        let file = fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .with_context(|| format!("opening {:?}", path))?;
        Ok(Box::new(RealEntry {
            path: path.to_path_buf(),
            file,
        }))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn read_dir(&self, path: &Path) -> DirListing {
        let mut listing = DirListing::default();
        let iter = match fs::read_dir(path).with_context(|| format!("reading dir {:?}", path)) {
            Ok(iter) => iter,
            Err(err) => {
                listing.error = Some(err);
                return listing;
            }
        };
        for entry in iter {
            match entry.with_context(|| format!("reading entry of {:?}", path)) {
                Ok(entry) => listing.entries.push(entry.path()),
                Err(err) => {
                    listing.error = Some(err);
                    break;
                }
            }
        }
        listing
    }
}
