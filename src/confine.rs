// src/confine.rs

//! Restricting the process to the target directory.
//!
//! With a single target, permwatch chroots into it so that the watcher's
//! root `/` is the target tree and nothing outside it can be reached, not
//! even through absolute symlinks. The engine itself is unaware of this and
//! always scans from the root it is given.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

/// Chroot into `dir` and return the root to watch inside it (`/`).
///
/// Requires `CAP_SYS_CHROOT`. Everything that needs the outside filesystem
/// (config files, the executable path) must be resolved before this.
pub fn confine_to(dir: &Path) -> Result<PathBuf> {
    let dir = resolve_root(dir)?;
    info!(dir = %dir.display(), "chroot in");

    std::os::unix::fs::chroot(&dir).with_context(|| format!("chroot into {:?}", dir))?;
    std::env::set_current_dir("/").context("changing directory to the new root")?;

    Ok(PathBuf::from("/"))
}

/// Canonicalise `dir` for unconfined operation, checking it is a directory.
pub fn resolve_root(dir: &Path) -> Result<PathBuf> {
    let root = dir
        .canonicalize()
        .with_context(|| format!("resolving target directory {:?}", dir))?;
    if !root.is_dir() {
        bail!("target {:?} is not a directory", root);
    }
    Ok(root)
}
