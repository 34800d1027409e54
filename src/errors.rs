// src/errors.rs

//! Crate-wide error types and the failure-reporting helper.
//!
//! Errors that reach a caller (lifecycle misuse, configuration, startup) are
//! structured [`PermwatchError`]s. Errors met while probing the tree are never
//! returned; they are handed to [`report_failure`] and the sweep carries on.

use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum PermwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Watch backend error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Watcher is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PermwatchError>;

/// True if anything in the error chain is an IO "not found" error.
///
/// Filesystem errors are wrapped with context on their way up, so the kind
/// has to be looked for along the whole chain.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
    })
}

/// Hand a recoverable `(path, error)` pair to the log.
pub fn report_failure(path: &Path, err: &anyhow::Error) {
    error!(path = %path.display(), error = %format!("{err:#}"), "permission fix failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn not_found_is_detected_through_context() {
        let err = Err::<(), _>(io::Error::from(io::ErrorKind::NotFound))
            .context("opening /x")
            .context("probing /x")
            .unwrap_err();
        assert!(is_not_found(&err));
    }

    #[test]
    fn other_io_kinds_are_not_vanished_paths() {
        let err: anyhow::Error = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(!is_not_found(&err));
        assert!(!is_not_found(&anyhow::anyhow!("no such file")));
    }
}
