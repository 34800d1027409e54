// src/supervisor.rs

//! One watcher process per target directory.
//!
//! When several directories are given, the parent does no watching itself:
//! it re-executes the current binary once per directory (each child then
//! confines itself to its own target) and waits for all of them. Children
//! share nothing with each other.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cli::CliArgs;

/// Spawn a child per directory and wait until they have all exited or
/// Ctrl-C is pressed. Children are killed when the supervisor stops.
pub async fn run_children(args: &CliArgs) -> Result<()> {
    let exe = std::env::current_exe().context("locating the permwatch executable")?;

    let mut children: JoinSet<(PathBuf, std::io::Result<std::process::ExitStatus>)> =
        JoinSet::new();

    for dir in &args.dirs {
        let mut child = Command::new(&exe)
            .args(args.child_args(dir))
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning watcher process for {:?}", dir))?;

        info!(dir = %dir.display(), pid = ?child.id(), "started watcher process");

        let dir = dir.clone();
        children.spawn(async move {
            let status = child.wait().await;
            (dir, status)
        });
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut listening = true;

    loop {
        tokio::select! {
            joined = children.join_next() => {
                match joined {
                    None => break,
                    Some(Ok((dir, Ok(status)))) if status.success() => {
                        info!(dir = %dir.display(), "watcher process exited");
                    }
                    Some(Ok((dir, Ok(status)))) => {
                        warn!(dir = %dir.display(), %status, "watcher process failed");
                    }
                    Some(Ok((dir, Err(err)))) => {
                        error!(dir = %dir.display(), error = %err, "waiting for watcher process");
                    }
                    Some(Err(err)) => {
                        error!(error = %err, "watcher supervision task failed");
                    }
                }
            }
            signal = &mut shutdown, if listening => {
                match signal {
                    Ok(()) => {
                        info!("shutdown requested, stopping watcher processes");
                        // Dropping the wait tasks drops the children, which kills them.
                        children.shutdown().await;
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to listen for Ctrl+C");
                        listening = false;
                    }
                }
            }
        }
    }

    Ok(())
}
