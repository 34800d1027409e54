// src/lib.rs

pub mod cli;
pub mod config;
pub mod confine;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod policy;
pub mod supervisor;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ScheduleConfig};
use crate::engine::{Runtime, RuntimeEvent, Watcher};
use crate::fs::RealFileSystem;
use crate::watch::{DetachedBackend, NotifyBackend};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - fan-out to one process per directory (several targets)
/// - confinement to the target (single target)
/// - the watcher runtime, or a single scan with `--once`
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    // Read config before any chroot; the file may live outside the target.
    let cfg = load_or_default(args.config.as_deref())?;

    if args.dirs.len() > 1 {
        return supervisor::run_children(&args).await;
    }

    let Some(target) = args.dirs.first() else {
        bail!("no target directory given");
    };
    let root = if args.no_chroot {
        confine::resolve_root(target)?
    } else {
        confine::confine_to(target)?
    };

    if args.once {
        return fix_once(root, cfg.schedule);
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::unbounded_channel::<RuntimeEvent>();

    let backend = NotifyBackend::new(rt_tx.clone())?;
    let watcher = Watcher::new(
        root,
        Arc::new(RealFileSystem),
        Box::new(backend),
        cfg.schedule,
        rt_tx.clone(),
    );

    // Ctrl-C: interrupt the current pass and shut down; a second Ctrl-C
    // exits at once, even if a filesystem call is hung.
    {
        let tx = rt_tx.clone();
        let stop = watcher.stop_signal();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("shutdown requested; press Ctrl+C again to exit immediately");
            stop.raise();
            let _ = tx.send(RuntimeEvent::ShutdownRequested);

            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("second interrupt; exiting without cleanup");
                std::process::exit(130);
            }
        });
    }

    let runtime = Runtime::new(watcher, rt_rx);
    runtime.run().await?;
    Ok(())
}

/// `--once`: one full scan, no subscriptions, no jobs.
fn fix_once(root: PathBuf, schedule: ScheduleConfig) -> Result<()> {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut watcher = Watcher::new(
        root,
        Arc::new(RealFileSystem),
        Box::new(DetachedBackend::default()),
        schedule,
        tx,
    );

    let report = watcher.full_scan();
    info!(
        checked = report.checked,
        corrected = report.corrected,
        failures = report.failures,
        "single pass complete"
    );
    Ok(())
}
