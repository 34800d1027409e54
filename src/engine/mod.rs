// src/engine/mod.rs

//! Watch-and-fix engine.
//!
//! This module ties together:
//! - the prober (open, stat, fix the mode, expand directories)
//! - the scanner (full pass from the root)
//! - the change queue (deduplicated paths reported since the last flush)
//! - the scheduler (periodic flush and daily rescan jobs)
//! - the watcher state machine and the async runtime loop that feeds it
//!   change notifications, job firings and shutdown signals.
//!
//! Every piece of mutable state lives in the [`Watcher`], which is owned by
//! one Tokio task; producers only send [`RuntimeEvent`]s to it.

use std::path::PathBuf;

/// Why a full rescan was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescanReason {
    /// The daily rescan job fired.
    Scheduled,
    /// The notification backend lost events (e.g. inotify queue overflow).
    EventOverflow,
}

/// Events flowing into the runtime from the watch backend, the scheduled
/// jobs and the signal handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A watched directory or one of its children changed.
    PathChanged { path: PathBuf },
    /// The flush job fired.
    FlushDue,
    /// Re-walk the whole tree.
    RescanDue { reason: RescanReason },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod prober;
pub mod queue;
pub mod runtime;
pub mod scanner;
pub mod scheduler;
pub mod stop;
pub mod watcher;

pub use prober::{ProbeReport, ProbeScope, Prober};
pub use queue::ChangeQueue;
pub use runtime::Runtime;
pub use scanner::scan_from;
pub use scheduler::{Schedule, ScheduledJob, Scheduler};
pub use stop::StopSignal;
pub use watcher::{Watcher, WatcherState};
