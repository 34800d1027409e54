// src/watch/mod.rs

//! Directory change notifications.
//!
//! This module is responsible for:
//! - Subscribing individual directories through a pluggable backend
//!   (`notify` in production).
//! - Keeping the registry of which directories are subscribed, so each one
//!   is watched exactly once and released when it disappears.
//!
//! It does **not** decide what to do with a change; notifications are
//! forwarded to the engine as `RuntimeEvent::PathChanged`.

pub mod backend;
pub mod registry;

pub use backend::{DetachedBackend, NotifyBackend, Subscription, WatchBackend};
pub use registry::{WatchRegistry, WatchedPath};
