// src/engine/stop.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag asking a probe or scan in progress to give up early.
///
/// The prober checks it between entries, so an entry that is already being
/// opened or listed finishes first. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
