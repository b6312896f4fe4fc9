//! Cooperative cancellation.
//!
//! Long operations (image reads, file writes) check a shared flag at
//! their natural boundaries: between blocks during a read, between
//! segments during a write. Cancellation is advisory; on observing the
//! flag the operation fails with its layer's `Cancelled` error and any
//! partial output is indeterminate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply clonable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// A new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes the request.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
