//! Non-reentrant entry guard for top-level scan and fetch operations.

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether an operation is in flight. A second caller is turned
/// away instead of sharing counters or caches with the first.
#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the operation as running. Returns `None` if it already is.
    pub fn try_enter(&self) -> Option<InFlightGuard<'_>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(InFlightGuard { flag: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

/// Clears the in-flight flag when dropped.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
