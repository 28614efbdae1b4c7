//! Count of relayers that still have queued reservations to flush.
//!
//! Relayers with an empty queue keep pulling from the management center
//! while this is non-zero, because more entries may still arrive. Guarded by
//! its own mutex.

use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct InserterCount {
    remaining: Mutex<usize>,
}

impl InserterCount {
    pub fn new(initial: usize) -> Self {
        Self {
            remaining: Mutex::new(initial),
        }
    }

    #[inline]
    fn lock_or_recover(&self) -> MutexGuard<'_, usize> {
        self.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn get(&self) -> usize {
        *self.lock_or_recover()
    }

    pub fn set(&self, value: usize) {
        *self.lock_or_recover() = value;
    }

    /// Record that one inserter finished. Returns the remaining count.
    ///
    /// Saturates at zero. Decrementing past zero is a protocol defect.
    pub fn decrement(&self) -> usize {
        let mut remaining = self.lock_or_recover();
        debug_assert!(*remaining > 0, "inserter count decremented below zero");
        *remaining = remaining.saturating_sub(1);
        *remaining
    }
}
