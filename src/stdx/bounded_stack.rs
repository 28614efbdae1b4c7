//! Capacity-limited LIFO stack behind a single coarse-grained lock.
//!
//! # Design
//!
//! Storage for all `capacity` entries is reserved at construction, so a push
//! never allocates. One mutex guards the entry vector; an atomic mirror of
//! the length lets `is_full`, `len` and `has_overflowed` answer without
//! taking the lock.
//!
//! # Invariants
//!
//! - `0 <= len() <= capacity()` at every point. The fast-path fullness check
//!   happens before the lock and is repeated under it, so racing pushers can
//!   never overshoot.
//! - The atomic mirror is only written while the lock is held, so it equals
//!   the vector length at every point where no push or pop is in progress.
//! - `has_overflowed()` is a defect indicator and is never true in a correct
//!   build.

#[cfg(not(loom))]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(not(loom))]
use std::sync::{Mutex, MutexGuard};

#[cfg(loom)]
use loom::sync::atomic::{AtomicUsize, Ordering};
#[cfg(loom)]
use loom::sync::{Mutex, MutexGuard};

use std::sync::PoisonError;

use super::alloc::AllocError;
use super::error::ContainerError;

/// Fixed-capacity concurrent stack.
///
/// Safe to share across threads by reference; every operation takes `&self`.
#[derive(Debug)]
pub struct BoundedStack<T> {
    /// Entries, bottom first. Top of stack is the last element.
    entries: Mutex<Vec<T>>,
    /// Mirror of `entries.len()`, written under the lock.
    size: AtomicUsize,
    capacity: usize,
}

impl<T> BoundedStack<T> {
    /// Create an empty stack holding at most `capacity` entries.
    ///
    /// Storage is reserved up front; a failed reservation is reported
    /// instead of aborting.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| AllocError::for_array::<T>(capacity))?;
        Ok(Self {
            entries: Mutex::new(entries),
            size: AtomicUsize::new(0),
            capacity,
        })
    }

    /// Lock the entries, recovering from poison.
    ///
    /// Critical sections never leave the vector half-updated, so a panic in
    /// another holder does not invalidate the contents.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push `value` as the new top.
    ///
    /// Returns `Err(value)` when the stack is full. That is the normal
    /// "route elsewhere" signal, not a failure.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }

        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            return Err(value);
        }
        // Capacity was reserved up front; this never reallocates.
        entries.push(value);
        self.size.store(entries.len(), Ordering::Release);
        Ok(())
    }

    /// Remove and return the top entry.
    pub fn pop(&self) -> Result<T, ContainerError> {
        let mut entries = self.lock();
        let value = entries.pop().ok_or(ContainerError::Empty)?;
        self.size.store(entries.len(), Ordering::Release);
        Ok(value)
    }

    /// Number of entries currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// `true` if more entries are stored than the capacity allows.
    #[inline]
    pub fn has_overflowed(&self) -> bool {
        self.len() > self.capacity
    }

    /// Fold over the entries from top to bottom while holding the lock.
    pub fn fold<B, F>(&self, init: B, mut f: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        let entries = self.lock();
        entries.iter().rev().fold(init, |acc, value| f(acc, value))
    }

    /// Copy of the entries, top first.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.lock().iter().rev().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pop_empty_is_error() {
        let stack = BoundedStack::<u32>::with_capacity(2).unwrap();
        assert_eq!(stack.pop(), Err(ContainerError::Empty));
        assert!(stack.is_empty());
    }

    #[test]
    fn lifo_order() {
        let stack = BoundedStack::with_capacity(4).unwrap();
        for i in 0..4u32 {
            stack.try_push(i).unwrap();
        }
        for i in (0..4u32).rev() {
            assert_eq!(stack.pop(), Ok(i));
        }
        assert_eq!(stack.pop(), Err(ContainerError::Empty));
    }

    #[test]
    fn rejects_when_full_and_returns_value() {
        let stack = BoundedStack::with_capacity(2).unwrap();
        stack.try_push(1).unwrap();
        stack.try_push(2).unwrap();
        assert!(stack.is_full());
        assert_eq!(stack.try_push(3), Err(3));
        assert_eq!(stack.len(), 2);
        assert!(!stack.has_overflowed());

        assert_eq!(stack.pop(), Ok(2));
        assert!(!stack.is_full());
        stack.try_push(3).unwrap();
        assert_eq!(stack.snapshot(), vec![3, 1]);
    }

    #[test]
    fn zero_capacity_is_always_full() {
        let stack = BoundedStack::with_capacity(0).unwrap();
        assert!(stack.is_full());
        assert_eq!(stack.try_push(9u8), Err(9));
        assert!(!stack.has_overflowed());
    }

    #[test]
    fn fold_visits_top_first() {
        let stack = BoundedStack::with_capacity(3).unwrap();
        for i in [10u64, 20, 30] {
            stack.try_push(i).unwrap();
        }
        let order = stack.fold(Vec::new(), |mut acc, v| {
            acc.push(*v);
            acc
        });
        assert_eq!(order, vec![30, 20, 10]);
        assert_eq!(stack.fold(0u64, |acc, v| acc + v), 60);
    }

    #[test]
    fn absurd_capacity_reports_alloc_error() {
        let err = BoundedStack::<u64>::with_capacity(usize::MAX / 2).unwrap_err();
        assert!(err.bytes() > 0);
    }

    #[test]
    fn concurrent_pushers_never_exceed_capacity() {
        const CAP: usize = 64;
        const THREADS: usize = 8;
        const PER_THREAD: usize = 32;

        let stack = Arc::new(BoundedStack::with_capacity(CAP).unwrap());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || {
                    let mut rejected = 0usize;
                    for i in 0..PER_THREAD {
                        if stack.try_push(t * PER_THREAD + i).is_err() {
                            rejected += 1;
                        }
                        assert!(!stack.has_overflowed());
                    }
                    rejected
                })
            })
            .collect();

        let rejected: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(stack.len(), CAP);
        assert_eq!(rejected, THREADS * PER_THREAD - CAP);
        assert!(!stack.has_overflowed());
    }

    #[test]
    fn concurrent_push_pop_conserves_entries() {
        let stack = Arc::new(BoundedStack::with_capacity(16).unwrap());
        let pushed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let popped = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|t| {
                let stack = Arc::clone(&stack);
                let pushed = Arc::clone(&pushed);
                let popped = Arc::clone(&popped);
                thread::spawn(move || {
                    for i in 0..1_000u32 {
                        if (i + t) % 2 == 0 {
                            if stack.try_push(i).is_ok() {
                                pushed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            }
                        } else if stack.pop().is_ok() {
                            popped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                        assert!(stack.len() <= stack.capacity());
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        let pushed = pushed.load(std::sync::atomic::Ordering::Relaxed);
        let popped = popped.load(std::sync::atomic::Ordering::Relaxed);
        assert_eq!(pushed - popped, stack.len());
    }
}

// ============================================================================
// Loom Tests
// ============================================================================
