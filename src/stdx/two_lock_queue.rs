//! Unbounded FIFO queue with separate head and tail locks.
//!
//! # Design
//!
//! The two-lock queue of Michael and Scott. A permanent sentinel node sits
//! in front of the first real entry, so on an empty queue `head` and `tail`
//! both point at the sentinel but the two locks never guard the same field:
//!
//! ```text
//! head ──► [sentinel] ──► [a] ──► [b] ──► null
//!                                  ▲
//! tail ────────────────────────────┘
//! ```
//!
//! - `enqueue` takes only the tail lock, links after the current tail and
//!   advances it.
//! - `dequeue` takes only the head lock. The first real node becomes the
//!   new sentinel (its value is moved out) and the old sentinel is freed.
//!
//! Producers and the consumer therefore never contend with each other.
//!
//! # Ordering
//!
//! ```text
//! enqueue: write node, then Release-store tail.next  →  dequeue: Acquire-load head.next, then read value
//! ```
//!
//! # Safety
//!
//! Uses raw node pointers. Invariants:
//! - Every pointer reachable from `head` refers to a live `Box`-allocated node.
//! - A node's `value` is written once before publication and afterwards only
//!   touched by the head-lock holder.
//! - The old sentinel is freed only after `head` moved past it, which means
//!   its `next` was already published and no enqueuer will dereference it
//!   again.

#[cfg(not(loom))]
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
#[cfg(not(loom))]
use std::sync::{Mutex, MutexGuard};

#[cfg(loom)]
use loom::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
#[cfg(loom)]
use loom::sync::{Mutex, MutexGuard};

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::PoisonError;

use crossbeam_utils::CachePadded;

use super::alloc::{try_box, AllocError};
use super::error::ContainerError;

struct Node<T> {
    /// `None` for the current sentinel.
    value: UnsafeCell<Option<T>>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn new(value: Option<T>) -> Self {
        Self {
            value: UnsafeCell::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// Unbounded concurrent FIFO.
pub struct TwoLockQueue<T> {
    /// Current sentinel. Guarded by the head lock.
    head: CachePadded<Mutex<NonNull<Node<T>>>>,
    /// Last node in the chain. Guarded by the tail lock.
    tail: CachePadded<Mutex<NonNull<Node<T>>>>,
    /// Entry count. Incremented under the tail lock and decremented under
    /// the head lock, so it is only exact at quiescent points.
    size: AtomicUsize,
    _owns: PhantomData<Box<Node<T>>>,
}

// SAFETY: Node pointers are only dereferenced under the locks described in
// the module docs; values of type `T` cross threads by move, hence `T: Send`.
unsafe impl<T: Send> Send for TwoLockQueue<T> {}
unsafe impl<T: Send> Sync for TwoLockQueue<T> {}

impl<T> TwoLockQueue<T> {
    /// Create an empty queue holding only the sentinel.
    pub fn new() -> Result<Self, AllocError> {
        let sentinel = NonNull::from(Box::leak(try_box(Node::new(None))?));
        Ok(Self {
            head: CachePadded::new(Mutex::new(sentinel)),
            tail: CachePadded::new(Mutex::new(sentinel)),
            size: AtomicUsize::new(0),
            _owns: PhantomData,
        })
    }

    #[inline]
    fn lock_head(&self) -> MutexGuard<'_, NonNull<Node<T>>> {
        self.head.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn lock_tail(&self) -> MutexGuard<'_, NonNull<Node<T>>> {
        self.tail.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `value` at the tail.
    ///
    /// The node is allocated before any lock is taken; only allocation
    /// failure can make this fail.
    pub fn enqueue(&self, value: T) -> Result<(), AllocError> {
        let node = NonNull::from(Box::leak(try_box(Node::new(Some(value)))?));

        let mut tail = self.lock_tail();
        // SAFETY: `*tail` is live: the dequeuer never frees the node `tail`
        // points at, because that node's `next` is still null.
        unsafe {
            tail.as_ref().next.store(node.as_ptr(), Ordering::Release);
        }
        *tail = node;
        self.size.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Remove and return the oldest entry.
    pub fn dequeue(&self) -> Result<T, ContainerError> {
        let mut head = self.lock_head();
        let sentinel = *head;

        // SAFETY: the sentinel is live while we hold the head lock.
        let first = unsafe { sentinel.as_ref().next.load(Ordering::Acquire) };
        let Some(first) = NonNull::new(first) else {
            return Err(ContainerError::Empty);
        };

        // SAFETY: `first` was published by a Release store after its value
        // was written; only the head-lock holder touches published values.
        let value = unsafe { (*first.as_ref().value.get()).take() };
        *head = first;
        self.size.fetch_sub(1, Ordering::Relaxed);
        drop(head);

        // SAFETY: `sentinel` is unreachable from `head` and its `next` is
        // non-null, so neither an enqueuer nor a later dequeuer can reach it.
        unsafe { drop(Box::from_raw(sentinel.as_ptr())) };

        // A published node always carries a value.
        value.ok_or(ContainerError::Empty)
    }

    /// Approximate number of entries; exact at quiescent points.
    #[inline]
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// `true` if no entry is linked after the sentinel (read under the head lock).
    pub fn is_empty(&self) -> bool {
        let head = self.lock_head();
        // SAFETY: the sentinel is live while we hold the head lock.
        unsafe { head.as_ref().next.load(Ordering::Acquire).is_null() }
    }

    /// Fold over the entries from oldest to newest.
    ///
    /// Takes the head lock, then the tail lock, freezing the chain for the
    /// duration of the walk. Enqueue and dequeue each hold only one of the
    /// two locks, so the fixed order cannot deadlock.
    pub fn fold<B, F>(&self, init: B, mut f: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        let head = self.lock_head();
        let _tail = self.lock_tail();

        let mut acc = init;
        // SAFETY: with both locks held no node is linked or freed.
        unsafe {
            let mut cursor = head.as_ref().next.load(Ordering::Acquire);
            while let Some(node) = NonNull::new(cursor) {
                if let Some(value) = (*node.as_ref().value.get()).as_ref() {
                    acc = f(acc, value);
                }
                cursor = node.as_ref().next.load(Ordering::Acquire);
            }
        }
        acc
    }

    /// Copy of the entries, oldest first.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.fold(Vec::new(), |mut out, value| {
            out.push(value.clone());
            out
        })
    }
}

impl<T> Drop for TwoLockQueue<T> {
    fn drop(&mut self) {
        let mut cursor = self.lock_head().as_ptr();
        while !cursor.is_null() {
            // SAFETY: `&mut self` excludes every other accessor; each node in
            // the chain was produced by `Box::leak` and is freed exactly once.
            let node = unsafe { Box::from_raw(cursor) };
            cursor = node.next.load(Ordering::Relaxed);
        }
    }
}

impl<T> std::fmt::Debug for TwoLockQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoLockQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================


// ============================================================================
// Loom Tests
// ============================================================================
