//! Sorted concurrent set with lazy synchronization.
//!
//! # Design
//!
//! A singly linked list ordered by ascending `i64` key, bounded by two
//! sentinel nodes (`i64::MIN` and `i64::MAX`) that are never removed. Every
//! node carries its own lock and a `marked` flag:
//!
//! ```text
//! head(MIN) ──► [3] ──► [8] ──► [21] ──► tail(MAX)
//! ```
//!
//! Mutations follow the same optimistic pattern:
//!
//! 1. Traverse without locks to find `pred`/`curr` straddling the key.
//! 2. Lock `pred`, then `curr` (always in list order, so no lock cycles).
//! 3. [`validate`]: both unmarked and `pred.next == curr`. On failure unlock
//!    and retry from the head.
//! 4. Mutate and unlock.
//!
//! Deletion is split: set `curr.marked` first (logical removal, visible to
//! concurrent traversals), then unlink it from `pred` (physical removal).
//!
//! # Reclamation
//!
//! Unlocked readers may still hold a pointer to a node that is being
//! unlinked. Every traversal runs under a `crossbeam-epoch` guard, and an
//! unlinked node is handed to `defer_destroy` while both its lock and its
//! predecessor's lock are held. Its storage is freed only once no pinned
//! reader can reach it.
//!
//! # Invariants
//!
//! - At every point where no lock is held, the unmarked nodes reachable from
//!   `head` are strictly ascending by key.
//! - A node's `next` only changes while that node's lock is held.
//! - A marked node is never unmarked.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::Backoff;

use super::alloc::{try_box, AllocError};
use super::error::ContainerError;

/// Key of the head sentinel; below every storable key.
pub const HEAD_KEY: i64 = i64::MIN;
/// Key of the tail sentinel; above every storable key.
pub const TAIL_KEY: i64 = i64::MAX;

/// Values that carry their own ordering key.
pub trait Keyed {
    fn key(&self) -> i64;
}

impl Keyed for i64 {
    #[inline]
    fn key(&self) -> i64 {
        *self
    }
}

struct Node<T> {
    key: i64,
    /// Node lock. Also owns the payload, which is `None` for sentinels and
    /// for nodes whose value was moved out on removal.
    slot: Mutex<Option<T>>,
    marked: AtomicBool,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel(key: i64) -> Self {
        Self {
            key,
            slot: Mutex::new(None),
            marked: AtomicBool::new(false),
            next: Atomic::null(),
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }
}

/// Flags and link read from a `pred`/`curr` pair while both are locked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairSnapshot {
    pub pred_marked: bool,
    pub curr_marked: bool,
    /// `pred.next` still points at `curr`.
    pub adjacent: bool,
}

/// `true` when a pair found by an unlocked traversal is still usable:
/// neither node was logically removed and nothing was linked between them.
#[inline]
pub fn validate(pair: PairSnapshot) -> bool {
    !pair.pred_marked && !pair.curr_marked && pair.adjacent
}

/// Lazy-synchronized sorted set.
pub struct LazyList<T> {
    /// Head sentinel lives inline; nothing ever points at it.
    head: Node<T>,
    /// Live entries. Updated after each successful insert or removal, so it
    /// is exact only at quiescent points.
    len: AtomicUsize,
}

// SAFETY: nodes are shared between threads through epoch-protected pointers
// and payloads move in and out under the node locks.
unsafe impl<T: Send> Send for LazyList<T> {}
unsafe impl<T: Send> Sync for LazyList<T> {}

impl<T: Keyed> LazyList<T> {
    /// Create an empty set containing only the two sentinels.
    pub fn new() -> Result<Self, AllocError> {
        let tail = Owned::from(try_box(Node::sentinel(TAIL_KEY))?);
        let head = Node::sentinel(HEAD_KEY);
        head.next.store(tail, Ordering::Relaxed);
        Ok(Self {
            head,
            len: AtomicUsize::new(0),
        })
    }

    /// Unlocked traversal: the first node with `key >= target` and its
    /// predecessor.
    ///
    /// The returned `curr` is never null because the tail sentinel compares
    /// above every storable key.
    fn find<'g>(&'g self, target: i64, guard: &'g Guard) -> (&'g Node<T>, Shared<'g, Node<T>>) {
        let mut pred = &self.head;
        let mut curr = pred.next.load(Ordering::Acquire, guard);
        loop {
            // SAFETY: the chain from `head` always ends at the tail sentinel,
            // and `guard` keeps every node we can reach allocated.
            let node = unsafe { curr.deref() };
            if node.key >= target {
                return (pred, curr);
            }
            pred = node;
            curr = node.next.load(Ordering::Acquire, guard);
        }
    }

    fn snapshot_pair(pred: &Node<T>, curr: Shared<'_, Node<T>>, guard: &Guard) -> PairSnapshot {
        // SAFETY: `curr` came from a traversal under `guard`.
        let curr_node = unsafe { curr.deref() };
        PairSnapshot {
            pred_marked: pred.is_marked(),
            curr_marked: curr_node.is_marked(),
            adjacent: pred.next.load(Ordering::Acquire, guard) == curr,
        }
    }

    fn check_key(key: i64) -> Result<(), ContainerError> {
        if key == HEAD_KEY || key == TAIL_KEY {
            return Err(ContainerError::ReservedKey { key });
        }
        Ok(())
    }

    /// Insert `item` in key order.
    ///
    /// Returns [`ContainerError::Duplicate`] without changing the set when an
    /// entry with the same key is already live.
    pub fn insert(&self, item: T) -> Result<(), ContainerError> {
        let key = item.key();
        Self::check_key(key)?;

        let new_node = try_box(Node {
            key,
            slot: Mutex::new(Some(item)),
            marked: AtomicBool::new(false),
            next: Atomic::null(),
        })?;
        let new_node: Owned<Node<T>> = Owned::from(new_node);

        let backoff = Backoff::new();
        loop {
            let guard = &epoch::pin();
            let (pred, curr) = self.find(key, guard);
            // SAFETY: `find` never returns a null `curr`.
            let curr_node = unsafe { curr.deref() };

            let _pred_lock = pred.lock();
            let _curr_lock = curr_node.lock();
            if !validate(Self::snapshot_pair(pred, curr, guard)) {
                backoff.spin();
                continue;
            }

            if curr_node.key == key {
                return Err(ContainerError::Duplicate { key });
            }

            new_node.next.store(curr, Ordering::Relaxed);
            pred.next.store(new_node, Ordering::Release);
            self.len.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
    }

    /// Remove and return the entry with the lowest key.
    pub fn delete_min(&self) -> Result<T, ContainerError> {
        let backoff = Backoff::new();
        loop {
            let guard = &epoch::pin();
            let pred = &self.head;
            let _pred_lock = pred.lock();

            let curr = pred.next.load(Ordering::Acquire, guard);
            // SAFETY: head's successor is always a live node (at worst the tail).
            let curr_node = unsafe { curr.deref() };
            if curr_node.key == TAIL_KEY {
                return Err(ContainerError::Empty);
            }

            let mut curr_lock = curr_node.lock();
            if !validate(Self::snapshot_pair(pred, curr, guard)) {
                backoff.spin();
                continue;
            }

            // SAFETY: both locks are held, `curr` is about to be unreachable
            // from `head`, and pinned readers are covered by the epoch.
            let item = unsafe { self.unlink(pred, curr, &mut curr_lock, guard) };
            return item.ok_or(ContainerError::Empty);
        }
    }

    /// Remove the entry with `key`, if present.
    pub fn remove(&self, key: i64) -> Option<T> {
        if Self::check_key(key).is_err() {
            return None;
        }

        let backoff = Backoff::new();
        loop {
            let guard = &epoch::pin();
            let (pred, curr) = self.find(key, guard);
            // SAFETY: `find` never returns a null `curr`.
            let curr_node = unsafe { curr.deref() };

            let _pred_lock = pred.lock();
            let mut curr_lock = curr_node.lock();
            if !validate(Self::snapshot_pair(pred, curr, guard)) {
                backoff.spin();
                continue;
            }

            if curr_node.key != key {
                return None;
            }

            // SAFETY: as in `delete_min`.
            return unsafe { self.unlink(pred, curr, &mut curr_lock, guard) };
        }
    }

    /// Mark, unlink and retire `curr`, returning its payload.
    ///
    /// # Safety
    ///
    /// The caller holds the locks of `pred` and `curr` (`curr_slot` is the
    /// latter), and the pair passed [`validate`].
    unsafe fn unlink(
        &self,
        pred: &Node<T>,
        curr: Shared<'_, Node<T>>,
        curr_slot: &mut MutexGuard<'_, Option<T>>,
        guard: &Guard,
    ) -> Option<T> {
        let curr_node = curr.deref();
        curr_node.marked.store(true, Ordering::Release);
        let succ = curr_node.next.load(Ordering::Acquire, guard);
        pred.next.store(succ, Ordering::Release);
        self.len.fetch_sub(1, Ordering::Relaxed);

        let item = curr_slot.take();
        guard.defer_destroy(curr);
        item
    }

    /// Wait-free membership test.
    ///
    /// Observes some consistent state of the key: a node that is reachable
    /// but marked counts as absent.
    pub fn contains(&self, key: i64) -> bool {
        if Self::check_key(key).is_err() {
            return false;
        }
        let guard = &epoch::pin();
        let (_, curr) = self.find(key, guard);
        // SAFETY: `find` never returns a null `curr`.
        let node = unsafe { curr.deref() };
        node.key == key && !node.is_marked()
    }

    /// `true` if the head sentinel links directly to the tail sentinel.
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let first = self.head.next.load(Ordering::Acquire, guard);
        // SAFETY: head's successor is always a live node.
        unsafe { first.deref() }.key == TAIL_KEY
    }

    /// Live entries; exact at quiescent points.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Visit unmarked entries in link order, locking each node while its
    /// payload is read.
    pub fn fold<B, F>(&self, init: B, mut f: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        let guard = &epoch::pin();
        let mut acc = init;
        let mut curr = self.head.next.load(Ordering::Acquire, guard);
        loop {
            // SAFETY: the chain ends at the tail sentinel; `guard` keeps
            // reachable nodes allocated.
            let node = unsafe { curr.deref() };
            if node.key == TAIL_KEY {
                return acc;
            }
            if !node.is_marked() {
                let slot = node.lock();
                if let Some(item) = slot.as_ref() {
                    acc = f(acc, item);
                }
            }
            curr = node.next.load(Ordering::Acquire, guard);
        }
    }

    /// Keys of the unmarked entries, in link order.
    pub fn keys(&self) -> Vec<i64> {
        self.fold(Vec::new(), |mut keys, item| {
            keys.push(item.key());
            keys
        })
    }

    /// Copy of the unmarked entries, in link order.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.fold(Vec::new(), |mut out, item| {
            out.push(item.clone());
            out
        })
    }

    /// `true` if the unmarked entries are strictly ascending by key.
    ///
    /// Meaningful at quiescent points; concurrent mutation can only make a
    /// walk observe a prefix of one state and a suffix of another, both of
    /// which are sorted.
    pub fn check_sorted(&self) -> bool {
        self.keys().windows(2).all(|pair| pair[0] < pair[1])
    }
}

impl<T> Drop for LazyList<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can reach the chain.
        // Retired nodes are no longer linked and belong to the collector.
        unsafe {
            let guard = epoch::unprotected();
            let mut curr = self.head.next.load(Ordering::Relaxed, guard);
            while !curr.is_null() {
                let next = curr.deref().next.load(Ordering::Relaxed, guard);
                drop(curr.into_owned());
                curr = next;
            }
        }
    }
}

impl<T: Keyed> fmt::Debug for LazyList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyList")
            .field("len", &self.len())
            .field("keys", &self.keys())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
