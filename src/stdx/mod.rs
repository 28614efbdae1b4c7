//! Hand-built concurrent containers.
//!
//! - [`BoundedStack`]: capacity-limited LIFO, one coarse lock.
//! - [`TwoLockQueue`]: unbounded FIFO, separate head/tail locks.
//! - [`LazyList`]: sorted set with optimistic traversal and lazy deletion.

pub mod alloc;
pub mod bounded_stack;
pub mod error;
pub mod lazy_list;
pub mod two_lock_queue;

pub use alloc::{try_box, AllocError};
pub use bounded_stack::BoundedStack;
pub use error::ContainerError;
pub use lazy_list::{validate, Keyed, LazyList, PairSnapshot, HEAD_KEY, TAIL_KEY};
pub use two_lock_queue::TwoLockQueue;
