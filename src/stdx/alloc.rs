//! Fallible single-object heap allocation.
//!
//! `Box::new` aborts the process when the global allocator returns null.
//! Container nodes are allocated through [`try_box`] instead so that an
//! out-of-memory condition surfaces as a typed [`AllocError`] the caller can
//! propagate.

use std::alloc::{alloc, Layout};
use std::fmt;
use std::ptr::NonNull;

/// The global allocator could not satisfy a container allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError {
    bytes: usize,
    align: usize,
}

impl AllocError {
    #[inline]
    fn from_layout(layout: Layout) -> Self {
        Self {
            bytes: layout.size(),
            align: layout.align(),
        }
    }

    /// Failure to reserve storage for `len` values of `T`.
    ///
    /// Saturates instead of overflowing so absurd requests still report.
    pub fn for_array<T>(len: usize) -> Self {
        Self {
            bytes: std::mem::size_of::<T>().saturating_mul(len),
            align: std::mem::align_of::<T>(),
        }
    }

    /// Requested size in bytes.
    #[inline]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocation of {} bytes (align {}) failed",
            self.bytes, self.align
        )
    }
}

impl std::error::Error for AllocError {}

/// Move `value` into a fresh heap allocation, reporting allocator failure.
///
/// Zero-sized types never touch the allocator.
pub fn try_box<T>(value: T) -> Result<Box<T>, AllocError> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Ok(Box::new(value));
    }

    // SAFETY: `layout` has non-zero size (checked above).
    let raw = unsafe { alloc(layout) }.cast::<T>();
    let Some(ptr) = NonNull::new(raw) else {
        return Err(AllocError::from_layout(layout));
    };

    // SAFETY: `ptr` is a fresh, properly aligned allocation of
    // `Layout::new::<T>()` from the global allocator, which is exactly what
    // `Box<T>` expects to own and later free.
    unsafe {
        ptr.as_ptr().write(value);
        Ok(Box::from_raw(ptr.as_ptr()))
    }
}
