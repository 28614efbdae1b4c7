//! Error types shared by the concurrent containers.
//!
//! All of these are container-local: they are handled by the immediate
//! caller and never describe a run-level failure. Enums are
//! `#[non_exhaustive]`; consumers should include a fallback match arm.

use std::fmt;

use super::alloc::AllocError;

/// Failures reported by container operations.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContainerError {
    /// `pop`, `dequeue` or `delete_min` on an empty container.
    Empty,
    /// Insert of a key that is already live in a sorted set. No state change.
    Duplicate { key: i64 },
    /// Key collides with a sentinel bound of a sorted set.
    ReservedKey { key: i64 },
    /// Node allocation failed.
    Alloc(AllocError),
}

impl From<AllocError> for ContainerError {
    #[inline]
    fn from(err: AllocError) -> Self {
        Self::Alloc(err)
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "container is empty"),
            Self::Duplicate { key } => write!(f, "key {key} is already present"),
            Self::ReservedKey { key } => write!(f, "key {key} is reserved for a sentinel"),
            Self::Alloc(err) => write!(f, "node allocation failed: {err}"),
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Alloc(err) => Some(err),
            _ => None,
        }
    }
}
