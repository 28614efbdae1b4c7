//! Run phases and the shared cell that publishes the current one.
//!
//! ```text
//! INIT → PHASE1_PRODUCE → PHASE1_CHECK → PHASE2_RELAY → PHASE2_CHECK → DONE
//!            └──────────────────┴──────────────┴──────────────┴──────→ FAILED
//! ```
//!
//! Only the validator advances the phase. Relayers read it right after the
//! relay-start barrier to learn whether phase 1 passed.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Phase1Produce,
    Phase1Check,
    Phase2Relay,
    Phase2Check,
    Done,
    Failed,
}

impl Phase {
    /// Successor on the success path; `None` for terminal phases.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::Phase1Produce),
            Self::Phase1Produce => Some(Self::Phase1Check),
            Self::Phase1Check => Some(Self::Phase2Relay),
            Self::Phase2Relay => Some(Self::Phase2Check),
            Self::Phase2Check => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Any non-terminal phase may fail; otherwise only the success-path
    /// successor is reachable.
    pub fn can_advance_to(self, to: Self) -> bool {
        if to == Self::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Phase1Produce => "PHASE1_PRODUCE",
            Self::Phase1Check => "PHASE1_CHECK",
            Self::Phase2Relay => "PHASE2_RELAY",
            Self::Phase2Check => "PHASE2_CHECK",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected phase transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseError {
    pub from: Phase,
    pub to: Phase,
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal phase transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for PhaseError {}

/// Current phase, shared by reference with every worker.
#[derive(Debug)]
pub struct PhaseCell {
    current: Mutex<Phase>,
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseCell {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Phase::Init),
        }
    }

    #[inline]
    fn lock_or_recover(&self) -> MutexGuard<'_, Phase> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn get(&self) -> Phase {
        *self.lock_or_recover()
    }

    /// Move to `to`, returning the phase that was left.
    pub fn advance(&self, to: Phase) -> Result<Phase, PhaseError> {
        let mut current = self.lock_or_recover();
        let from = *current;
        if !from.can_advance_to(to) {
            return Err(PhaseError { from, to });
        }
        *current = to;
        tracing::debug!(from = %from, to = %to, "phase transition");
        Ok(from)
    }

    /// Enter `FAILED` unless the run is already terminal.
    pub fn fail(&self) -> Phase {
        let mut current = self.lock_or_recover();
        if !current.is_terminal() {
            *current = Phase::Failed;
        }
        *current
    }
}
