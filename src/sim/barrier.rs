//! Single-use rendezvous barriers for phase transitions.
//!
//! # Semantics
//!
//! A [`PhaseBarrier`] is created for a fixed cohort of `parties` threads and
//! releases all of them once exactly that many have called
//! [`wait`](PhaseBarrier::wait). It is not reusable: an arrival after release
//! is reported as [`BarrierError::Exhausted`].
//!
//! Unlike `std::sync::Barrier`, a barrier can be broken. Breaking wakes every
//! waiter with [`BarrierError::Broken`], so a worker that panics (or a worker
//! that was never spawned) cannot strand the rest of its cohort forever.
//!
//! # Design Notes
//!
//! Mutex + Condvar. Each barrier is crossed once per party per run.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

#[derive(Debug, Default)]
struct State {
    arrived: usize,
    released: bool,
    broken: bool,
}

/// Why a barrier wait did not complete normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarrierError {
    /// The barrier was broken before its cohort assembled.
    Broken { barrier: &'static str },
    /// More parties arrived than the barrier was created for.
    Exhausted { barrier: &'static str },
}

impl fmt::Display for BarrierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broken { barrier } => write!(f, "barrier '{barrier}' was broken"),
            Self::Exhausted { barrier } => {
                write!(f, "barrier '{barrier}' already released its cohort")
            }
        }
    }
}

impl std::error::Error for BarrierError {}

/// Outcome of a successful [`PhaseBarrier::wait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarrierWait {
    leader: bool,
}

impl BarrierWait {
    /// `true` for exactly one party: the one whose arrival completed the cohort.
    #[inline]
    pub fn is_leader(&self) -> bool {
        self.leader
    }
}

/// Breakable, single-use barrier for a fixed cohort.
#[derive(Debug)]
pub struct PhaseBarrier {
    name: &'static str,
    parties: usize,
    state: Mutex<State>,
    cv: Condvar,
}

impl PhaseBarrier {
    /// # Panics
    ///
    /// Panics if `parties` is 0.
    pub fn new(name: &'static str, parties: usize) -> Self {
        assert!(parties > 0, "barrier '{name}' needs at least one party");
        Self {
            name,
            parties,
            state: Mutex::new(State::default()),
            cv: Condvar::new(),
        }
    }

    /// Lock state with poison recovery.
    #[inline]
    fn lock_or_recover(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Block until `parties` threads have arrived or the barrier is broken.
    pub fn wait(&self) -> Result<BarrierWait, BarrierError> {
        let mut st = self.lock_or_recover();
        if st.released {
            return Err(BarrierError::Exhausted { barrier: self.name });
        }
        if st.broken {
            return Err(BarrierError::Broken { barrier: self.name });
        }

        st.arrived += 1;
        if st.arrived == self.parties {
            st.released = true;
            drop(st);
            self.cv.notify_all();
            return Ok(BarrierWait { leader: true });
        }

        while !st.released && !st.broken {
            st = self.cv.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
        if st.released {
            Ok(BarrierWait { leader: false })
        } else {
            Err(BarrierError::Broken { barrier: self.name })
        }
    }

    /// Wake every waiter with [`BarrierError::Broken`]. No effect once the
    /// cohort has been released.
    pub fn break_barrier(&self) {
        let mut st = self.lock_or_recover();
        if st.released || st.broken {
            return;
        }
        st.broken = true;
        drop(st);
        self.cv.notify_all();
    }

    pub fn is_broken(&self) -> bool {
        self.lock_or_recover().broken
    }

    /// Parties currently waiting (or already released).
    pub fn arrived(&self) -> usize {
        self.lock_or_recover().arrived
    }
}

/// The three rendezvous points of a run.
#[derive(Debug)]
pub struct RunBarriers {
    /// Producers + validator: all reservations have been routed.
    pub produced: PhaseBarrier,
    /// Relayers + validator: phase-1 checks are done, relaying may start.
    pub relay_start: PhaseBarrier,
    /// Relayers + validator: every relayer finished its flight.
    pub relayed: PhaseBarrier,
}

impl RunBarriers {
    pub fn new(producers: usize, relayers: usize) -> Self {
        Self {
            produced: PhaseBarrier::new("produced", producers + 1),
            relay_start: PhaseBarrier::new("relay-start", relayers + 1),
            relayed: PhaseBarrier::new("relayed", relayers + 1),
        }
    }

    pub fn break_all(&self) {
        tracing::debug!(
            produced = self.produced.arrived(),
            relay_start = self.relay_start.arrived(),
            relayed = self.relayed.arrived(),
            "breaking run barriers"
        );
        self.produced.break_barrier();
        self.relay_start.break_barrier();
        self.relayed.break_barrier();
    }
}

/// Breaks every run barrier if dropped during a panic.
///
/// Each worker holds one for its whole lifetime.
#[must_use = "the guard only acts while it is alive"]
pub struct BreakOnPanic<'a> {
    barriers: &'a RunBarriers,
}

impl<'a> BreakOnPanic<'a> {
    pub fn new(barriers: &'a RunBarriers) -> Self {
        Self { barriers }
    }
}

impl Drop for BreakOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.barriers.break_all();
        }
    }
}
