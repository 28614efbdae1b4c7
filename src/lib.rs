//! Concurrent containers and a barrier-coordinated workload that stresses them.
//!
//! ## Scope
//! Three hand-built concurrent containers live in [`stdx`]: a bounded stack,
//! a two-lock FIFO queue and a lazily synchronized sorted set. [`sim`] runs a
//! two-phase reservation workload over them with `A²` producer threads, `A`
//! relayer threads and one validator, re-checking conservation invariants at
//! each phase boundary.
//!
//! ## Key invariants
//! - Stacks never exceed their capacity; the capacity check is repeated under
//!   the stack lock.
//! - Queues are strictly FIFO per producer; head and tail locks never alias.
//! - Live entries of the sorted set are strictly ascending with no duplicate
//!   keys at every quiescent point. Removed nodes are reclaimed through
//!   epoch-deferred destruction, never while an unlocked reader may hold them.
//! - Phase 2 relocates reservations but never creates or destroys them, so the
//!   total count and key sum match the phase-1 values.
//!
//! ## Run flow
//! `produce -> barrier -> check -> barrier -> relay (queue -> center -> stack)
//! -> barrier -> check + drain completion -> DONE | FAILED`
//!
//! ## Notable entry points
//! - [`Simulation`] / [`SimConfig`]: configure and execute a run.
//! - [`RunReport`] / [`CheckReport`]: per-phase check lines with a stable
//!   text form.
//! - [`stdx::BoundedStack`], [`stdx::TwoLockQueue`], [`stdx::LazyList`].

pub mod sim;
pub mod stdx;

pub use sim::{
    CheckKind, CheckLine, CheckReport, ConfigError, InvariantViolation, Phase, Reservation,
    RunReport, RunStats, SimConfig, SimError, Simulation,
};
