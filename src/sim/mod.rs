//! Two-phase reservation workload over the `stdx` containers.
//!
//! Purpose:
//! - Exercise the stack, queue and lazy list under a fixed, closed thread
//!   population derived from one parameter `A`.
//! - Re-verify conservation of reservations at both phase boundaries.
//!
//! Invariants:
//! - Reservation numbers are exactly `1..=A³` and unique.
//! - Phase 1 routes every reservation into some stack or queue; phase 2 only
//!   relocates, so size and key sum are the same at both checks.
//! - Barrier cohorts are producers + validator, then relayers + validator
//!   (twice). A failing or panicking worker breaks every barrier.

pub mod barrier;
pub mod checks;
pub mod config;
pub mod counter;
pub mod error;
pub mod flight;
pub mod phase;
pub mod roles;
pub mod runner;

pub use barrier::{BarrierError, BarrierWait, BreakOnPanic, PhaseBarrier, RunBarriers};
pub use checks::{CheckKind, CheckLine, CheckReport, InvariantViolation};
pub use config::{SimConfig, DEFAULT_THREAD_STACK_SIZE, MAX_FLIGHTS, MIN_THREAD_STACK_SIZE};
pub use counter::InserterCount;
pub use error::{ConfigError, Role, SimError};
pub use flight::{center_tally, FlightSlot, ManagementCenter, Reservation, Route, Tally};
pub use phase::{Phase, PhaseCell, PhaseError};
pub use roles::{run_producer, run_relayer, ProducerStats, RelayerStats, Validator};
pub use runner::{RunReport, RunState, RunStats, Simulation};
