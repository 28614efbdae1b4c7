//! The three worker roles of a run.
//!
//! - Producers (agencies) route one reservation per flight into that
//!   flight's stack, or its queue once the stack is full.
//! - Relayers (airlines) each own one flight. A relayer with queued
//!   reservations flushes them into the management center; a relayer with
//!   an empty queue pulls from the center onto its stack until the stack is
//!   full or nothing more can arrive.
//! - The validator drives the phase machine and checks the conservation
//!   invariants at both phase boundaries.
//!
//! Every worker holds a [`BreakOnPanic`] guard, and any worker that fails
//! breaks the run barriers before returning, so the rest of the cohort is
//! never left waiting on a party that will not arrive.

use crossbeam_utils::Backoff;

use crate::stdx::{AllocError, ContainerError};

use super::barrier::{BarrierError, BreakOnPanic, PhaseBarrier};
use super::checks::{CheckLine, CheckReport};
use super::error::{Role, SimError};
use super::flight::{center_tally, FlightSlot, Reservation, Route, Tally};
use super::phase::Phase;
use super::runner::RunState;

// ============================================================================
// Producer
// ============================================================================

/// What one producer did in phase 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub producer_id: u32,
    /// Reservations that landed on a stack.
    pub stacked: u64,
    /// Reservations that overflowed into a queue.
    pub queued: u64,
}

/// Produce one reservation per flight, then wait for the phase-1 cohort.
pub fn run_producer(state: &RunState, producer_id: u32) -> Result<ProducerStats, SimError> {
    let _guard = BreakOnPanic::new(state.barriers());
    let role = Role::Producer(producer_id);
    let config = state.config();
    let mut stats = ProducerStats {
        producer_id,
        ..ProducerStats::default()
    };

    for slot in state.slots() {
        let reservation = Reservation {
            producer_id,
            reservation_number: config.reservation_number(slot.index(), producer_id),
        };
        match slot.route(reservation) {
            Ok(Route::Stack) => stats.stacked += 1,
            Ok(Route::Queue) => stats.queued += 1,
            Err(source) => {
                tracing::error!(%role, flight = slot.index(), %source, "enqueue failed");
                state.barriers().break_all();
                return Err(SimError::Alloc { role, source });
            }
        }
    }

    tracing::trace!(
        %role,
        stacked = stats.stacked,
        queued = stats.queued,
        "produced"
    );
    wait(&state.barriers().produced, role)?;
    Ok(stats)
}

// ============================================================================
// Relayer
// ============================================================================

/// What one relayer did in phase 2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayerStats {
    pub flight: u32,
    /// Queued reservations inserted into the center.
    pub inserted: u64,
    /// Inserts refused because the key was already present.
    pub refused: u64,
    /// Reservations pulled from the center onto the stack.
    pub pulled: u64,
    /// `false` when phase 1 failed and the relayer stood down.
    pub relayed: bool,
}

/// Wait for phase 2, relay for `flight`, then wait for the phase-2 cohort.
pub fn run_relayer(state: &RunState, flight: u32) -> Result<RelayerStats, SimError> {
    let _guard = BreakOnPanic::new(state.barriers());
    let role = Role::Relayer(flight);
    let mut stats = RelayerStats {
        flight,
        ..RelayerStats::default()
    };

    wait(&state.barriers().relay_start, role)?;
    let phase = state.phase().get();
    if phase != Phase::Phase2Relay {
        tracing::debug!(%role, %phase, "phase 1 did not pass; standing down");
        return Ok(stats);
    }
    stats.relayed = true;

    let slot = &state.slots()[flight as usize];
    let relayed = if slot.queue().is_empty() {
        pull_from_center(state, slot, &mut stats)
    } else {
        let flushed = flush_queue(state, slot, &mut stats);
        // Pullers spin on this count; it must drop even if the flush failed.
        state.inserters().decrement();
        flushed
    };
    if let Err(err) = relayed {
        state.barriers().break_all();
        return Err(err.into_sim_error(role));
    }

    tracing::debug!(
        %role,
        inserted = stats.inserted,
        refused = stats.refused,
        pulled = stats.pulled,
        "relayed"
    );
    wait(&state.barriers().relayed, role)?;
    Ok(stats)
}

/// Relay failure local to one relayer, attributed to it by the caller.
enum RelayError {
    Alloc(AllocError),
    Barrier(BarrierError),
}

impl RelayError {
    fn into_sim_error(self, role: Role) -> SimError {
        match self {
            Self::Alloc(source) => SimError::Alloc { role, source },
            Self::Barrier(source) => SimError::Barrier { role, source },
        }
    }
}

/// Move every queued reservation into the center.
fn flush_queue(
    state: &RunState,
    slot: &FlightSlot,
    stats: &mut RelayerStats,
) -> Result<(), RelayError> {
    let center = state.center();
    while let Ok(reservation) = slot.queue().dequeue() {
        match center.insert(reservation) {
            Ok(()) => stats.inserted += 1,
            Err(ContainerError::Alloc(source)) => return Err(RelayError::Alloc(source)),
            Err(err) => {
                // Dropped here; the phase-2 conservation checks report it.
                tracing::warn!(flight = slot.index(), %err, "center refused reservation");
                stats.refused += 1;
            }
        }
    }
    Ok(())
}

/// Pull from the center onto the stack while there is room and something is
/// either in the center or still on its way there.
fn pull_from_center(
    state: &RunState,
    slot: &FlightSlot,
    stats: &mut RelayerStats,
) -> Result<(), RelayError> {
    let center = state.center();
    let stack = slot.stack();
    let backoff = Backoff::new();

    while !stack.is_full() && (!center.is_empty() || state.inserters().get() != 0) {
        match center.delete_min() {
            Ok(reservation) => {
                backoff.reset();
                if let Err(reservation) = stack.try_push(reservation) {
                    // Stack filled behind our back; return the entry.
                    match center.insert(reservation) {
                        Ok(()) => {}
                        Err(ContainerError::Alloc(source)) => {
                            return Err(RelayError::Alloc(source))
                        }
                        Err(err) => {
                            tracing::warn!(flight = slot.index(), %err, "center refused reservation");
                            stats.refused += 1;
                        }
                    }
                    break;
                }
                stats.pulled += 1;
            }
            Err(_) => {
                let relayed = &state.barriers().relayed;
                if relayed.is_broken() {
                    return Err(RelayError::Barrier(BarrierError::Broken {
                        barrier: relayed.name(),
                    }));
                }
                backoff.snooze();
            }
        }
    }
    Ok(())
}

fn wait(barrier: &PhaseBarrier, role: Role) -> Result<(), SimError> {
    let released = barrier
        .wait()
        .map_err(|source| SimError::Barrier { role, source })?;
    if released.is_leader() {
        tracing::debug!(barrier = barrier.name(), %role, "cohort complete");
    }
    Ok(())
}

// ============================================================================
// Validator
// ============================================================================

/// Phase driver and invariant checker.
///
/// Runs on the driver thread; it is the only party that advances the phase.
pub struct Validator<'a> {
    state: &'a RunState,
}

impl<'a> Validator<'a> {
    pub fn new(state: &'a RunState) -> Self {
        Self { state }
    }

    /// Drive the run from phase 1 to a terminal phase.
    ///
    /// Returns the check reports produced so far. A failed check is not an
    /// `Err`: the phase is set to `FAILED` and the failing report is the last
    /// one returned. On `Err` the caller must break the run barriers.
    pub fn run(&self) -> Result<Vec<CheckReport>, SimError> {
        let mut reports = Vec::with_capacity(2);
        let barriers = self.state.barriers();
        let phase = self.state.phase();

        self.rendezvous(&barriers.produced)?;
        phase.advance(Phase::Phase1Check)?;
        let phase1 = self.check_phase1();
        let phase1_passed = phase1.passed();
        reports.push(phase1);

        if !phase1_passed {
            phase.fail();
            tracing::error!("phase 1 checks failed; halting before relay");
            // Relayers are parked on this barrier; release them so they can
            // observe FAILED and exit. The relayed barrier is skipped.
            self.rendezvous(&barriers.relay_start)?;
            return Ok(reports);
        }

        let inserters = self.prepare_relay();
        phase.advance(Phase::Phase2Relay)?;
        tracing::info!(inserters, "phase 1 passed; relaying");
        self.rendezvous(&barriers.relay_start)?;
        self.rendezvous(&barriers.relayed)?;

        phase.advance(Phase::Phase2Check)?;
        let phase2 = self.check_phase2();
        if phase2.passed() {
            phase.advance(Phase::Done)?;
            tracing::info!("phase 2 passed");
        } else {
            phase.fail();
            tracing::error!("phase 2 checks failed");
        }
        reports.push(phase2);
        Ok(reports)
    }

    fn rendezvous(&self, barrier: &PhaseBarrier) -> Result<(), SimError> {
        wait(barrier, Role::Validator)
    }

    /// Overflow, total size and total keysum over every stack and queue.
    pub fn check_phase1(&self) -> CheckReport {
        let mut report = CheckReport::new(Phase::Phase1Check);
        self.check_residency(&mut report);
        report
    }

    /// Number of relayers that will flush a queue, published before any
    /// relayer is released so pullers never see a premature zero.
    pub fn prepare_relay(&self) -> usize {
        let inserters = self
            .state
            .slots()
            .iter()
            .filter(|slot| !slot.queue().is_empty())
            .count();
        self.state.inserters().set(inserters);
        inserters
    }

    /// Phase-1 checks again (relocation preserves both sums), plus drain
    /// completion.
    pub fn check_phase2(&self) -> CheckReport {
        let mut report = CheckReport::new(Phase::Phase2Check);
        self.check_residency(&mut report);

        let queued = self
            .state
            .slots()
            .iter()
            .map(|slot| slot.queue_tally().count)
            .sum();
        report.push(CheckLine::Completion {
            center: center_tally(self.state.center()).count,
            inserters: self.state.inserters().get(),
            queued,
        });
        report
    }

    fn check_residency(&self, report: &mut CheckReport) {
        let config = self.state.config();
        let mut resident = Tally::default();

        for slot in self.state.slots() {
            let stack = slot.stack_tally();
            report.push(CheckLine::Overflow {
                flight: slot.index(),
                capacity: slot.stack().capacity(),
                size: stack.count as usize,
                overflowed: slot.stack().has_overflowed(),
            });
            resident = resident.merge(stack).merge(slot.queue_tally());
        }

        report.push(CheckLine::TotalSize {
            expected: config.expected_total(),
            found: resident.count,
        });
        report.push(CheckLine::KeySum {
            expected: config.expected_key_sum(),
            found: resident.key_sum,
        });
    }
}
