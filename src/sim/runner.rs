//! Simulation driver.
//!
//! [`Simulation`] owns every shared structure of a run ([`RunState`]) and
//! executes the cohort inside `std::thread::scope`, so workers borrow the
//! state instead of sharing it through globals or reference counts.
//!
//! ```text
//!   driver (validator)      producers ×A²           relayers ×A
//!   ──────────────────      ─────────────           ───────────
//!   phase = PHASE1_PRODUCE
//!   spawn ───────────────▶  route into slots
//!   wait(produced) ◀──────▶ wait(produced)
//!   check phase 1
//!   prepare_relay
//!   wait(relay_start) ◀──────────────────────────▶  wait(relay_start)
//!                                                   flush queue / pull center
//!   wait(relayed) ◀──────────────────────────────▶  wait(relayed)
//!   check phase 2
//!   join all
//! ```

use std::fmt;
use std::io;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};

use crate::stdx::AllocError;

use super::barrier::RunBarriers;
use super::checks::CheckReport;
use super::config::SimConfig;
use super::counter::InserterCount;
use super::error::{Role, SimError};
use super::flight::{FlightSlot, ManagementCenter};
use super::phase::{Phase, PhaseCell};
use super::roles::{run_producer, run_relayer, ProducerStats, RelayerStats, Validator};

/// Everything the workers of one run share.
///
/// Created before any worker starts; dropped after every worker has joined.
#[derive(Debug)]
pub struct RunState {
    config: SimConfig,
    slots: Vec<FlightSlot>,
    center: ManagementCenter,
    inserters: InserterCount,
    barriers: RunBarriers,
    phase: PhaseCell,
}

impl RunState {
    /// Validate `config` and allocate every flight slot and the center.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let alloc_err = |source| SimError::Alloc {
            role: Role::Validator,
            source,
        };
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(config.flights as usize)
            .map_err(|_| alloc_err(AllocError::for_array::<FlightSlot>(config.flights as usize)))?;
        for flight in 0..config.flights {
            let slot = FlightSlot::new(flight, config.stack_capacity(flight)).map_err(alloc_err)?;
            slots.push(slot);
        }
        let center = ManagementCenter::new().map_err(alloc_err)?;

        Ok(Self {
            barriers: RunBarriers::new(config.producers() as usize, config.relayers() as usize),
            config,
            slots,
            center,
            inserters: InserterCount::new(0),
            phase: PhaseCell::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    #[inline]
    pub fn slots(&self) -> &[FlightSlot] {
        &self.slots
    }

    #[inline]
    pub fn center(&self) -> &ManagementCenter {
        &self.center
    }

    #[inline]
    pub fn inserters(&self) -> &InserterCount {
        &self.inserters
    }

    #[inline]
    pub fn barriers(&self) -> &RunBarriers {
        &self.barriers
    }

    #[inline]
    pub fn phase(&self) -> &PhaseCell {
        &self.phase
    }
}

/// Aggregate worker counters for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Reservations routed straight onto a stack in phase 1.
    pub stacked: u64,
    /// Reservations that overflowed into a queue in phase 1.
    pub queued: u64,
    /// Queue entries inserted into the center in phase 2.
    pub inserted: u64,
    /// Inserts the center refused in phase 2.
    pub refused: u64,
    /// Center entries pulled onto stacks in phase 2.
    pub pulled: u64,
}

impl RunStats {
    fn add_producer(&mut self, stats: &ProducerStats) {
        self.stacked += stats.stacked;
        self.queued += stats.queued;
    }

    fn add_relayer(&mut self, stats: &RelayerStats) {
        self.inserted += stats.inserted;
        self.refused += stats.refused;
        self.pulled += stats.pulled;
    }
}

/// Outcome of a run that reached a terminal phase.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub flights: u32,
    pub phase: Phase,
    /// One report per check boundary reached, in order.
    pub checks: Vec<CheckReport>,
    pub stats: RunStats,
    pub elapsed: Duration,
}

impl RunReport {
    #[inline]
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.checks {
            write!(f, "{report}")?;
        }
        Ok(())
    }
}

/// A configured run, ready to execute once.
#[derive(Debug)]
pub struct Simulation {
    state: RunState,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        Ok(Self {
            state: RunState::new(config)?,
        })
    }

    #[inline]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Execute both phases and return the final report.
    ///
    /// A failed invariant check yields [`SimError::Invariant`] carrying the
    /// report up to and including the failing boundary.
    pub fn run(self) -> Result<RunReport, SimError> {
        let state = &self.state;
        let config = state.config();
        let started = Instant::now();
        state.phase().advance(Phase::Phase1Produce)?;
        tracing::info!(
            flights = config.flights,
            producers = config.producers(),
            relayers = config.relayers(),
            expected_total = config.expected_total(),
            total_capacity = config.total_capacity(),
            "starting run"
        );

        let mut stats = RunStats::default();
        let outcome = thread::scope(|scope| -> Result<Vec<CheckReport>, SimError> {
            let mut producers = Vec::with_capacity(config.producers() as usize);
            let mut relayers = Vec::with_capacity(config.relayers() as usize);

            let spawned = (|| -> Result<(), SimError> {
                for flight in 0..config.relayers() {
                    let role = Role::Relayer(flight);
                    relayers.push(spawn(scope, state, role, move || run_relayer(state, flight))?);
                }
                for producer_id in 1..=config.producers() {
                    let role = Role::Producer(producer_id);
                    producers.push(spawn(scope, state, role, move || {
                        run_producer(state, producer_id)
                    })?);
                }
                Ok(())
            })();

            let validated = spawned.and_then(|()| Validator::new(state).run());
            if validated.is_err() {
                // Release anyone still parked so the scope can join them.
                state.phase().fail();
                state.barriers().break_all();
            }

            let mut worker_err: Option<SimError> = None;
            for (role, handle) in producers {
                match join(role, handle) {
                    Ok(producer) => stats.add_producer(&producer),
                    Err(err) => worker_err = Some(root_cause(worker_err.take(), err)),
                }
            }
            for (role, handle) in relayers {
                match join(role, handle) {
                    Ok(relayer) => stats.add_relayer(&relayer),
                    Err(err) => worker_err = Some(root_cause(worker_err.take(), err)),
                }
            }

            match (validated, worker_err) {
                (Ok(reports), None) => Ok(reports),
                (Ok(_), Some(err)) => Err(err),
                (Err(err), worker) => Err(root_cause(worker, err)),
            }
        });

        let checks = match outcome {
            Ok(checks) => checks,
            Err(err) => {
                tracing::error!(%err, "run aborted");
                return Err(err);
            }
        };

        let report = RunReport {
            flights: config.flights,
            phase: state.phase().get(),
            checks,
            stats,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            phase = %report.phase,
            stacked = stats.stacked,
            queued = stats.queued,
            inserted = stats.inserted,
            pulled = stats.pulled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run finished"
        );

        match report.checks.last().and_then(CheckReport::violation) {
            Some(violation) => Err(SimError::Invariant {
                violation,
                report: Box::new(report),
            }),
            None => Ok(report),
        }
    }
}

type Worker<'scope, T> = (Role, ScopedJoinHandle<'scope, Result<T, SimError>>);

fn spawn<'scope, 'env, T, F>(
    scope: &'scope Scope<'scope, 'env>,
    state: &'env RunState,
    role: Role,
    f: F,
) -> Result<Worker<'scope, T>, SimError>
where
    T: Send + 'scope,
    F: FnOnce() -> Result<T, SimError> + Send + 'scope,
{
    thread::Builder::new()
        .name(role.to_string())
        .stack_size(state.config().thread_stack_size)
        .spawn_scoped(scope, f)
        .map(|handle| (role, handle))
        .map_err(|source: io::Error| SimError::Spawn { role, source })
}

fn join<T>(role: Role, handle: ScopedJoinHandle<'_, Result<T, SimError>>) -> Result<T, SimError> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(%role, "worker panicked");
            Err(SimError::WorkerPanicked { role })
        }
    }
}

/// Pick the more informative of two failures. Broken-barrier errors are
/// fallout from some other failure, so anything else wins over them; between
/// equals the earlier one is kept.
fn root_cause(current: Option<SimError>, err: SimError) -> SimError {
    match current {
        None => err,
        Some(SimError::Barrier { .. }) if !matches!(err, SimError::Barrier { .. }) => err,
        Some(current) => current,
    }
}
