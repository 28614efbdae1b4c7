//! Error types for configuring and running a simulation.
//!
//! Container-local failures (`Empty`, `Duplicate`, a full stack) are handled
//! where they happen and never appear here. What reaches the caller of
//! [`Simulation::run`](super::Simulation::run) is either a configuration
//! problem, an invariant violation, or a failure of the thread cohort itself.

use std::fmt;
use std::io;

use crate::stdx::AllocError;

use super::barrier::BarrierError;
use super::checks::InvariantViolation;
use super::phase::PhaseError;
use super::runner::RunReport;

/// Invalid run configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The parameter is not a decimal integer that fits in `u32`.
    NotAPositiveInteger { value: String },
    /// `A` must be at least 1.
    ZeroFlights,
    /// `A` exceeds the supported thread population.
    TooManyFlights { flights: u32, max: u32 },
    /// Worker stack size below the supported minimum.
    StackTooSmall { bytes: usize, min: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAPositiveInteger { value } => {
                write!(f, "expected a positive integer, got '{value}'")
            }
            Self::ZeroFlights => write!(f, "number of flights must be >= 1"),
            Self::TooManyFlights { flights, max } => {
                write!(f, "number of flights {flights} exceeds maximum {max}")
            }
            Self::StackTooSmall { bytes, min } => {
                write!(f, "worker stack size {bytes} bytes is below minimum {min}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which worker a cohort failure is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Producer (agency) with its 1-based id.
    Producer(u32),
    /// Relayer (airline) for a flight index.
    Relayer(u32),
    Validator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer(id) => write!(f, "producer-{id}"),
            Self::Relayer(flight) => write!(f, "relayer-{flight}"),
            Self::Validator => write!(f, "validator"),
        }
    }
}

/// Failure of a simulation run.
#[derive(Debug)]
#[non_exhaustive]
pub enum SimError {
    Config(ConfigError),
    /// A phase check failed. The run halted at that phase boundary.
    Invariant {
        violation: InvariantViolation,
        report: Box<RunReport>,
    },
    /// Allocating a container or node failed.
    Alloc { role: Role, source: AllocError },
    /// The OS refused to start a worker thread.
    Spawn { role: Role, source: io::Error },
    /// A worker thread panicked.
    WorkerPanicked { role: Role },
    /// A barrier was broken before its cohort assembled.
    Barrier { role: Role, source: BarrierError },
    /// The validator attempted an out-of-order phase transition.
    Phase(PhaseError),
}

impl SimError {
    /// The invariant violation, if this run failed a phase check.
    pub fn violation(&self) -> Option<&InvariantViolation> {
        match self {
            Self::Invariant { violation, .. } => Some(violation),
            _ => None,
        }
    }
}

impl From<ConfigError> for SimError {
    #[inline]
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<PhaseError> for SimError {
    #[inline]
    fn from(err: PhaseError) -> Self {
        Self::Phase(err)
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
            Self::Invariant { violation, .. } => write!(f, "{violation}"),
            Self::Alloc { role, source } => write!(f, "{role}: {source}"),
            Self::Spawn { role, source } => write!(f, "failed to spawn {role}: {source}"),
            Self::WorkerPanicked { role } => write!(f, "{role} panicked"),
            Self::Barrier { role, source } => write!(f, "{role}: {source}"),
            Self::Phase(err) => write!(f, "validator: {err}"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Invariant { violation, .. } => Some(violation),
            Self::Alloc { source, .. } => Some(source),
            Self::Spawn { source, .. } => Some(source),
            Self::Barrier { source, .. } => Some(source),
            Self::Phase(err) => Some(err),
            Self::WorkerPanicked { .. } => None,
        }
    }
}
