//! Configuration for a simulation run.
//!
//! Everything is derived from one parameter `A` (`flights`):
//! `A` flights, `A` relayers (one per flight) and `A²` producers, each of
//! which emits one reservation per flight.

use super::error::ConfigError;

/// Upper bound on `A`. Keeps the producer population at 4096 threads.
pub const MAX_FLIGHTS: u32 = 64;

/// Default stack size for spawned workers. Workers keep almost nothing on
/// the stack and large `A` spawns thousands of them.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 256 * 1024;

/// Smallest accepted worker stack size.
pub const MIN_THREAD_STACK_SIZE: usize = 64 * 1024;

/// Configuration for a simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// The run parameter `A`.
    pub flights: u32,

    /// Stack size in bytes for every spawned worker thread.
    pub thread_stack_size: usize,
}

impl SimConfig {
    /// Create a configuration for `A = flights`.
    pub fn new(flights: u32) -> Self {
        Self {
            flights,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }

    /// Parse the command-line form of `A`.
    pub fn from_arg(arg: &str) -> Result<Self, ConfigError> {
        let flights = arg
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::NotAPositiveInteger {
                value: arg.to_string(),
            })?;
        let config = Self::new(flights);
        config.validate()?;
        Ok(config)
    }

    /// Set the worker stack size.
    pub fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flights == 0 {
            return Err(ConfigError::ZeroFlights);
        }
        if self.flights > MAX_FLIGHTS {
            return Err(ConfigError::TooManyFlights {
                flights: self.flights,
                max: MAX_FLIGHTS,
            });
        }
        if self.thread_stack_size < MIN_THREAD_STACK_SIZE {
            return Err(ConfigError::StackTooSmall {
                bytes: self.thread_stack_size,
                min: MIN_THREAD_STACK_SIZE,
            });
        }
        Ok(())
    }

    /// `A²` producer (agency) threads.
    #[inline]
    pub fn producers(&self) -> u32 {
        self.flights * self.flights
    }

    /// `A` relayer (airline) threads, one per flight.
    #[inline]
    pub fn relayers(&self) -> u32 {
        self.flights
    }

    /// `A³`: every producer emits one reservation per flight.
    pub fn expected_total(&self) -> u64 {
        u64::from(self.flights).pow(3)
    }

    /// `(A⁶ + A³) / 2`, the sum of `1..=A³`.
    ///
    /// Reservation numbers are exactly `1..=A³`, so this is the closed-form
    /// checksum of everything produced.
    pub fn expected_key_sum(&self) -> i64 {
        let a = i64::from(self.flights);
        (a.pow(6) + a.pow(3)) / 2
    }

    /// Reservation number for producer `producer_id` (1-based) on `flight`:
    /// `flight · A² + producer_id`. Unique across the run.
    #[inline]
    pub fn reservation_number(&self, flight: u32, producer_id: u32) -> i64 {
        i64::from(flight) * i64::from(self.producers()) + i64::from(producer_id)
    }

    /// Stack capacity of `flight`: `floor(1.5·A²) − (A−1−flight)·A`,
    /// clamped at zero.
    ///
    /// Computed as `3·A² / 2` so the scaling factor is never truncated to 1.
    pub fn stack_capacity(&self, flight: u32) -> usize {
        debug_assert!(flight < self.flights);
        let a = i64::from(self.flights);
        let i = i64::from(flight);
        let capacity = (3 * a * a) / 2 - (a - 1 - i) * a;
        usize::try_from(capacity.max(0)).unwrap_or(0)
    }

    /// Sum of all flight capacities.
    pub fn total_capacity(&self) -> u64 {
        (0..self.flights)
            .map(|flight| self.stack_capacity(flight) as u64)
            .sum()
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new(2)
    }
}
