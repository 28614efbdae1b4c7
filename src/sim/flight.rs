//! Reservations, per-flight storage and the shared management center.

use crate::stdx::{AllocError, BoundedStack, Keyed, LazyList, TwoLockQueue};

/// A reservation produced by one agency for one flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Reservation {
    /// 1-based id of the producer that created it.
    pub producer_id: u32,
    /// Globally unique; the sort and search key everywhere.
    pub reservation_number: i64,
}

impl Keyed for Reservation {
    #[inline]
    fn key(&self) -> i64 {
        self.reservation_number
    }
}

/// The global sorted set through which relayers hand reservations over.
pub type ManagementCenter = LazyList<Reservation>;

/// Where a produced reservation ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Completed: the flight's stack had room.
    Stack,
    /// Pending: overflowed into the flight's queue.
    Queue,
}

/// Count and key sum of a set of reservations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub count: u64,
    pub key_sum: i64,
}

impl Tally {
    #[inline]
    fn add(self, reservation: &Reservation) -> Self {
        Self {
            count: self.count + 1,
            key_sum: self.key_sum + reservation.reservation_number,
        }
    }

    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            key_sum: self.key_sum + other.key_sum,
        }
    }
}

/// One flight's completed (stack) and pending (queue) reservations.
///
/// Created before any worker starts and never resized.
#[derive(Debug)]
pub struct FlightSlot {
    index: u32,
    completed: BoundedStack<Reservation>,
    pending: TwoLockQueue<Reservation>,
}

impl FlightSlot {
    pub fn new(index: u32, capacity: usize) -> Result<Self, AllocError> {
        Ok(Self {
            index,
            completed: BoundedStack::with_capacity(capacity)?,
            pending: TwoLockQueue::new()?,
        })
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn stack(&self) -> &BoundedStack<Reservation> {
        &self.completed
    }

    #[inline]
    pub fn queue(&self) -> &TwoLockQueue<Reservation> {
        &self.pending
    }

    /// Producer routing: push onto the stack if there is room, otherwise
    /// enqueue as pending.
    pub fn route(&self, reservation: Reservation) -> Result<Route, AllocError> {
        match self.completed.try_push(reservation) {
            Ok(()) => Ok(Route::Stack),
            Err(rejected) => {
                self.pending.enqueue(rejected)?;
                Ok(Route::Queue)
            }
        }
    }

    /// Tally of the stack contents, read under the stack lock.
    pub fn stack_tally(&self) -> Tally {
        self.completed.fold(Tally::default(), Tally::add)
    }

    /// Tally of the queue contents, read under both queue locks.
    pub fn queue_tally(&self) -> Tally {
        self.pending.fold(Tally::default(), Tally::add)
    }
}

/// Tally of everything currently in the management center.
pub fn center_tally(center: &ManagementCenter) -> Tally {
    center.fold(Tally::default(), Tally::add)
}
