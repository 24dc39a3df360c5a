//! Durable storage port of the booking service.
//!
//! The service keeps the authoritative state in memory and writes every
//! committed change through a [`BookingJournal`] while it still holds the
//! schedule lock. A failed write is rolled back in memory, so storage and
//! memory never diverge on an acknowledged operation.

use futures::future::{self, BoxFuture};

use crate::error::JournalError;
use crate::models::{Booking, Cancellation, Schedule, SeatEntry, SeatId};

/// Everything needed to rebuild the in-memory stores on start.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub schedules: Vec<Schedule>,
    pub seats: Vec<SeatEntry>,
    pub bookings: Vec<Booking>,
}

/// Returns `BoxFuture` so the journal can live behind `Arc<dyn BookingJournal>`.
pub trait BookingJournal: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<Snapshot, JournalError>>;

    /// New schedule together with its freshly seeded seats.
    fn save_schedule<'a>(&'a self, schedule: &'a Schedule, seats: &'a [SeatId]) -> BoxFuture<'a, Result<(), JournalError>>;

    /// Counters and active flag of an existing schedule.
    fn save_schedule_state<'a>(&'a self, schedule: &'a Schedule) -> BoxFuture<'a, Result<(), JournalError>>;

    /// Claimed seats, decremented counter and the new booking, in one unit.
    fn save_reservation<'a>(&'a self, schedule: &'a Schedule, booking: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>>;

    /// Released seats, incremented counter and the shrunk or deleted booking, in one unit.
    fn save_cancellation<'a>(
        &'a self,
        schedule: &'a Schedule,
        cancellation: &'a Cancellation,
    ) -> BoxFuture<'a, Result<(), JournalError>>;

    /// Status and payment marker of a booking.
    fn save_booking_state<'a>(&'a self, booking: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>>;

    /// Every booking a schedule completion changed, in one unit.
    fn save_completion<'a>(&'a self, schedule_id: i64, bookings: &'a [Booking]) -> BoxFuture<'a, Result<(), JournalError>>;
}

/// Journal for runs without a database: accepts every write, remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatileJournal;

impl BookingJournal for VolatileJournal {
    fn load(&self) -> BoxFuture<'_, Result<Snapshot, JournalError>> {
        Box::pin(future::ready(Ok(Snapshot::default())))
    }

    fn save_schedule<'a>(&'a self, _: &'a Schedule, _: &'a [SeatId]) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(future::ready(Ok(())))
    }

    fn save_schedule_state<'a>(&'a self, _: &'a Schedule) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(future::ready(Ok(())))
    }

    fn save_reservation<'a>(&'a self, _: &'a Schedule, _: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(future::ready(Ok(())))
    }

    fn save_cancellation<'a>(&'a self, _: &'a Schedule, _: &'a Cancellation) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(future::ready(Ok(())))
    }

    fn save_booking_state<'a>(&'a self, _: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(future::ready(Ok(())))
    }

    fn save_completion<'a>(&'a self, _: i64, _: &'a [Booking]) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(future::ready(Ok(())))
    }
}
