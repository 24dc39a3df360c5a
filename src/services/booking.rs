//! Booking service: the only writer of seat state.
//!
//! Every mutation of a schedule (reserve, cancel, capacity override,
//! completion, deactivation) runs under that schedule's async lock, held
//! across the seat ledger, the counter, the booking ledger and the journal
//! write. Different schedules never contend. Reads go straight to the stores
//! and may be stale; `reserve` re-validates under the lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use super::booking_ledger::{BookingLedger, NewBooking};
use super::journal::BookingJournal;
use super::schedules::ScheduleStore;
use super::seat_ledger::SeatLedger;
use super::seat_map;
use crate::config::BookingConfig;
use crate::error::BookingError;
use crate::models::{
    Actor, Booking, BookingStatus, Cancellation, NewSchedule, PaymentStatus, Schedule, SeatEntry, SeatId, Showing,
};

type ScheduleLock = Arc<AsyncMutex<()>>;

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub schedule_id: i64,
    pub seats: BTreeSet<SeatId>,
    /// Fee quoted to the customer; must equal `seats × seat_price`.
    pub fee: i64,
    pub payment_status: PaymentStatus,
}

/// Which seats of a booking to cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatSelection {
    All,
    Only(BTreeSet<SeatId>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelOutcome {
    pub booking_id: i64,
    pub schedule_id: i64,
    pub released: BTreeSet<SeatId>,
    /// `Cancelled` when the booking was deleted, `Ongoing` otherwise.
    pub status: BookingStatus,
    pub remaining: Option<Booking>,
}

impl From<Cancellation> for CancelOutcome {
    fn from(cancellation: Cancellation) -> Self {
        let status = match cancellation.remaining {
            Some(ref booking) => booking.status,
            None => BookingStatus::Cancelled,
        };
        Self {
            booking_id: cancellation.booking_id(),
            schedule_id: cancellation.schedule_id(),
            released: cancellation.released,
            status,
            remaining: cancellation.remaining,
        }
    }
}

pub struct BookingService {
    schedules: ScheduleStore,
    seats: SeatLedger,
    bookings: BookingLedger,
    locks: Mutex<HashMap<i64, ScheduleLock>>,
    creation: AsyncMutex<()>,
    journal: Arc<dyn BookingJournal>,
    defaults: BookingConfig,
}

impl BookingService {
    pub fn new(defaults: BookingConfig, journal: Arc<dyn BookingJournal>) -> Self {
        let bookings = BookingLedger::new(defaults.reference_attempts);
        Self::with_booking_ledger(defaults, journal, bookings)
    }

    pub fn with_booking_ledger(defaults: BookingConfig, journal: Arc<dyn BookingJournal>, bookings: BookingLedger) -> Self {
        Self {
            schedules: ScheduleStore::new(),
            seats: SeatLedger::new(),
            bookings,
            locks: Mutex::new(HashMap::new()),
            creation: AsyncMutex::new(()),
            journal,
            defaults,
        }
    }

    /// Rebuilds the in-memory stores from the journal. Call once before serving.
    pub async fn restore(&self) -> Result<usize, BookingError> {
        let snapshot = self.journal.load().await?;
        let loaded = snapshot.schedules.len();

        let mut active = Vec::new();
        for schedule in snapshot.schedules {
            if schedule.is_active {
                active.push(schedule.id);
            }
            self.schedules.insert(schedule);
        }
        self.seats.restore(snapshot.seats);
        for booking in snapshot.bookings {
            self.bookings.restore(booking);
        }

        let mut locks = self.locks.lock();
        for schedule_id in active {
            locks.entry(schedule_id).or_default();
            if !self.is_consistent(schedule_id) {
                warn!("Schedule {} restored with a counter that disagrees with its seat ledger", schedule_id);
            }
        }
        info!("Restored {} schedules from journal", loaded);
        Ok(loaded)
    }

    /// Template for a new screening using the configured layout and price.
    pub fn new_schedule(&self, showing: Showing) -> NewSchedule {
        NewSchedule {
            movie: showing.movie,
            show_date: showing.show_date,
            show_time: showing.show_time,
            layout: self.defaults.layout(),
            seat_price: self.defaults.seat_price,
        }
    }

    // --- Admin operations ---

    pub async fn create_schedule(&self, actor: &Actor, new: NewSchedule) -> Result<Schedule, BookingError> {
        require_admin(actor, "create schedules")?;
        let _creation = self.creation.lock().await;

        let schedule = self.schedules.create(new, &self.seats)?;
        let seat_ids = seat_map::for_layout(&schedule.layout);
        if let Err(err) = self.journal.save_schedule(&schedule, &seat_ids).await {
            error!("Failed to store schedule {}: {}", schedule.id, err);
            self.seats.forget(schedule.id);
            self.schedules.remove(schedule.id);
            return Err(err.into());
        }

        self.locks.lock().insert(schedule.id, ScheduleLock::default());
        info!(
            "Schedule {} created: '{}' {} {} ({} seats)",
            schedule.id, schedule.movie, schedule.show_date, schedule.show_time, schedule.total_seats
        );
        Ok(schedule)
    }

    /// Withdraws a screening. Seat entries and bookings stay resolvable; the
    /// schedule's lock handle is disposed.
    pub async fn deactivate_schedule(&self, actor: &Actor, schedule_id: i64) -> Result<Schedule, BookingError> {
        require_admin(actor, "deactivate schedules")?;
        let schedule_lock = match self.lock_handle(schedule_id) {
            Ok(handle) => handle,
            // Already inactive: nothing to do
            Err(BookingError::ScheduleInactive(_)) => return self.schedule(schedule_id),
            Err(err) => return Err(err),
        };
        let _guard = schedule_lock.lock().await;

        let current = self.schedule(schedule_id)?;
        if !current.is_active {
            return Ok(current);
        }

        let schedule = self.schedules.deactivate(schedule_id)?;
        if let Err(err) = self.journal.save_schedule_state(&schedule).await {
            error!("Failed to store deactivation of schedule {}: {}", schedule_id, err);
            self.rollback(self.schedules.set_active(schedule_id, true).map(|_| ()));
            return Err(err.into());
        }

        self.locks.lock().remove(&schedule_id);
        info!("Schedule {} deactivated", schedule_id);
        Ok(schedule)
    }

    /// Admin override of a schedule's counters.
    ///
    /// The seat ledger stays authoritative: the override is accepted only when
    /// `available` matches the ledger's free seats and `total` its size, which
    /// makes this the repair path for counters that drifted in storage.
    pub async fn adjust_capacity(
        &self,
        actor: &Actor,
        schedule_id: i64,
        total: i32,
        available: i32,
    ) -> Result<Schedule, BookingError> {
        require_admin(actor, "adjust capacity")?;
        if total < 0 || available < 0 || available > total {
            return Err(BookingError::InvalidCapacity { total, available });
        }

        let schedule_lock = self.lock_handle(schedule_id)?;
        let _guard = schedule_lock.lock().await;
        let previous = self.active_schedule(schedule_id)?;

        let entries = self.seats.entries(schedule_id)?;
        let free = entries.iter().filter(|entry| entry.available).count();
        if available as usize != free || total as usize != entries.len() {
            return Err(BookingError::CapacityViolation {
                schedule_id,
                available: previous.available_seats,
                total: previous.total_seats,
                delta: i64::from(available) - i64::from(previous.available_seats),
            });
        }

        let schedule = self.schedules.adjust_capacity(schedule_id, total, available)?;
        if let Err(err) = self.journal.save_schedule_state(&schedule).await {
            error!("Failed to store capacity of schedule {}: {}", schedule_id, err);
            self.rollback(
                self.schedules
                    .adjust_capacity(schedule_id, previous.total_seats, previous.available_seats)
                    .map(|_| ()),
            );
            return Err(err.into());
        }

        info!("Schedule {} capacity set to {}/{}", schedule_id, available, total);
        Ok(schedule)
    }

    /// Marks every ongoing booking of a screening completed.
    pub async fn complete_schedule(&self, actor: &Actor, schedule_id: i64) -> Result<Vec<Booking>, BookingError> {
        require_admin(actor, "complete schedules")?;
        let schedule_lock = self.lock_handle(schedule_id)?;
        let _guard = schedule_lock.lock().await;
        self.active_schedule(schedule_id)?;

        let completed = self.bookings.complete_schedule(schedule_id);
        if completed.is_empty() {
            return Ok(completed);
        }
        if let Err(err) = self.journal.save_completion(schedule_id, &completed).await {
            error!("Failed to store completion of schedule {}: {}", schedule_id, err);
            for booking in &completed {
                self.bookings.set_status(booking.id, BookingStatus::Ongoing);
            }
            return Err(err.into());
        }

        info!("Schedule {}: {} bookings completed", schedule_id, completed.len());
        Ok(completed)
    }

    // --- Customer operations ---

    /// Claims every requested seat for a new booking, or none of them.
    ///
    /// A conflict fails with `SeatUnavailable` naming the held seats; there is no retry.
    pub async fn reserve(&self, actor: &Actor, request: ReserveRequest) -> Result<Booking, BookingError> {
        if request.seats.is_empty() {
            return Err(BookingError::EmptySeatSet);
        }

        let schedule_lock = self.lock_handle(request.schedule_id)?;
        let _guard = schedule_lock.lock().await;
        let schedule = self.active_schedule(request.schedule_id)?;

        let seat_count = request.seats.len();
        let expected = schedule.fee_for(seat_count)?;
        if request.fee != expected {
            return Err(BookingError::FeeMismatch {
                expected,
                quoted: request.fee,
            });
        }

        let booking_id = self.bookings.next_id();
        if let Err(err) = self.seats.claim(schedule.id, &request.seats, booking_id) {
            warn!("Reservation on schedule {} by user {} rejected: {}", schedule.id, actor.id, err);
            return Err(err);
        }

        let schedule = match self.schedules.decrement_available(schedule.id, seat_count) {
            Ok(schedule) => schedule,
            Err(err) => {
                self.seats.release(schedule.id, &request.seats);
                return Err(err);
            }
        };

        let booking = match self.bookings.record(NewBooking {
            id: booking_id,
            owner_id: actor.id,
            schedule: &schedule,
            seats: request.seats.clone(),
            fee: request.fee,
            payment_status: request.payment_status,
        }) {
            Ok(booking) => booking,
            Err(err) => {
                warn!("Booking record for schedule {} failed, releasing claim: {}", schedule.id, err);
                self.undo_claim(schedule.id, &request.seats);
                return Err(err);
            }
        };

        if let Err(err) = self.journal.save_reservation(&schedule, &booking).await {
            error!("Failed to store booking {}: {}", booking.id, err);
            self.bookings.remove(booking.id);
            self.undo_claim(schedule.id, &request.seats);
            return Err(err.into());
        }

        info!(
            "Booking {} ({}) reserved {} on schedule {}, {} seats left",
            booking.id,
            booking.reference,
            booking.seat_list(),
            schedule.id,
            schedule.available_seats
        );
        Ok(booking)
    }

    /// Reserves by `(movie, date, time)` instead of schedule id.
    pub async fn reserve_showing(
        &self,
        actor: &Actor,
        showing: &Showing,
        seats: BTreeSet<SeatId>,
        fee: i64,
        payment_status: PaymentStatus,
    ) -> Result<Booking, BookingError> {
        let schedule = self.find_schedule(showing)?;
        self.reserve(
            actor,
            ReserveRequest {
                schedule_id: schedule.id,
                seats,
                fee,
                payment_status,
            },
        )
        .await
    }

    /// Cancels some or all seats of the caller's booking and returns them to the pool.
    pub async fn cancel(&self, actor: &Actor, booking_id: i64, selection: SeatSelection) -> Result<CancelOutcome, BookingError> {
        let booking = self.bookings.get_owned(booking_id, actor.id)?;
        let schedule_id = booking.schedule_id;

        let schedule_lock = self.lock_handle(schedule_id)?;
        let _guard = schedule_lock.lock().await;

        let cancellation = match &selection {
            SeatSelection::All => self.bookings.full_cancel(booking_id, actor.id)?,
            SeatSelection::Only(seats) => self.bookings.partial_cancel(booking_id, actor.id, seats)?,
        };

        let freed = self.seats.release(schedule_id, &cancellation.released);
        let schedule = match self.schedules.increment_available(schedule_id, freed) {
            Ok(schedule) => schedule,
            Err(err) => {
                self.undo_cancellation(&cancellation, 0);
                return Err(err);
            }
        };

        if let Err(err) = self.journal.save_cancellation(&schedule, &cancellation).await {
            error!("Failed to store cancellation of booking {}: {}", booking_id, err);
            self.undo_cancellation(&cancellation, freed);
            return Err(err.into());
        }

        info!(
            "Booking {} released {} on schedule {} ({}), {} seats left",
            booking_id,
            crate::models::seat::format_seat_list(&cancellation.released),
            schedule_id,
            if cancellation.is_full() { "deleted" } else { "partial" },
            schedule.available_seats
        );
        Ok(cancellation.into())
    }

    /// Records the caller-supplied payment marker on a booking.
    pub async fn set_payment_status(
        &self,
        actor: &Actor,
        booking_id: i64,
        status: PaymentStatus,
    ) -> Result<Booking, BookingError> {
        let booking = self.bookings.get_owned(booking_id, actor.id)?;
        // Inactive schedules take no reserve/cancel traffic, so no lock is needed there
        let schedule_lock = self.locks.lock().get(&booking.schedule_id).cloned();
        let _guard = match schedule_lock {
            Some(ref handle) => Some(handle.lock().await),
            None => None,
        };

        let previous = self.bookings.get_owned(booking_id, actor.id)?.payment_status;
        let updated = self.bookings.set_payment_status(booking_id, actor.id, status)?;
        if let Err(err) = self.journal.save_booking_state(&updated).await {
            error!("Failed to store payment status of booking {}: {}", booking_id, err);
            self.rollback(self.bookings.set_payment_status(booking_id, actor.id, previous).map(|_| ()));
            return Err(err.into());
        }
        Ok(updated)
    }

    // --- Reads (lock-free, possibly stale) ---

    pub fn schedule(&self, schedule_id: i64) -> Result<Schedule, BookingError> {
        self.schedules
            .get(schedule_id)
            .ok_or(BookingError::ScheduleNotFound(schedule_id))
    }

    pub fn active_schedules(&self) -> Vec<Schedule> {
        self.schedules.list_active()
    }

    pub fn find_schedule(&self, showing: &Showing) -> Result<Schedule, BookingError> {
        self.schedules
            .find_active(&showing.movie, showing.show_date, showing.show_time)
            .ok_or_else(|| BookingError::ShowingNotFound(showing.clone()))
    }

    pub fn available_seats(&self, schedule_id: i64) -> Result<BTreeSet<SeatId>, BookingError> {
        self.seats.list_available(schedule_id)
    }

    pub fn seat_map(&self, schedule_id: i64) -> Result<Vec<SeatEntry>, BookingError> {
        self.seats.entries(schedule_id)
    }

    pub fn booking(&self, actor: &Actor, booking_id: i64) -> Result<Booking, BookingError> {
        self.bookings.get_owned(booking_id, actor.id)
    }

    pub fn bookings_for(&self, actor: &Actor) -> Vec<Booking> {
        self.bookings.for_owner(actor.id)
    }

    pub fn schedule_bookings(&self, actor: &Actor, schedule_id: i64) -> Result<Vec<Booking>, BookingError> {
        require_admin(actor, "list schedule bookings")?;
        self.schedule(schedule_id)?;
        Ok(self.bookings.for_schedule(schedule_id))
    }

    /// True when the schedule's counter equals its number of free ledger entries.
    pub fn is_consistent(&self, schedule_id: i64) -> bool {
        match (self.schedules.get(schedule_id), self.seats.available_count(schedule_id)) {
            (Some(schedule), Some(free)) => schedule.available_seats as usize == free,
            _ => false,
        }
    }

    // --- Internals ---

    fn lock_handle(&self, schedule_id: i64) -> Result<ScheduleLock, BookingError> {
        if let Some(handle) = self.locks.lock().get(&schedule_id) {
            return Ok(handle.clone());
        }
        match self.schedules.get(schedule_id) {
            Some(_) => Err(BookingError::ScheduleInactive(schedule_id)),
            None => Err(BookingError::ScheduleNotFound(schedule_id)),
        }
    }

    // Re-check under the lock: a deactivation may have won the race for it
    fn active_schedule(&self, schedule_id: i64) -> Result<Schedule, BookingError> {
        let schedule = self.schedule(schedule_id)?;
        if !schedule.is_active {
            return Err(BookingError::ScheduleInactive(schedule_id));
        }
        Ok(schedule)
    }

    fn undo_claim(&self, schedule_id: i64, seats: &BTreeSet<SeatId>) {
        let freed = self.seats.release(schedule_id, seats);
        self.rollback(self.schedules.increment_available(schedule_id, freed).map(|_| ()));
    }

    fn undo_cancellation(&self, cancellation: &Cancellation, freed: usize) {
        let schedule_id = cancellation.schedule_id();
        self.rollback(
            self.seats
                .claim(schedule_id, &cancellation.released, cancellation.booking_id()),
        );
        if freed > 0 {
            self.rollback(self.schedules.decrement_available(schedule_id, freed).map(|_| ()));
        }
        self.bookings.restore(cancellation.previous.clone());
    }

    fn rollback(&self, result: Result<(), BookingError>) {
        if let Err(err) = result {
            error!("Rollback step failed, state needs an audit: {}", err);
        }
    }
}

fn require_admin(actor: &Actor, action: &str) -> Result<(), BookingError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(BookingError::Unauthorized(format!("user {} may not {}", actor.id, action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seat::parse_seat_list;
    use crate::models::SeatLayout;
    use crate::services::journal::VolatileJournal;
    use chrono::{NaiveDate, NaiveTime};

    fn service() -> BookingService {
        BookingService::new(BookingConfig::default(), Arc::new(VolatileJournal))
    }

    fn showing() -> Showing {
        Showing {
            movie: "Harry Potter and the Prisoner of Azkaban".to_string(),
            show_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            show_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        }
    }

    fn seats(raw: &str) -> BTreeSet<SeatId> {
        parse_seat_list(raw).unwrap()
    }

    #[tokio::test]
    async fn customers_cannot_run_admin_operations() {
        let service = service();
        let customer = Actor::customer(1);
        let err = service
            .create_schedule(&customer, service.new_schedule(showing()))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Unauthorized(_)));
        assert!(service.active_schedules().is_empty());
    }

    #[tokio::test]
    async fn fee_must_match_seat_price() {
        let service = service();
        let schedule = service
            .create_schedule(&Actor::admin(1), service.new_schedule(showing()))
            .await
            .unwrap();

        let err = service
            .reserve(
                &Actor::customer(2),
                ReserveRequest {
                    schedule_id: schedule.id,
                    seats: seats("A1,A2"),
                    fee: 25_000,
                    payment_status: PaymentStatus::Pending,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::FeeMismatch { expected: 50_000, quoted: 25_000 }));
        assert_eq!(service.schedule(schedule.id).unwrap().available_seats, 40);
    }

    #[tokio::test]
    async fn lock_handle_follows_schedule_lifecycle() {
        let service = service();
        let admin = Actor::admin(1);
        let schedule = service.create_schedule(&admin, service.new_schedule(showing())).await.unwrap();
        assert!(service.lock_handle(schedule.id).is_ok());

        service.deactivate_schedule(&admin, schedule.id).await.unwrap();
        assert!(matches!(service.lock_handle(schedule.id), Err(BookingError::ScheduleInactive(_))));
        assert!(matches!(service.lock_handle(77), Err(BookingError::ScheduleNotFound(77))));

        // Second deactivation is a no-op
        assert!(!service.deactivate_schedule(&admin, schedule.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn overflowing_fee_fails_without_claiming() {
        let service = service();
        let show = showing();
        service.schedules.insert(Schedule {
            id: 7,
            movie: show.movie,
            show_date: show.show_date,
            show_time: show.show_time,
            layout: SeatLayout::default(),
            total_seats: 40,
            available_seats: 40,
            seat_price: i64::MAX / 2 + 1,
            is_active: true,
        });
        service.seats.seed(7, seat_map::generate(5, 8));
        service.locks.lock().insert(7, ScheduleLock::default());

        let err = service
            .reserve(
                &Actor::customer(2),
                ReserveRequest {
                    schedule_id: 7,
                    seats: seats("A1,A2"),
                    fee: 0,
                    payment_status: PaymentStatus::Pending,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidPrice { seat_count: 2, .. }));
        assert_eq!(service.available_seats(7).unwrap().len(), 40);
        assert!(service.is_consistent(7));
    }

    #[tokio::test]
    async fn cancel_outcome_reports_deletion() {
        let service = service();
        let schedule = service
            .create_schedule(&Actor::admin(1), service.new_schedule(showing()))
            .await
            .unwrap();
        let customer = Actor::customer(9);
        let booking = service
            .reserve_showing(&customer, &showing(), seats("B2,B3"), 50_000, PaymentStatus::Paid)
            .await
            .unwrap();

        let partial = service
            .cancel(&customer, booking.id, SeatSelection::Only(seats("B3")))
            .await
            .unwrap();
        assert_eq!(partial.status, BookingStatus::Ongoing);
        assert_eq!(partial.remaining.as_ref().map(|b| b.fee), Some(25_000));

        let full = service.cancel(&customer, booking.id, SeatSelection::All).await.unwrap();
        assert_eq!(full.status, BookingStatus::Cancelled);
        assert_eq!(full.released, seats("B2"));
        assert!(full.remaining.is_none());
        assert!(service.is_consistent(schedule.id));
    }
}
