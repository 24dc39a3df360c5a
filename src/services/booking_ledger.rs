use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;

use crate::error::BookingError;
use crate::models::{Booking, BookingStatus, Cancellation, PaymentStatus, Schedule, SeatId};

pub const REFERENCE_LEN: usize = 8;
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random 8-character uppercase alphanumeric booking reference.
pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERENCE_LEN)
        .map(|_| char::from(REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())]))
        .collect()
}

type ReferenceGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Input of [`BookingLedger::record`].
#[derive(Debug, Clone)]
pub struct NewBooking<'a> {
    pub id: i64,
    pub owner_id: i64,
    pub schedule: &'a Schedule,
    pub seats: BTreeSet<SeatId>,
    pub fee: i64,
    pub payment_status: PaymentStatus,
}

#[derive(Default)]
struct Records {
    bookings: HashMap<i64, Booking>,
    references: HashSet<String>,
}

impl Records {
    fn insert(&mut self, booking: Booking) {
        self.references.insert(booking.reference.clone());
        self.bookings.insert(booking.id, booking);
    }

    fn remove(&mut self, booking_id: i64) -> Option<Booking> {
        let booking = self.bookings.remove(&booking_id)?;
        self.references.remove(&booking.reference);
        Some(booking)
    }
}

/// Booking records keyed by internal id.
///
/// Reference codes are kept unique among live bookings; lookups never key on them.
pub struct BookingLedger {
    records: RwLock<Records>,
    next_id: AtomicI64,
    reference_attempts: u32,
    generator: ReferenceGenerator,
}

impl Default for BookingLedger {
    fn default() -> Self {
        Self::new(5)
    }
}

impl BookingLedger {
    pub fn new(reference_attempts: u32) -> Self {
        Self::with_reference_generator(reference_attempts, generate_reference)
    }

    pub fn with_reference_generator<F>(reference_attempts: u32, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            records: RwLock::new(Records::default()),
            next_id: AtomicI64::new(0),
            reference_attempts: reference_attempts.max(1),
            generator: Box::new(generator),
        }
    }

    /// Reserves an id for a booking about to be recorded.
    pub fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record(&self, new: NewBooking<'_>) -> Result<Booking, BookingError> {
        if new.seats.is_empty() {
            return Err(BookingError::EmptySeatSet);
        }

        let mut records = self.records.write();
        let reference = (0..self.reference_attempts)
            .map(|_| (self.generator)())
            .find(|candidate| !records.references.contains(candidate))
            .ok_or(BookingError::ReferenceGeneration {
                attempts: self.reference_attempts,
            })?;

        let booking = Booking {
            id: new.id,
            owner_id: new.owner_id,
            schedule_id: new.schedule.id,
            movie: new.schedule.movie.clone(),
            show_date: new.schedule.show_date,
            show_time: new.schedule.show_time,
            seats: new.seats,
            seat_price: new.schedule.seat_price,
            fee: new.fee,
            status: BookingStatus::Ongoing,
            payment_status: new.payment_status,
            reference,
            created_at: Utc::now(),
        };
        records.insert(booking.clone());
        Ok(booking)
    }

    /// Puts a booking back as-is: used when loading from storage and to undo a cancellation.
    pub fn restore(&self, booking: Booking) {
        self.next_id.fetch_max(booking.id, Ordering::SeqCst);
        self.records.write().insert(booking);
    }

    pub(crate) fn remove(&self, booking_id: i64) -> Option<Booking> {
        self.records.write().remove(booking_id)
    }

    pub fn get(&self, booking_id: i64) -> Option<Booking> {
        self.records.read().bookings.get(&booking_id).cloned()
    }

    /// Looks a booking up on behalf of its owner; other owners get `BookingNotFound`.
    pub fn get_owned(&self, booking_id: i64, owner_id: i64) -> Result<Booking, BookingError> {
        self.get(booking_id)
            .filter(|booking| booking.owner_id == owner_id)
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    /// Owner's bookings, newest first.
    pub fn for_owner(&self, owner_id: i64) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.records.read()
            .bookings
            .values()
            .filter(|booking| booking.owner_id == owner_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        bookings
    }

    pub fn for_schedule(&self, schedule_id: i64) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.records.read()
            .bookings
            .values()
            .filter(|booking| booking.schedule_id == schedule_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|booking| booking.id);
        bookings
    }

    /// Removes `seats_to_remove` from a booking; an emptied booking is deleted.
    pub fn partial_cancel(
        &self,
        booking_id: i64,
        owner_id: i64,
        seats_to_remove: &BTreeSet<SeatId>,
    ) -> Result<Cancellation, BookingError> {
        if seats_to_remove.is_empty() {
            return Err(BookingError::EmptySeatSet);
        }

        let mut records = self.records.write();
        let booking = records
            .bookings
            .get_mut(&booking_id)
            .filter(|booking| booking.owner_id == owner_id)
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        if booking.status == BookingStatus::Completed {
            return Err(BookingError::BookingClosed(booking_id));
        }

        let foreign: Vec<SeatId> = seats_to_remove.difference(&booking.seats).copied().collect();
        if !foreign.is_empty() {
            return Err(BookingError::InvalidSeatSet { booking_id, seats: foreign });
        }

        let previous = booking.clone();
        let remaining: BTreeSet<SeatId> = booking.seats.difference(seats_to_remove).copied().collect();

        if remaining.is_empty() {
            records.remove(booking_id);
            return Ok(Cancellation {
                previous,
                released: seats_to_remove.clone(),
                remaining: None,
            });
        }

        booking.fee = booking.fee_for(remaining.len())?;
        booking.seats = remaining;
        Ok(Cancellation {
            previous,
            released: seats_to_remove.clone(),
            remaining: Some(booking.clone()),
        })
    }

    /// Cancels every seat of the booking; the record is always deleted.
    pub fn full_cancel(&self, booking_id: i64, owner_id: i64) -> Result<Cancellation, BookingError> {
        let seats = self.get_owned(booking_id, owner_id)?.seats;
        self.partial_cancel(booking_id, owner_id, &seats)
    }

    pub fn set_payment_status(
        &self,
        booking_id: i64,
        owner_id: i64,
        status: PaymentStatus,
    ) -> Result<Booking, BookingError> {
        let mut records = self.records.write();
        let booking = records
            .bookings
            .get_mut(&booking_id)
            .filter(|booking| booking.owner_id == owner_id)
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        booking.payment_status = status;
        Ok(booking.clone())
    }

    /// Marks every ongoing booking of a schedule completed and returns the changed ones.
    pub fn complete_schedule(&self, schedule_id: i64) -> Vec<Booking> {
        let mut records = self.records.write();
        records
            .bookings
            .values_mut()
            .filter(|booking| booking.schedule_id == schedule_id && booking.status == BookingStatus::Ongoing)
            .map(|booking| {
                booking.status = BookingStatus::Completed;
                booking.clone()
            })
            .collect()
    }

    pub(crate) fn set_status(&self, booking_id: i64, status: BookingStatus) {
        if let Some(booking) = self.records.write().bookings.get_mut(&booking_id) {
            booking.status = status;
        }
    }
}
