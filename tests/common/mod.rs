#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime};
use futures::future::{self, BoxFuture};

use showtime_booking::config::BookingConfig;
use showtime_booking::error::JournalError;
use showtime_booking::models::seat::parse_seat_list;
use showtime_booking::models::{Actor, Booking, Cancellation, PaymentStatus, Schedule, SeatEntry, SeatId, Showing};
use showtime_booking::services::{BookingJournal, BookingService, ReserveRequest, Snapshot, VolatileJournal};

pub const PRICE: i64 = 25_000;

pub fn admin() -> Actor {
    Actor::admin(1)
}

pub fn seats(raw: &str) -> BTreeSet<SeatId> {
    parse_seat_list(raw).unwrap()
}

pub fn showing(movie: &str) -> Showing {
    Showing {
        movie: movie.to_string(),
        show_date: NaiveDate::from_ymd_opt(2025, 9, 20).unwrap(),
        show_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
    }
}

pub fn volatile_service() -> BookingService {
    BookingService::new(BookingConfig::default(), Arc::new(VolatileJournal))
}

pub async fn screening(service: &BookingService, movie: &str) -> Schedule {
    service
        .create_schedule(&admin(), service.new_schedule(showing(movie)))
        .await
        .unwrap()
}

pub fn request(schedule_id: i64, raw: &str) -> ReserveRequest {
    let seats = seats(raw);
    let fee = PRICE * seats.len() as i64;
    ReserveRequest {
        schedule_id,
        seats,
        fee,
        payment_status: PaymentStatus::Pending,
    }
}

/// Journal whose writes can be made to fail on demand.
#[derive(Default)]
pub struct FlakyJournal {
    pub fail_reservations: AtomicBool,
    pub fail_cancellations: AtomicBool,
    pub fail_schedules: AtomicBool,
    pub fail_booking_updates: AtomicBool,
}

impl FlakyJournal {
    fn outcome(flag: &AtomicBool) -> BoxFuture<'static, Result<(), JournalError>> {
        let result = if flag.load(Ordering::SeqCst) {
            Err(JournalError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        };
        Box::pin(future::ready(result))
    }
}

impl BookingJournal for FlakyJournal {
    fn load(&self) -> BoxFuture<'_, Result<Snapshot, JournalError>> {
        Box::pin(future::ready(Ok(Snapshot::default())))
    }

    fn save_schedule<'a>(&'a self, _: &'a Schedule, _: &'a [SeatId]) -> BoxFuture<'a, Result<(), JournalError>> {
        Self::outcome(&self.fail_schedules)
    }

    fn save_schedule_state<'a>(&'a self, _: &'a Schedule) -> BoxFuture<'a, Result<(), JournalError>> {
        Self::outcome(&self.fail_schedules)
    }

    fn save_reservation<'a>(&'a self, _: &'a Schedule, _: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>> {
        Self::outcome(&self.fail_reservations)
    }

    fn save_cancellation<'a>(&'a self, _: &'a Schedule, _: &'a Cancellation) -> BoxFuture<'a, Result<(), JournalError>> {
        Self::outcome(&self.fail_cancellations)
    }

    fn save_booking_state<'a>(&'a self, _: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>> {
        Self::outcome(&self.fail_booking_updates)
    }

    fn save_completion<'a>(&'a self, _: i64, _: &'a [Booking]) -> BoxFuture<'a, Result<(), JournalError>> {
        Self::outcome(&self.fail_booking_updates)
    }
}

#[derive(Default)]
struct Tables {
    schedules: HashMap<i64, Schedule>,
    seats: HashMap<(i64, SeatId), SeatEntry>,
    bookings: HashMap<i64, Booking>,
}

/// Journal that keeps what it is told in memory, standing in for a database.
#[derive(Default)]
pub struct RecordingJournal {
    tables: Mutex<Tables>,
}

impl RecordingJournal {
    fn apply(&self, f: impl FnOnce(&mut Tables)) -> BoxFuture<'static, Result<(), JournalError>> {
        f(&mut self.tables.lock().unwrap());
        Box::pin(future::ready(Ok(())))
    }

    fn set_seats(tables: &mut Tables, schedule_id: i64, seats: &BTreeSet<SeatId>, booking_id: Option<i64>) {
        for seat in seats {
            if let Some(entry) = tables.seats.get_mut(&(schedule_id, *seat)) {
                entry.available = booking_id.is_none();
                entry.booking_id = booking_id;
            }
        }
    }
}

impl BookingJournal for RecordingJournal {
    fn load(&self) -> BoxFuture<'_, Result<Snapshot, JournalError>> {
        let tables = self.tables.lock().unwrap();
        let snapshot = Snapshot {
            schedules: tables.schedules.values().cloned().collect(),
            seats: tables.seats.values().cloned().collect(),
            bookings: tables.bookings.values().cloned().collect(),
        };
        Box::pin(future::ready(Ok(snapshot)))
    }

    fn save_schedule<'a>(&'a self, schedule: &'a Schedule, seats: &'a [SeatId]) -> BoxFuture<'a, Result<(), JournalError>> {
        self.apply(|tables| {
            tables.schedules.insert(schedule.id, schedule.clone());
            for seat in seats {
                tables.seats.insert(
                    (schedule.id, *seat),
                    SeatEntry {
                        schedule_id: schedule.id,
                        seat: *seat,
                        available: true,
                        booking_id: None,
                    },
                );
            }
        })
    }

    fn save_schedule_state<'a>(&'a self, schedule: &'a Schedule) -> BoxFuture<'a, Result<(), JournalError>> {
        self.apply(|tables| {
            tables.schedules.insert(schedule.id, schedule.clone());
        })
    }

    fn save_reservation<'a>(&'a self, schedule: &'a Schedule, booking: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>> {
        self.apply(|tables| {
            tables.schedules.insert(schedule.id, schedule.clone());
            Self::set_seats(tables, schedule.id, &booking.seats, Some(booking.id));
            tables.bookings.insert(booking.id, booking.clone());
        })
    }

    fn save_cancellation<'a>(
        &'a self,
        schedule: &'a Schedule,
        cancellation: &'a Cancellation,
    ) -> BoxFuture<'a, Result<(), JournalError>> {
        self.apply(|tables| {
            tables.schedules.insert(schedule.id, schedule.clone());
            Self::set_seats(tables, schedule.id, &cancellation.released, None);
            match &cancellation.remaining {
                Some(booking) => {
                    tables.bookings.insert(booking.id, booking.clone());
                }
                None => {
                    tables.bookings.remove(&cancellation.booking_id());
                }
            }
        })
    }

    fn save_booking_state<'a>(&'a self, booking: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>> {
        self.apply(|tables| {
            tables.bookings.insert(booking.id, booking.clone());
        })
    }

    fn save_completion<'a>(&'a self, _: i64, bookings: &'a [Booking]) -> BoxFuture<'a, Result<(), JournalError>> {
        self.apply(|tables| {
            for booking in bookings {
                tables.bookings.insert(booking.id, booking.clone());
            }
        })
    }
}
