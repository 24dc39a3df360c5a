use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::models::{SeatId, Showing};

/// Failures of the seat inventory core. Every variant reaches the caller as-is.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("schedule {0} not found")]
    ScheduleNotFound(i64),

    #[error("booking {0} not found")]
    BookingNotFound(i64),

    #[error("no active screening of '{}' on {} at {}", .0.movie, .0.show_date, .0.show_time)]
    ShowingNotFound(Showing),

    #[error("'{movie}' is already scheduled on {show_date} at {show_time}")]
    DuplicateSchedule {
        movie: String,
        show_date: NaiveDate,
        show_time: NaiveTime,
    },

    #[error("schedule {0} is not active")]
    ScheduleInactive(i64),

    #[error("seats {} are not available for schedule {schedule_id}", join_seats(.seats))]
    SeatUnavailable { schedule_id: i64, seats: Vec<SeatId> },

    #[error("seat {seat} does not exist in schedule {schedule_id}")]
    UnknownSeat { schedule_id: i64, seat: SeatId },

    #[error("no seats requested")]
    EmptySeatSet,

    #[error("seats {} are not part of booking {booking_id}", join_seats(.seats))]
    InvalidSeatSet { booking_id: i64, seats: Vec<SeatId> },

    #[error("invalid seat identifier '{0}'")]
    InvalidSeatId(String),

    #[error("invalid capacity: total={total}, available={available}")]
    InvalidCapacity { total: i32, available: i32 },

    #[error("schedule {schedule_id}: changing available seats {available} by {delta} leaves [0, {total}]")]
    CapacityViolation {
        schedule_id: i64,
        available: i32,
        total: i32,
        delta: i64,
    },

    #[error("seat price {seat_price} cannot be charged for {seat_count} seats")]
    InvalidPrice { seat_price: i64, seat_count: usize },

    #[error("quoted fee {quoted} does not match expected fee {expected}")]
    FeeMismatch { expected: i64, quoted: i64 },

    #[error("booking {0} is completed and can no longer change")]
    BookingClosed(i64),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("could not generate a unique booking reference after {attempts} attempts")]
    ReferenceGeneration { attempts: u32 },

    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Failures of the durable storage behind the service.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

fn join_seats(seats: &[SeatId]) -> String {
    seats
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl BookingError {
    /// Stable machine-readable kind, used by the HTTP adapter.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::ScheduleNotFound(_)
            | BookingError::ShowingNotFound(_)
            | BookingError::BookingNotFound(_) => "NotFound",
            BookingError::DuplicateSchedule { .. } => "DuplicateSchedule",
            BookingError::ScheduleInactive(_) => "ScheduleInactive",
            BookingError::SeatUnavailable { .. } => "SeatUnavailable",
            BookingError::UnknownSeat { .. } => "UnknownSeat",
            BookingError::EmptySeatSet => "EmptySeatSet",
            BookingError::InvalidSeatSet { .. } => "InvalidSeatSet",
            BookingError::InvalidSeatId(_) => "InvalidSeatId",
            BookingError::InvalidCapacity { .. } => "InvalidCapacity",
            BookingError::CapacityViolation { .. } => "CapacityViolation",
            BookingError::InvalidPrice { .. } => "InvalidPrice",
            BookingError::FeeMismatch { .. } => "FeeMismatch",
            BookingError::BookingClosed(_) => "BookingClosed",
            BookingError::Unauthorized(_) => "Unauthorized",
            BookingError::ReferenceGeneration { .. } => "ReferenceGeneration",
            BookingError::Journal(_) => "StorageError",
        }
    }

    /// Seats the caller should be told about, if any.
    pub fn seats(&self) -> Vec<SeatId> {
        match self {
            BookingError::SeatUnavailable { seats, .. } | BookingError::InvalidSeatSet { seats, .. } => {
                seats.clone()
            }
            BookingError::UnknownSeat { seat, .. } => vec![*seat],
            _ => Vec::new(),
        }
    }
}
