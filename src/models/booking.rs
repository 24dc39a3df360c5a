use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::seat::{format_seat_list, SeatId};
use crate::error::BookingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Ongoing,
    Cancelled,
    Completed,
}

/// Advisory payment marker supplied by the caller; never drives seat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Ongoing => "Ongoing",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ongoing" => Ok(BookingStatus::Ongoing),
            "Cancelled" => Ok(BookingStatus::Cancelled),
            "Completed" => Ok(BookingStatus::Completed),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub owner_id: i64,
    pub schedule_id: i64,
    // Denormalized for display
    pub movie: String,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
    pub seats: BTreeSet<SeatId>,
    /// Per-seat price captured at reservation time.
    pub seat_price: i64,
    pub fee: i64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    /// Comma-delimited seat numbers, e.g. `"A1,A2"`.
    pub fn seat_list(&self) -> String {
        format_seat_list(&self.seats)
    }

    pub fn fee_for(&self, seat_count: usize) -> Result<i64, BookingError> {
        seat_fee(self.seat_price, seat_count)
    }
}

/// `seat_count × seat_price`; a negative price or an overflowing total is `InvalidPrice`.
pub fn seat_fee(seat_price: i64, seat_count: usize) -> Result<i64, BookingError> {
    i64::try_from(seat_count)
        .ok()
        .filter(|_| seat_price >= 0)
        .and_then(|count| seat_price.checked_mul(count))
        .ok_or(BookingError::InvalidPrice { seat_price, seat_count })
}

/// Result of a booking ledger cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cancellation {
    /// Booking as it was before the cancellation.
    pub previous: Booking,
    pub released: BTreeSet<SeatId>,
    /// `None` when the booking was deleted.
    pub remaining: Option<Booking>,
}

impl Cancellation {
    pub fn booking_id(&self) -> i64 {
        self.previous.id
    }

    pub fn schedule_id(&self) -> i64 {
        self.previous.schedule_id
    }

    pub fn is_full(&self) -> bool {
        self.remaining.is_none()
    }
}
