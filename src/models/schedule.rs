use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::booking::seat_fee;
use super::seat::SeatLayout;
use crate::error::BookingError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub movie: String,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
    pub layout: SeatLayout,
    pub total_seats: i32,
    pub available_seats: i32,
    /// Price of a single seat in minor currency units.
    pub seat_price: i64,
    pub is_active: bool,
}

impl Schedule {
    pub fn showing(&self) -> Showing {
        Showing {
            movie: self.movie.clone(),
            show_date: self.show_date,
            show_time: self.show_time,
        }
    }

    /// Fee for `seat_count` seats of this screening.
    pub fn fee_for(&self, seat_count: usize) -> Result<i64, BookingError> {
        seat_fee(self.seat_price, seat_count)
    }

    pub fn is_same_showing(&self, movie: &str, show_date: NaiveDate, show_time: NaiveTime) -> bool {
        self.movie == movie && self.show_date == show_date && self.show_time == show_time
    }
}

/// Natural key of a screening: `(movie, show_date, show_time)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Showing {
    pub movie: String,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
}

/// Admin input for a new screening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSchedule {
    pub movie: String,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
    pub layout: SeatLayout,
    pub seat_price: i64,
}
