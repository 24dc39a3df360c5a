use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::BookingError;

/// Seat identifier: row letter plus 1-based column, e.g. `A1`, `E8`.
///
/// Ordering is row-major with numeric columns, so `A2 < A10 < B1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SeatId {
    row: char,
    column: u16,
}

impl SeatId {
    pub fn new(row: char, column: u16) -> Result<Self, BookingError> {
        let row = row.to_ascii_uppercase();
        if !row.is_ascii_uppercase() || column == 0 {
            return Err(BookingError::InvalidSeatId(format!("{row}{column}")));
        }
        Ok(Self { row, column })
    }

    pub fn row(&self) -> char {
        self.row
    }

    pub fn column(&self) -> u16 {
        self.column
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}

impl FromStr for SeatId {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || BookingError::InvalidSeatId(s.to_string());

        let mut chars = s.chars();
        let row = chars.next().ok_or_else(invalid)?;
        let column: u16 = chars.as_str().parse().map_err(|_| invalid())?;
        if !row.is_ascii_alphabetic() {
            return Err(invalid());
        }
        SeatId::new(row, column).map_err(|_| invalid())
    }
}

impl From<SeatId> for String {
    fn from(seat: SeatId) -> Self {
        seat.to_string()
    }
}

impl TryFrom<String> for SeatId {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parses a comma-delimited seat list (`"A1, A2,b3"`) into an ordered set.
///
/// Duplicates collapse; empty fragments (`"A1,,A2"`) are skipped.
pub fn parse_seat_list(raw: &str) -> Result<BTreeSet<SeatId>, BookingError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

/// Renders a seat set the way bookings store it: `"A1,A2,A3"`.
pub fn format_seat_list(seats: &BTreeSet<SeatId>) -> String {
    seats
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Screening room layout: `rows` lettered from `A`, `columns` numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatLayout {
    pub rows: u8,
    pub columns: u16,
}

impl SeatLayout {
    /// Maximum number of rows a layout can letter (`A..=Z`).
    pub const MAX_ROWS: u8 = 26;

    pub fn capacity(&self) -> i32 {
        i32::from(self.rows) * i32::from(self.columns)
    }

    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.rows <= Self::MAX_ROWS && self.columns > 0
    }
}

impl Default for SeatLayout {
    fn default() -> Self {
        Self { rows: 5, columns: 8 }
    }
}

/// One row of the seat ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatEntry {
    pub schedule_id: i64,
    pub seat: SeatId,
    pub available: bool,
    pub booking_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_orders_seat_lists() {
        let seats = parse_seat_list("B1, a10,A2 ,A2,,").unwrap();
        let rendered: Vec<String> = seats.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["A2", "A10", "B1"]);
        assert_eq!(format_seat_list(&seats), "A2,A10,B1");
    }

    #[test]
    fn rejects_malformed_seats() {
        for raw in ["1A", "A", "A0", "AA1", "?3", "A-1"] {
            assert!(
                matches!(raw.parse::<SeatId>(), Err(BookingError::InvalidSeatId(_))),
                "{raw} should not parse"
            );
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let seat: SeatId = "c7".parse().unwrap();
        assert_eq!(serde_json::to_string(&seat).unwrap(), "\"C7\"");
        let back: SeatId = serde_json::from_str("\"C7\"").unwrap();
        assert_eq!(back, seat);
    }

    #[test]
    fn reference_layout_has_forty_seats() {
        let layout = SeatLayout::default();
        assert!(layout.is_valid());
        assert_eq!(layout.capacity(), 40);
        assert!(!SeatLayout { rows: 27, columns: 1 }.is_valid());
        assert!(!SeatLayout { rows: 3, columns: 0 }.is_valid());
    }
}
