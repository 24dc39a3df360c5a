use crate::models::{SeatId, SeatLayout};

/// Canonical seat identifiers for a room layout, row-major: `A1..A8, B1..B8, ...`.
///
/// Rows past `Z` are not addressable and are dropped; callers validate the
/// layout with [`SeatLayout::is_valid`] first.
pub fn generate(rows: u8, columns_per_row: u16) -> Vec<SeatId> {
    (b'A'..b'A' + rows.min(SeatLayout::MAX_ROWS))
        .flat_map(|row| (1..=columns_per_row).map(move |column| (char::from(row), column)))
        .filter_map(|(row, column)| SeatId::new(row, column).ok())
        .collect()
}

pub fn for_layout(layout: &SeatLayout) -> Vec<SeatId> {
    generate(layout.rows, layout.columns)
}
