use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use crate::error::BookingError;
use crate::models::{SeatEntry, SeatId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeatState {
    available: bool,
    booking_id: Option<i64>,
}

impl SeatState {
    const FREE: SeatState = SeatState { available: true, booking_id: None };
}

/// Per-schedule seat availability, the authority on who holds which seat.
#[derive(Debug, Default)]
pub struct SeatLedger {
    seats: RwLock<HashMap<i64, BTreeMap<SeatId, SeatState>>>,
}

impl SeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs one available entry per seat. Existing entries for the schedule are replaced.
    pub fn seed(&self, schedule_id: i64, seats: impl IntoIterator<Item = SeatId>) {
        let map = seats.into_iter().map(|seat| (seat, SeatState::FREE)).collect();
        self.seats.write().insert(schedule_id, map);
    }

    /// Puts back ledger rows loaded from storage.
    pub fn restore(&self, entries: impl IntoIterator<Item = SeatEntry>) {
        let mut seats = self.seats.write();
        for entry in entries {
            seats.entry(entry.schedule_id).or_default().insert(
                entry.seat,
                SeatState {
                    available: entry.available,
                    booking_id: entry.booking_id,
                },
            );
        }
    }

    pub(crate) fn forget(&self, schedule_id: i64) {
        self.seats.write().remove(&schedule_id);
    }

    /// Marks every requested seat unavailable for `booking_id`, or none of them.
    ///
    /// The check and the write happen under one write guard. Unknown seats fail
    /// with `UnknownSeat`; held seats fail with `SeatUnavailable` listing all of them.
    pub fn claim(&self, schedule_id: i64, seat_ids: &BTreeSet<SeatId>, booking_id: i64) -> Result<(), BookingError> {
        if seat_ids.is_empty() {
            return Err(BookingError::EmptySeatSet);
        }

        let mut ledger = self.seats.write();
        let seats = ledger
            .get_mut(&schedule_id)
            .ok_or(BookingError::ScheduleNotFound(schedule_id))?;

        let mut taken = Vec::new();
        for seat in seat_ids {
            match seats.get(seat) {
                None => return Err(BookingError::UnknownSeat { schedule_id, seat: *seat }),
                Some(state) if !state.available => taken.push(*seat),
                Some(_) => {}
            }
        }
        if !taken.is_empty() {
            return Err(BookingError::SeatUnavailable { schedule_id, seats: taken });
        }

        for seat in seat_ids {
            seats.insert(
                *seat,
                SeatState {
                    available: false,
                    booking_id: Some(booking_id),
                },
            );
        }
        Ok(())
    }

    /// Frees the listed seats and returns how many actually changed state.
    ///
    /// Releasing a free or unknown seat is a no-op.
    pub fn release(&self, schedule_id: i64, seat_ids: &BTreeSet<SeatId>) -> usize {
        let mut ledger = self.seats.write();
        let Some(seats) = ledger.get_mut(&schedule_id) else {
            return 0;
        };

        let mut freed = 0;
        for seat in seat_ids {
            if let Some(state) = seats.get_mut(seat) {
                if !state.available {
                    *state = SeatState::FREE;
                    freed += 1;
                }
            }
        }
        freed
    }

    pub fn list_available(&self, schedule_id: i64) -> Result<BTreeSet<SeatId>, BookingError> {
        let ledger = self.seats.read();
        let seats = ledger
            .get(&schedule_id)
            .ok_or(BookingError::ScheduleNotFound(schedule_id))?;
        Ok(seats
            .iter()
            .filter(|(_, state)| state.available)
            .map(|(seat, _)| *seat)
            .collect())
    }

    pub fn available_count(&self, schedule_id: i64) -> Option<usize> {
        self.seats.read()
            .get(&schedule_id)
            .map(|seats| seats.values().filter(|state| state.available).count())
    }

    /// Full seat map of a schedule in seat order.
    pub fn entries(&self, schedule_id: i64) -> Result<Vec<SeatEntry>, BookingError> {
        let ledger = self.seats.read();
        let seats = ledger
            .get(&schedule_id)
            .ok_or(BookingError::ScheduleNotFound(schedule_id))?;
        Ok(seats
            .iter()
            .map(|(seat, state)| SeatEntry {
                schedule_id,
                seat: *seat,
                available: state.available,
                booking_id: state.booking_id,
            })
            .collect())
    }

    #[cfg(test)]
    fn occupant(&self, schedule_id: i64, seat: SeatId) -> Option<i64> {
        self.seats.read()
            .get(&schedule_id)
            .and_then(|seats| seats.get(&seat))
            .and_then(|state| state.booking_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seat::parse_seat_list;
    use crate::services::seat_map;

    fn ledger() -> SeatLedger {
        let ledger = SeatLedger::new();
        ledger.seed(1, seat_map::generate(5, 8));
        ledger
    }

    fn seats(raw: &str) -> BTreeSet<SeatId> {
        parse_seat_list(raw).unwrap()
    }

    #[test]
    fn claim_marks_every_seat() {
        let ledger = ledger();
        ledger.claim(1, &seats("A1,A2"), 7).unwrap();

        assert_eq!(ledger.available_count(1), Some(38));
        assert_eq!(ledger.occupant(1, "A1".parse().unwrap()), Some(7));
        assert!(!ledger.list_available(1).unwrap().contains(&"A2".parse().unwrap()));
    }

    #[test]
    fn claim_is_all_or_nothing() {
        let ledger = ledger();
        ledger.claim(1, &seats("A2,C3"), 1).unwrap();

        let err = ledger.claim(1, &seats("A1,A2,B5,C3"), 2).unwrap_err();
        match err {
            BookingError::SeatUnavailable { schedule_id, seats: taken } => {
                assert_eq!(schedule_id, 1);
                assert_eq!(taken, vec!["A2".parse().unwrap(), "C3".parse().unwrap()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // A1 and B5 were free and must still be free
        let available = ledger.list_available(1).unwrap();
        assert!(available.contains(&"A1".parse().unwrap()));
        assert!(available.contains(&"B5".parse().unwrap()));
        assert_eq!(ledger.available_count(1), Some(38));
    }

    #[test]
    fn unknown_seat_fails_without_claiming() {
        let ledger = ledger();
        let err = ledger.claim(1, &seats("A1,F1"), 3).unwrap_err();
        assert!(matches!(err, BookingError::UnknownSeat { .. }));
        assert_eq!(ledger.available_count(1), Some(40));
        assert!(matches!(ledger.claim(9, &seats("A1"), 3), Err(BookingError::ScheduleNotFound(9))));
    }

    #[test]
    fn release_is_idempotent() {
        let ledger = ledger();
        ledger.claim(1, &seats("D4,D5"), 4).unwrap();

        assert_eq!(ledger.release(1, &seats("D4,D5")), 2);
        assert_eq!(ledger.release(1, &seats("D4,D5")), 0);
        assert_eq!(ledger.release(1, &seats("Z9")), 0);
        assert_eq!(ledger.release(42, &seats("A1")), 0);
        assert_eq!(ledger.available_count(1), Some(40));
        assert_eq!(ledger.occupant(1, "D4".parse().unwrap()), None);
    }

    #[test]
    fn restore_rebuilds_entries() {
        let source = ledger();
        source.claim(1, &seats("B1"), 11).unwrap();

        let copy = SeatLedger::new();
        copy.restore(source.entries(1).unwrap());
        assert_eq!(copy.entries(1).unwrap(), source.entries(1).unwrap());
    }
}
