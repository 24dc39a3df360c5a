use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{NaiveDate, NaiveTime};
use parking_lot::RwLock;

use super::{seat_map, seat_ledger::SeatLedger};
use crate::error::BookingError;
use crate::models::booking::seat_fee;
use crate::models::{NewSchedule, Schedule};

/// Screenings and their `available_seats` counters.
///
/// The counter mutators do not serialize anything on their own; the booking
/// service calls them while holding the schedule lock.
#[derive(Debug, Default)]
pub struct ScheduleStore {
    schedules: RwLock<HashMap<i64, Schedule>>,
    next_id: AtomicI64,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a screening and seeds its seat ledger, one available entry per seat.
    pub fn create(&self, new: NewSchedule, ledger: &SeatLedger) -> Result<Schedule, BookingError> {
        if !new.layout.is_valid() {
            return Err(BookingError::InvalidCapacity {
                total: new.layout.capacity(),
                available: new.layout.capacity(),
            });
        }
        // A sold-out house must still be chargeable
        seat_fee(new.seat_price, new.layout.capacity() as usize)?;

        let mut schedules = self.schedules.write();
        let duplicate = schedules
            .values()
            .any(|s| s.is_active && s.is_same_showing(&new.movie, new.show_date, new.show_time));
        if duplicate {
            return Err(BookingError::DuplicateSchedule {
                movie: new.movie,
                show_date: new.show_date,
                show_time: new.show_time,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let capacity = new.layout.capacity();
        let schedule = Schedule {
            id,
            movie: new.movie,
            show_date: new.show_date,
            show_time: new.show_time,
            layout: new.layout,
            total_seats: capacity,
            available_seats: capacity,
            seat_price: new.seat_price,
            is_active: true,
        };

        ledger.seed(id, seat_map::for_layout(&schedule.layout));
        schedules.insert(id, schedule.clone());
        Ok(schedule)
    }

    /// Puts back a schedule loaded from storage.
    pub fn insert(&self, schedule: Schedule) {
        self.next_id.fetch_max(schedule.id, Ordering::SeqCst);
        self.schedules.write().insert(schedule.id, schedule);
    }

    /// Drops a schedule entirely. Only used to undo a creation that never got stored.
    pub(crate) fn remove(&self, schedule_id: i64) -> Option<Schedule> {
        self.schedules.write().remove(&schedule_id)
    }

    pub fn get(&self, schedule_id: i64) -> Option<Schedule> {
        self.schedules.read().get(&schedule_id).cloned()
    }

    pub fn find_active(&self, movie: &str, show_date: NaiveDate, show_time: NaiveTime) -> Option<Schedule> {
        self.schedules.read()
            .values()
            .find(|s| s.is_active && s.is_same_showing(movie, show_date, show_time))
            .cloned()
    }

    /// Active screenings ordered by date, then time.
    pub fn list_active(&self) -> Vec<Schedule> {
        let mut active: Vec<Schedule> = self.schedules.read()
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| (a.show_date, a.show_time, a.id).cmp(&(b.show_date, b.show_time, b.id)));
        active
    }

    pub fn deactivate(&self, schedule_id: i64) -> Result<Schedule, BookingError> {
        self.set_active(schedule_id, false)
    }

    pub(crate) fn set_active(&self, schedule_id: i64, active: bool) -> Result<Schedule, BookingError> {
        self.update(schedule_id, |schedule| {
            schedule.is_active = active;
            Ok(())
        })
    }

    /// Admin override of both counters.
    pub fn adjust_capacity(&self, schedule_id: i64, total: i32, available: i32) -> Result<Schedule, BookingError> {
        if total < 0 || available < 0 || available > total {
            return Err(BookingError::InvalidCapacity { total, available });
        }
        self.update(schedule_id, |schedule| {
            schedule.total_seats = total;
            schedule.available_seats = available;
            Ok(())
        })
    }

    pub fn decrement_available(&self, schedule_id: i64, n: usize) -> Result<Schedule, BookingError> {
        self.shift_available(schedule_id, -(n as i64))
    }

    pub fn increment_available(&self, schedule_id: i64, n: usize) -> Result<Schedule, BookingError> {
        self.shift_available(schedule_id, n as i64)
    }

    fn shift_available(&self, schedule_id: i64, delta: i64) -> Result<Schedule, BookingError> {
        self.update(schedule_id, |schedule| {
            let next = i64::from(schedule.available_seats) + delta;
            if next < 0 || next > i64::from(schedule.total_seats) {
                return Err(BookingError::CapacityViolation {
                    schedule_id,
                    available: schedule.available_seats,
                    total: schedule.total_seats,
                    delta,
                });
            }
            schedule.available_seats = next as i32;
            Ok(())
        })
    }

    fn update<F>(&self, schedule_id: i64, apply: F) -> Result<Schedule, BookingError>
    where
        F: FnOnce(&mut Schedule) -> Result<(), BookingError>,
    {
        let mut schedules = self.schedules.write();
        let schedule = schedules
            .get_mut(&schedule_id)
            .ok_or(BookingError::ScheduleNotFound(schedule_id))?;
        apply(schedule)?;
        Ok(schedule.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatLayout;

    fn showing(movie: &str) -> NewSchedule {
        NewSchedule {
            movie: movie.to_string(),
            show_date: NaiveDate::from_ymd_opt(2025, 9, 12).unwrap(),
            show_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            layout: SeatLayout::default(),
            seat_price: 25_000,
        }
    }

    #[test]
    fn create_seeds_ledger() {
        let store = ScheduleStore::new();
        let ledger = SeatLedger::new();
        let schedule = store.create(showing("Weapons"), &ledger).unwrap();

        assert_eq!(schedule.total_seats, 40);
        assert_eq!(schedule.available_seats, 40);
        assert_eq!(ledger.list_available(schedule.id).unwrap().len(), 40);
    }

    #[test]
    fn duplicate_active_showing_is_rejected() {
        let store = ScheduleStore::new();
        let ledger = SeatLedger::new();
        let first = store.create(showing("Sinners"), &ledger).unwrap();

        let err = store.create(showing("Sinners"), &ledger).unwrap_err();
        assert!(matches!(err, BookingError::DuplicateSchedule { .. }));

        // Once the first one is withdrawn the slot is free again
        store.deactivate(first.id).unwrap();
        let second = store.create(showing("Sinners"), &ledger).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.list_active().len(), 1);
    }

    #[test]
    fn deactivate_keeps_ledger() {
        let store = ScheduleStore::new();
        let ledger = SeatLedger::new();
        let schedule = store.create(showing("Alice in Wonderland"), &ledger).unwrap();

        let inactive = store.deactivate(schedule.id).unwrap();
        assert!(!inactive.is_active);
        assert_eq!(ledger.list_available(schedule.id).unwrap().len(), 40);
        assert!(matches!(store.deactivate(999), Err(BookingError::ScheduleNotFound(999))));
    }

    #[test]
    fn counters_stay_within_bounds() {
        let store = ScheduleStore::new();
        let ledger = SeatLedger::new();
        let id = store.create(showing("Weapons"), &ledger).unwrap().id;

        assert_eq!(store.decrement_available(id, 40).unwrap().available_seats, 0);
        assert!(matches!(
            store.decrement_available(id, 1),
            Err(BookingError::CapacityViolation { delta: -1, .. })
        ));
        assert_eq!(store.increment_available(id, 40).unwrap().available_seats, 40);
        assert!(matches!(
            store.increment_available(id, 1),
            Err(BookingError::CapacityViolation { .. })
        ));
        assert_eq!(store.get(id).unwrap().available_seats, 40);
    }

    #[test]
    fn adjust_capacity_validates_input() {
        let store = ScheduleStore::new();
        let ledger = SeatLedger::new();
        let id = store.create(showing("Weapons"), &ledger).unwrap().id;

        assert!(matches!(
            store.adjust_capacity(id, 10, 11),
            Err(BookingError::InvalidCapacity { total: 10, available: 11 })
        ));
        assert!(matches!(store.adjust_capacity(id, -1, 0), Err(BookingError::InvalidCapacity { .. })));
        let adjusted = store.adjust_capacity(id, 50, 45).unwrap();
        assert_eq!((adjusted.total_seats, adjusted.available_seats), (50, 45));
    }

    #[test]
    fn invalid_layout_is_rejected() {
        let store = ScheduleStore::new();
        let ledger = SeatLedger::new();
        let mut new = showing("Weapons");
        new.layout = SeatLayout { rows: 0, columns: 8 };
        assert!(matches!(store.create(new, &ledger), Err(BookingError::InvalidCapacity { .. })));
    }

    #[test]
    fn unchargeable_price_is_rejected() {
        let store = ScheduleStore::new();
        let ledger = SeatLedger::new();

        let mut new = showing("Weapons");
        new.seat_price = i64::MAX / 2 + 1;
        assert!(matches!(
            store.create(new, &ledger),
            Err(BookingError::InvalidPrice { seat_count: 40, .. })
        ));

        let mut new = showing("Weapons");
        new.seat_price = -1;
        assert!(matches!(store.create(new, &ledger), Err(BookingError::InvalidPrice { .. })));
        assert!(store.list_active().is_empty());
    }
}
