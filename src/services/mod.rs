pub mod booking;
pub mod booking_ledger;
pub mod journal;
pub mod schedules;
pub mod seat_ledger;
pub mod seat_map;

pub use booking::{BookingService, CancelOutcome, ReserveRequest, SeatSelection};
pub use booking_ledger::BookingLedger;
pub use journal::{BookingJournal, Snapshot, VolatileJournal};
pub use schedules::ScheduleStore;
pub use seat_ledger::SeatLedger;
