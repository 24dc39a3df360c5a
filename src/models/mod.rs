pub mod actor;
pub mod booking;
pub mod schedule;
pub mod seat;

pub use actor::{Actor, Role};
pub use booking::{Booking, BookingStatus, Cancellation, PaymentStatus};
pub use schedule::{NewSchedule, Schedule, Showing};
pub use seat::{SeatEntry, SeatId, SeatLayout};
