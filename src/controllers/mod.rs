pub mod bookings;
pub mod schedules;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::seat::parse_seat_list;
use crate::models::SeatId;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(schedules::routes())
        .merge(bookings::routes())
}

/* ---------- helpers ---------- */

// Seat conflicts use 419 like the rest of our booking endpoints
fn status_419() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::CONFLICT)
}

fn status_for(err: &BookingError) -> StatusCode {
    match err {
        BookingError::ScheduleNotFound(_) | BookingError::ShowingNotFound(_) | BookingError::BookingNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        BookingError::SeatUnavailable { .. } => status_419(),
        BookingError::DuplicateSchedule { .. }
        | BookingError::ScheduleInactive(_)
        | BookingError::CapacityViolation { .. }
        | BookingError::BookingClosed(_) => StatusCode::CONFLICT,
        BookingError::UnknownSeat { .. }
        | BookingError::EmptySeatSet
        | BookingError::InvalidSeatSet { .. }
        | BookingError::InvalidSeatId(_)
        | BookingError::InvalidCapacity { .. }
        | BookingError::InvalidPrice { .. }
        | BookingError::FeeMismatch { .. } => StatusCode::BAD_REQUEST,
        BookingError::Unauthorized(_) => StatusCode::FORBIDDEN,
        BookingError::ReferenceGeneration { .. } | BookingError::Journal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
            "seats": self.seats(),
        });
        (status, Json(body)).into_response()
    }
}

pub(crate) fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": "BadRequest", "message": message.into() })),
    )
        .into_response()
}

/// Seats as the client sends them: `"A1,A2"` or `["A1", "A2"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SeatListBody {
    Delimited(String),
    List(Vec<String>),
}

impl SeatListBody {
    pub fn parse(&self) -> Result<BTreeSet<SeatId>, BookingError> {
        match self {
            SeatListBody::Delimited(raw) => parse_seat_list(raw),
            SeatListBody::List(items) => items.iter().map(|item| item.parse()).collect(),
        }
    }
}
