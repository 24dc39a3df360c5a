use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::{bad_request, SeatListBody};
use crate::error::BookingError;
use crate::models::{Actor, PaymentStatus, Showing};
use crate::services::{ReserveRequest, SeatSelection};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings).post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", patch(cancel_booking))
        .route("/bookings/{id}/payment", patch(update_payment_status))
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
// Either `schedule_id` or the full (movie, show_date, show_time) triple.
#[derive(Debug, Deserialize, Validate)]
struct CreateBookingRequest {
    #[validate(range(min = 1))]
    schedule_id: Option<i64>,
    #[validate(length(min = 1))]
    movie: Option<String>,
    show_date: Option<NaiveDate>,
    show_time: Option<NaiveTime>,
    seats: SeatListBody,
    #[validate(range(min = 0))]
    fee: i64,
    #[serde(default)]
    payment_status: PaymentStatus,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Response, BookingError> {
    if let Err(e) = req.validate() {
        return Ok(bad_request(e.to_string()));
    }
    let seats = req.seats.parse()?;

    let booking = match (req.schedule_id, req.movie, req.show_date, req.show_time) {
        (Some(schedule_id), _, _, _) => {
            state
                .service
                .reserve(
                    &actor,
                    ReserveRequest {
                        schedule_id,
                        seats,
                        fee: req.fee,
                        payment_status: req.payment_status,
                    },
                )
                .await?
        }
        (None, Some(movie), Some(show_date), Some(show_time)) => {
            let showing = Showing { movie, show_date, show_time };
            state
                .service
                .reserve_showing(&actor, &showing, seats, req.fee, req.payment_status)
                .await?
        }
        _ => return Ok(bad_request("schedule_id or movie, show_date and show_time are required")),
    };

    state.invalidate_seats(booking.schedule_id).await;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

// GET /api/bookings
async fn get_user_bookings(State(state): State<Arc<AppState>>, actor: Actor) -> impl IntoResponse {
    Json(state.service.bookings_for(&actor))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.service.booking(&actor, id)?))
}

// PATCH /api/bookings/{id}/cancel
// No `seats` means the whole booking.
#[derive(Debug, Deserialize)]
struct CancelBookingRequest {
    seats: Option<SeatListBody>,
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let selection = match req.seats {
        Some(seats) => SeatSelection::Only(seats.parse()?),
        None => SeatSelection::All,
    };

    let outcome = state.service.cancel(&actor, id, selection).await?;
    state.invalidate_seats(outcome.schedule_id).await;
    Ok(Json(outcome))
}

// PATCH /api/bookings/{id}/payment
#[derive(Debug, Deserialize)]
struct PaymentStatusRequest {
    payment_status: PaymentStatus,
}

async fn update_payment_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(req): Json<PaymentStatusRequest>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.service.set_payment_status(&actor, id, req.payment_status).await?))
}
