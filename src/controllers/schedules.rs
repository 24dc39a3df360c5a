use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use validator::Validate;

use super::bad_request;
use crate::error::BookingError;
use crate::models::{Actor, SeatId, SeatLayout, Showing};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/schedules", get(list_schedules).post(create_schedule))
        .route("/schedules/{id}", get(get_schedule).delete(deactivate_schedule))
        .route("/schedules/{id}/capacity", patch(adjust_capacity))
        .route("/schedules/{id}/complete", post(complete_schedule))
        .route("/schedules/{id}/seats", get(get_available_seats))
        .route("/schedules/{id}/seat-map", get(get_seat_map))
        .route("/schedules/{id}/bookings", get(get_schedule_bookings))
}

/* ---------- SCHEDULES ---------- */

async fn list_schedules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.active_schedules())
}

async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.service.schedule(id)?))
}

// POST /api/schedules
#[derive(Debug, Deserialize, Validate)]
struct CreateScheduleRequest {
    #[validate(length(min = 1, max = 200))]
    movie: String,
    show_date: NaiveDate,
    show_time: NaiveTime,
    #[validate(range(min = 1, max = 26))]
    rows: Option<u8>,
    #[validate(range(min = 1, max = 500))]
    columns: Option<u16>,
    #[validate(range(min = 0))]
    seat_price: Option<i64>,
}

async fn create_schedule(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<Response, BookingError> {
    if let Err(e) = req.validate() {
        return Ok(bad_request(e.to_string()));
    }

    let mut new = state.service.new_schedule(Showing {
        movie: req.movie.trim().to_string(),
        show_date: req.show_date,
        show_time: req.show_time,
    });
    new.layout = SeatLayout {
        rows: req.rows.unwrap_or(new.layout.rows),
        columns: req.columns.unwrap_or(new.layout.columns),
    };
    new.seat_price = req.seat_price.unwrap_or(new.seat_price);

    let schedule = state.service.create_schedule(&actor, new).await?;
    Ok((StatusCode::CREATED, Json(schedule)).into_response())
}

// DELETE /api/schedules/{id}
async fn deactivate_schedule(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    let schedule = state.service.deactivate_schedule(&actor, id).await?;
    state.invalidate_seats(id).await;
    Ok(Json(schedule))
}

// PATCH /api/schedules/{id}/capacity
#[derive(Debug, Deserialize)]
struct CapacityRequest {
    total_seats: i32,
    available_seats: i32,
}

async fn adjust_capacity(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(req): Json<CapacityRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let schedule = state
        .service
        .adjust_capacity(&actor, id, req.total_seats, req.available_seats)
        .await?;
    state.invalidate_seats(id).await;
    Ok(Json(schedule))
}

// POST /api/schedules/{id}/complete
async fn complete_schedule(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    let completed = state.service.complete_schedule(&actor, id).await?;
    Ok(Json(serde_json::json!({ "schedule_id": id, "completed": completed.len() })))
}

async fn get_schedule_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.service.schedule_bookings(&actor, id)?))
}

/* ---------- SEATS ---------- */

#[derive(Debug, Serialize)]
struct AvailableSeatsResponse {
    schedule_id: i64,
    count: usize,
    seats: BTreeSet<SeatId>,
}

// GET /api/schedules/{id}/seats; may be slightly stale, reserve re-checks
async fn get_available_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, BookingError> {
    if let Some(cache) = &state.cache {
        if let Some(seats) = cache.get_available_seats(id).await {
            let body = AvailableSeatsResponse { schedule_id: id, count: seats.len(), seats };
            return Ok(([("X-Cache", "HIT")], Json(body)).into_response());
        }
    }

    let seats = state.service.available_seats(id)?;
    if let Some(cache) = &state.cache {
        cache.save_available_seats(id, &seats).await;
    }
    let body = AvailableSeatsResponse { schedule_id: id, count: seats.len(), seats };
    Ok(([("X-Cache", "MISS")], Json(body)).into_response())
}

async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.service.seat_map(id)?))
}
