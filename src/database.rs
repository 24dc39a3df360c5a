use futures::future::BoxFuture;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row, Transaction};
use std::time::Duration;
use tracing::info;

use crate::error::JournalError;
use crate::models::seat::{format_seat_list, parse_seat_list};
use crate::models::{Booking, BookingStatus, Cancellation, Schedule, SeatEntry, SeatId, SeatLayout};
use crate::services::journal::{BookingJournal, Snapshot};

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed");
        Ok(())
    }

    /* ---------- loading ---------- */

    async fn load_snapshot(&self) -> Result<Snapshot, JournalError> {
        let schedule_rows = sqlx::query(
            r#"
            SELECT id, movie, show_date, show_time, seat_rows, seat_columns,
                   total_seats, available_seats, seat_price, is_active
            FROM schedules
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut schedules = Vec::with_capacity(schedule_rows.len());
        for r in schedule_rows {
            let rows: i16 = r.get("seat_rows");
            let columns: i16 = r.get("seat_columns");
            schedules.push(Schedule {
                id: r.get("id"),
                movie: r.get("movie"),
                show_date: r.get("show_date"),
                show_time: r.get("show_time"),
                layout: SeatLayout {
                    rows: u8::try_from(rows).map_err(|_| corrupt("seat_rows", rows))?,
                    columns: u16::try_from(columns).map_err(|_| corrupt("seat_columns", columns))?,
                },
                total_seats: r.get("total_seats"),
                available_seats: r.get("available_seats"),
                seat_price: r.get("seat_price"),
                is_active: r.get("is_active"),
            });
        }

        let seat_rows = sqlx::query(
            "SELECT schedule_id, seat_no, is_available, booking_id FROM seat_availability",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut seats = Vec::with_capacity(seat_rows.len());
        for r in seat_rows {
            let seat_no: String = r.get("seat_no");
            seats.push(SeatEntry {
                schedule_id: r.get("schedule_id"),
                seat: seat_no.parse().map_err(|_| corrupt("seat_no", &seat_no))?,
                available: r.get("is_available"),
                booking_id: r.get("booking_id"),
            });
        }

        let booking_rows = sqlx::query(
            r#"
            SELECT id, owner_id, schedule_id, movie, show_date, show_time, seat_no,
                   seat_price, booking_fee, status, payment_status, reference, created_at
            FROM bookings
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut bookings = Vec::with_capacity(booking_rows.len());
        for r in booking_rows {
            let seat_no: String = r.get("seat_no");
            let status: String = r.get("status");
            let payment_status: String = r.get("payment_status");
            bookings.push(Booking {
                id: r.get("id"),
                owner_id: r.get("owner_id"),
                schedule_id: r.get("schedule_id"),
                movie: r.get("movie"),
                show_date: r.get("show_date"),
                show_time: r.get("show_time"),
                seats: parse_seat_list(&seat_no).map_err(|_| corrupt("seat_no", &seat_no))?,
                seat_price: r.get("seat_price"),
                fee: r.get("booking_fee"),
                status: status.parse().map_err(JournalError::Corrupt)?,
                payment_status: payment_status.parse().map_err(JournalError::Corrupt)?,
                reference: r.get("reference"),
                created_at: r.get("created_at"),
            });
        }

        info!(
            "Loaded {} schedules, {} seats, {} bookings",
            schedules.len(),
            seats.len(),
            bookings.len()
        );
        Ok(Snapshot { schedules, seats, bookings })
    }

    /* ---------- writes ---------- */

    async fn insert_schedule(&self, schedule: &Schedule, seats: &[SeatId]) -> Result<(), JournalError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO schedules (id, movie, show_date, show_time, seat_rows, seat_columns,
                                   total_seats, available_seats, seat_price, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(schedule.id)
        .bind(&schedule.movie)
        .bind(schedule.show_date)
        .bind(schedule.show_time)
        .bind(i16::from(schedule.layout.rows))
        .bind(i16::try_from(schedule.layout.columns).map_err(|_| corrupt("seat_columns", schedule.layout.columns))?)
        .bind(schedule.total_seats)
        .bind(schedule.available_seats)
        .bind(schedule.seat_price)
        .bind(schedule.is_active)
        .execute(&mut *tx)
        .await?;

        let seat_numbers: Vec<String> = seats.iter().map(ToString::to_string).collect();
        sqlx::query(
            r#"
            INSERT INTO seat_availability (schedule_id, seat_no, is_available, booking_id)
            SELECT $1, seat_no, TRUE, NULL FROM UNNEST($2::TEXT[]) AS seat_no
            "#,
        )
        .bind(schedule.id)
        .bind(&seat_numbers)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_schedule_state(&self, schedule: &Schedule) -> Result<(), JournalError> {
        let mut tx = self.pool.begin().await?;
        write_schedule_counters(&mut tx, schedule).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_reservation(&self, schedule: &Schedule, booking: &Booking) -> Result<(), JournalError> {
        let mut tx = self.pool.begin().await?;

        write_schedule_counters(&mut tx, schedule).await?;
        write_booking(&mut tx, booking).await?;
        write_seats(&mut tx, schedule.id, &booking.seats, Some(booking.id)).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn apply_cancellation(&self, schedule: &Schedule, cancellation: &Cancellation) -> Result<(), JournalError> {
        let mut tx = self.pool.begin().await?;

        write_schedule_counters(&mut tx, schedule).await?;
        write_seats(&mut tx, schedule.id, &cancellation.released, None).await?;
        match &cancellation.remaining {
            Some(booking) => write_booking(&mut tx, booking).await?,
            None => {
                sqlx::query("DELETE FROM bookings WHERE id = $1")
                    .bind(cancellation.booking_id())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_booking_state(&self, booking: &Booking) -> Result<(), JournalError> {
        sqlx::query("UPDATE bookings SET status = $2, payment_status = $3 WHERE id = $1")
            .bind(booking.id)
            .bind(booking.status.as_str())
            .bind(booking.payment_status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_bookings(&self, schedule_id: i64, bookings: &[Booking]) -> Result<(), JournalError> {
        let ids: Vec<i64> = bookings.iter().map(|booking| booking.id).collect();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE bookings SET status = $3 WHERE schedule_id = $1 AND id = ANY($2)")
            .bind(schedule_id)
            .bind(&ids)
            .bind(BookingStatus::Completed.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        // Dropping the transaction rolls the partial update back
        if updated != ids.len() as u64 {
            return Err(JournalError::Corrupt(format!(
                "schedule {}: {} of {} completed bookings found in storage",
                schedule_id,
                updated,
                ids.len()
            )));
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn write_schedule_counters(tx: &mut Transaction<'_, Postgres>, schedule: &Schedule) -> Result<(), JournalError> {
    let updated = sqlx::query(
        "UPDATE schedules SET total_seats = $2, available_seats = $3, is_active = $4 WHERE id = $1",
    )
    .bind(schedule.id)
    .bind(schedule.total_seats)
    .bind(schedule.available_seats)
    .bind(schedule.is_active)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(JournalError::Corrupt(format!("schedule {} missing in storage", schedule.id)));
    }
    Ok(())
}

async fn write_seats(
    tx: &mut Transaction<'_, Postgres>,
    schedule_id: i64,
    seats: &std::collections::BTreeSet<SeatId>,
    booking_id: Option<i64>,
) -> Result<(), JournalError> {
    let seat_numbers: Vec<String> = seats.iter().map(ToString::to_string).collect();
    sqlx::query(
        r#"
        UPDATE seat_availability
        SET is_available = $3, booking_id = $4
        WHERE schedule_id = $1 AND seat_no = ANY($2)
        "#,
    )
    .bind(schedule_id)
    .bind(&seat_numbers)
    .bind(booking_id.is_none())
    .bind(booking_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_booking(tx: &mut Transaction<'_, Postgres>, booking: &Booking) -> Result<(), JournalError> {
    sqlx::query(
        r#"
        INSERT INTO bookings (id, owner_id, schedule_id, movie, show_date, show_time, seat_no,
                              seat_price, booking_fee, status, payment_status, reference, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (id) DO UPDATE
        SET seat_no = EXCLUDED.seat_no,
            booking_fee = EXCLUDED.booking_fee,
            status = EXCLUDED.status,
            payment_status = EXCLUDED.payment_status
        "#,
    )
    .bind(booking.id)
    .bind(booking.owner_id)
    .bind(booking.schedule_id)
    .bind(&booking.movie)
    .bind(booking.show_date)
    .bind(booking.show_time)
    .bind(format_seat_list(&booking.seats))
    .bind(booking.seat_price)
    .bind(booking.fee)
    .bind(booking.status.as_str())
    .bind(booking.payment_status.as_str())
    .bind(&booking.reference)
    .bind(booking.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn corrupt(column: &str, value: impl std::fmt::Display) -> JournalError {
    JournalError::Corrupt(format!("{column}={value}"))
}

impl BookingJournal for Database {
    fn load(&self) -> BoxFuture<'_, Result<Snapshot, JournalError>> {
        Box::pin(self.load_snapshot())
    }

    fn save_schedule<'a>(&'a self, schedule: &'a Schedule, seats: &'a [SeatId]) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(self.insert_schedule(schedule, seats))
    }

    fn save_schedule_state<'a>(&'a self, schedule: &'a Schedule) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(self.update_schedule_state(schedule))
    }

    fn save_reservation<'a>(&'a self, schedule: &'a Schedule, booking: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(self.insert_reservation(schedule, booking))
    }

    fn save_cancellation<'a>(
        &'a self,
        schedule: &'a Schedule,
        cancellation: &'a Cancellation,
    ) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(self.apply_cancellation(schedule, cancellation))
    }

    fn save_booking_state<'a>(&'a self, booking: &'a Booking) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(self.update_booking_state(booking))
    }

    fn save_completion<'a>(&'a self, schedule_id: i64, bookings: &'a [Booking]) -> BoxFuture<'a, Result<(), JournalError>> {
        Box::pin(self.complete_bookings(schedule_id, bookings))
    }
}
