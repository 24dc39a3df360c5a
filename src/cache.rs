use crate::models::SeatId;
use crate::redis_client::RedisClient;
use redis::AsyncCommands;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Read-through cache of per-schedule seat availability.
///
/// Never a source of truth: reservations always re-check the seat ledger, and
/// every failure here is logged and treated as a miss.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    seats_ttl_seconds: u64,
}

fn seats_key(schedule_id: i64) -> String {
    format!("seats:{}", schedule_id)
}

impl CacheService {
    pub fn new(redis: RedisClient, seats_ttl_seconds: u64) -> Self {
        Self { redis, seats_ttl_seconds }
    }

    pub async fn get_available_seats(&self, schedule_id: i64) -> Option<BTreeSet<SeatId>> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = match conn.get(seats_key(schedule_id)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Seats cache read failed for schedule {}: {}", schedule_id, e);
                return None;
            }
        };
        let seats: Option<BTreeSet<SeatId>> = serde_json::from_str(&data?).ok();
        if seats.is_some() {
            debug!("Seats cache hit for schedule {}", schedule_id);
        }
        seats
    }

    pub async fn save_available_seats(&self, schedule_id: i64, seats: &BTreeSet<SeatId>) {
        let Ok(data) = serde_json::to_string(seats) else {
            return;
        };
        let mut conn = self.redis.conn.clone();
        let result: Result<(), redis::RedisError> = conn
            .set_ex(seats_key(schedule_id), data, self.seats_ttl_seconds)
            .await;
        if let Err(e) = result {
            warn!("Seats cache write failed for schedule {}: {}", schedule_id, e);
        }
    }

    // Called after every committed change to a schedule's seats
    pub async fn invalidate_seats(&self, schedule_id: i64) {
        let mut conn = self.redis.conn.clone();
        let result: Result<(), redis::RedisError> = conn.del(seats_key(schedule_id)).await;
        match result {
            Ok(()) => debug!("Invalidated seats cache for schedule {}", schedule_id),
            Err(e) => warn!("Failed to invalidate seats cache for schedule {}: {}", schedule_id, e),
        }
    }
}
