pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use services::{BookingJournal, BookingService, VolatileJournal};

// Shared state for the whole application
pub struct AppState {
    pub service: BookingService,
    pub cache: Option<cache::CacheService>,
}

impl AppState {
    /// Connects the configured storage and cache, then restores the service from storage.
    pub async fn new(config: &config::Config) -> anyhow::Result<Arc<Self>> {
        let journal: Arc<dyn BookingJournal> = match &config.database {
            Some(db_config) => {
                let db = database::Database::new(&db_config.url, db_config.pool_size).await?;
                info!("Database connected");
                db.run_migrations().await?;
                Arc::new(db)
            }
            None => {
                warn!("DATABASE_URL is not set, bookings will not survive a restart");
                Arc::new(VolatileJournal)
            }
        };

        let cache = match &config.redis {
            Some(redis_config) => {
                let redis = redis_client::RedisClient::new(&redis_config.url).await?;
                info!("Redis connected");
                Some(cache::CacheService::new(redis, redis_config.seats_ttl_seconds))
            }
            None => None,
        };

        let service = BookingService::new(config.booking.clone(), journal);
        service.restore().await?;

        Ok(Arc::new(Self { service, cache }))
    }

    /// State without storage or cache, as used by tests and local demos.
    pub fn in_memory(booking: config::BookingConfig) -> Arc<Self> {
        Arc::new(Self {
            service: BookingService::new(booking, Arc::new(VolatileJournal)),
            cache: None,
        })
    }

    pub async fn invalidate_seats(&self, schedule_id: i64) {
        if let Some(cache) = &self.cache {
            cache.invalidate_seats(schedule_id).await;
        }
    }
}

/// Full HTTP application: health routes plus the API under `/api`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Showtime Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
