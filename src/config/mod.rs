use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::models::booking::seat_fee;
use crate::models::SeatLayout;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Without a database the service runs on the volatile journal
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub seats_ttl_seconds: u64,
}

// Defaults for new screenings and booking references
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub seat_rows: u8,
    pub seat_columns: u16,
    /// Minor currency units per seat.
    pub seat_price: i64,
    pub reference_attempts: u32,
}

impl BookingConfig {
    pub fn layout(&self) -> SeatLayout {
        SeatLayout {
            rows: self.seat_rows,
            columns: self.seat_columns,
        }
    }

    /// Rejects defaults no screening could be created with.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let layout = self.layout();
        if layout.rows == 0 || layout.rows > SeatLayout::MAX_ROWS {
            return Err(ConfigError::Invalid {
                key: "SEAT_ROWS",
                value: self.seat_rows.to_string(),
            });
        }
        if !layout.is_valid() {
            return Err(ConfigError::Invalid {
                key: "SEAT_COLUMNS",
                value: self.seat_columns.to_string(),
            });
        }
        if seat_fee(self.seat_price, layout.capacity() as usize).is_err() {
            return Err(ConfigError::Invalid {
                key: "SEAT_PRICE",
                value: self.seat_price.to_string(),
            });
        }
        Ok(self)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            seat_rows: 5,
            seat_columns: 8,
            seat_price: 25_000,
            reference_attempts: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let booking_defaults = BookingConfig::default();

        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_or("PORT", 8000)?,
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "showtime_booking=debug,tower_http=debug".to_string()),
            },
            database: match env::var("DATABASE_URL") {
                Ok(url) => Some(DatabaseConfig {
                    url,
                    pool_size: parse_or("DB_POOL_SIZE", 20)?,
                }),
                Err(_) => None,
            },
            redis: match env::var("REDIS_URL") {
                Ok(url) => Some(RedisConfig {
                    url,
                    seats_ttl_seconds: parse_or("SEATS_CACHE_TTL_SECONDS", 30)?,
                }),
                Err(_) => None,
            },
            booking: BookingConfig {
                seat_rows: parse_or("SEAT_ROWS", booking_defaults.seat_rows)?,
                seat_columns: parse_or("SEAT_COLUMNS", booking_defaults.seat_columns)?,
                seat_price: parse_or("SEAT_PRICE", booking_defaults.seat_price)?,
                reference_attempts: parse_or("REFERENCE_ATTEMPTS", booking_defaults.reference_attempts)?,
            }
            .validated()?,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_forty_seats() {
        assert_eq!(BookingConfig::default().layout().capacity(), 40);
    }

    #[test]
    fn unusable_booking_defaults_are_rejected() {
        assert!(BookingConfig::default().validated().is_ok());

        let no_rows = BookingConfig { seat_rows: 0, ..BookingConfig::default() };
        assert!(matches!(no_rows.validated(), Err(ConfigError::Invalid { key: "SEAT_ROWS", .. })));

        let too_many_rows = BookingConfig { seat_rows: 27, ..BookingConfig::default() };
        assert!(matches!(too_many_rows.validated(), Err(ConfigError::Invalid { key: "SEAT_ROWS", .. })));

        let no_columns = BookingConfig { seat_columns: 0, ..BookingConfig::default() };
        assert!(matches!(no_columns.validated(), Err(ConfigError::Invalid { key: "SEAT_COLUMNS", .. })));

        let huge_price = BookingConfig { seat_price: i64::MAX, ..BookingConfig::default() };
        assert!(matches!(huge_price.validated(), Err(ConfigError::Invalid { key: "SEAT_PRICE", .. })));
    }

    #[test]
    fn parse_or_falls_back_and_rejects_garbage() {
        assert_eq!(parse_or("SHOWTIME_TEST_UNSET_KEY", 7u32).unwrap(), 7);

        env::set_var("SHOWTIME_TEST_BAD_PORT", "eighty");
        let err = parse_or::<u16>("SHOWTIME_TEST_BAD_PORT", 80).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SHOWTIME_TEST_BAD_PORT", .. }));
        env::remove_var("SHOWTIME_TEST_BAD_PORT");
    }
}
