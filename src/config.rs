use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub booking: BookingConfig,
    pub reminders: ReminderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Maximum insert attempts when appointment creation hits a transient
    /// backend rate limit.
    pub create_max_attempts: u32,
    /// Backoff before the first retry; doubles on each subsequent attempt.
    pub create_initial_backoff_seconds: u64,
    /// How many fresh confirmation codes to try when an insert collides with
    /// an existing code.
    pub code_regeneration_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    /// Whether the reminder worker is enabled.
    pub enabled: bool,
    /// How often (seconds) the worker re-scans upcoming appointments.
    pub poll_interval_seconds: u64,
    /// Lead time (minutes) for the day-before reminder.
    pub day_before_lead_minutes: i64,
    /// Half-width (minutes) of the scan window around the day-before mark.
    pub day_before_half_window_minutes: i64,
    /// Lead time (minutes) for the starting-soon reminder.
    pub soon_lead_minutes: i64,
    /// Half-width (minutes) of the scan window around the starting-soon mark.
    pub soon_half_window_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/salon.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            booking: BookingConfig {
                create_max_attempts: env::var("BOOKING_CREATE_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                create_initial_backoff_seconds: env::var("BOOKING_CREATE_INITIAL_BACKOFF_SECONDS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2u64),
                code_regeneration_attempts: env::var("BOOKING_CODE_REGENERATION_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
            },
            reminders: ReminderConfig {
                enabled: match env::var("REMINDERS_ENABLED") {
                    Ok(v) => match v.to_lowercase().as_str() {
                        "1" | "true" | "yes" => true,
                        "0" | "false" | "no" => false,
                        _ => true,
                    },
                    Err(_) => true,
                },
                poll_interval_seconds: env::var("REMINDERS_POLL_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300u64),
                day_before_lead_minutes: env::var("REMINDERS_DAY_BEFORE_LEAD_MINUTES")
                    .unwrap_or_else(|_| "1440".to_string())
                    .parse()
                    .unwrap_or(1440),
                day_before_half_window_minutes: env::var("REMINDERS_DAY_BEFORE_HALF_WINDOW_MINUTES")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                soon_lead_minutes: env::var("REMINDERS_SOON_LEAD_MINUTES")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
                soon_half_window_minutes: env::var("REMINDERS_SOON_HALF_WINDOW_MINUTES")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/salon.db".to_string(),
                max_connections: 5,
            },
            booking: BookingConfig {
                create_max_attempts: 3,
                create_initial_backoff_seconds: 2,
                code_regeneration_attempts: 3,
            },
            reminders: ReminderConfig {
                enabled: true,
                poll_interval_seconds: 300,
                day_before_lead_minutes: 1440,
                day_before_half_window_minutes: 60,
                soon_lead_minutes: 30,
                soon_half_window_minutes: 5,
            },
        }
    }
}
