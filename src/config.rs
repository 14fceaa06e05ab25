use std::env;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub schedule: ScheduleConfig,
    pub enrollment: EnrollmentConfig,
    pub vacancy: VacancyConfig,
    pub media: MediaConfig,
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
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for auth endpoints (e.g. /api/auth/login)
    pub auth_per_second: u32,
    /// Burst size for auth endpoints
    pub auth_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Offset of the local class timezone from UTC, in minutes (Nepal is +345).
    pub utc_offset_minutes: i32,
    /// Lead window for "starting soon", in minutes.
    pub starting_soon_window_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentConfig {
    /// Days of access granted by a confirmed payment.
    pub access_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VacancyConfig {
    /// Flat application fee in minor currency units.
    pub application_fee_cents: i64,
    /// Upper bound for uploaded CV files, in bytes.
    pub cv_max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Root directory for uploaded files (CVs, course images).
    pub root: String,
}

impl ScheduleConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Wall-clock time of the class timezone for a UTC instant.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.offset()).naive_local()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let utc_offset_minutes: i32 = env::var("SCHEDULE_UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| "345".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("SCHEDULE_UTC_OFFSET_MINUTES".to_string()))?;
        if utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidValue(
                "SCHEDULE_UTC_OFFSET_MINUTES".to_string(),
            ));
        }

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
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .unwrap_or(24),
            },
            rate_limit: RateLimitConfig {
                auth_per_second: env::var("RATE_LIMIT_AUTH_PER_SECOND")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                auth_burst: env::var("RATE_LIMIT_AUTH_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            schedule: ScheduleConfig {
                utc_offset_minutes,
                starting_soon_window_minutes: env::var("STARTING_SOON_WINDOW_MINUTES")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            enrollment: EnrollmentConfig {
                access_days: env::var("ENROLLMENT_ACCESS_DAYS")
                    .unwrap_or_else(|_| "365".to_string())
                    .parse()
                    .unwrap_or(365),
            },
            vacancy: VacancyConfig {
                application_fee_cents: env::var("APPLICATION_FEE_CENTS")
                    .unwrap_or_else(|_| "10000".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("APPLICATION_FEE_CENTS".to_string()))?,
                cv_max_bytes: env::var("CV_MAX_BYTES")
                    .unwrap_or_else(|_| (5 * 1024 * 1024).to_string())
                    .parse()
                    .unwrap_or(5 * 1024 * 1024),
            },
            media: MediaConfig {
                root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "data/media".to_string()),
            },
        })
    }

    /// Whether request logs should be emitted as JSON (`LOG_JSON`).
    pub fn json_logs() -> bool {
        env::var("LOG_JSON")
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

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
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 24,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
            },
            schedule: ScheduleConfig {
                utc_offset_minutes: 345,
                starting_soon_window_minutes: 10,
            },
            enrollment: EnrollmentConfig { access_days: 365 },
            vacancy: VacancyConfig {
                application_fee_cents: 10_000,
                cv_max_bytes: 5 * 1024 * 1024,
            },
            media: MediaConfig {
                root: "data/media".to_string(),
            },
        }
    }
}
