//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TIENDA_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `TIENDA_HOST` - Bind address (default: 127.0.0.1)
//! - `TIENDA_PORT` - Listen port (default: 3000)
//! - `TIENDA_UTC_OFFSET_MINUTES` - Store local time offset (default: -300, Lima)
//! - `TIENDA_MORA_DIARIA` - Daily late-fee rate on overdue installments (default: 0.001)
//! - `TIENDA_CORS_ORIGINS` - Comma-separated list of allowed browser origins
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)
//!
//! ## Logging
//! Read by the server binary, not by [`ApiConfig`]:
//! - `LOG_FORMAT` - `json` for JSON log lines, anything else for text
//! - `RUST_LOG` - `tracing` filter (default: `tienda_api=info,tower_http=debug`)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UTC_OFFSET_MINUTES: i32 = -300;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Offset of the store's local time; schedules and exceptions are local.
    pub utc_offset: FixedOffset,
    /// Daily late-fee rate applied to overdue installments.
    pub mora_diaria: Decimal,
    /// Browser origins allowed by CORS. Empty disables the CORS layer.
    pub cors_origins: Vec<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("TIENDA_DATABASE_URL")?;
        let host = parse_env_or("TIENDA_HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?;
        let port = parse_env_or("TIENDA_PORT", DEFAULT_PORT)?;
        let offset_minutes = parse_env_or("TIENDA_UTC_OFFSET_MINUTES", DEFAULT_UTC_OFFSET_MINUTES)?;
        let utc_offset = utc_offset_from_minutes(offset_minutes).ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "TIENDA_UTC_OFFSET_MINUTES".to_string(),
                format!("must be within ±{MAX_UTC_OFFSET_MINUTES} minutes"),
            )
        })?;
        let mora_diaria = parse_env_or("TIENDA_MORA_DIARIA", Decimal::new(1, 3))?;
        if mora_diaria.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "TIENDA_MORA_DIARIA".to_string(),
                "must not be negative".to_string(),
            ));
        }
        let cors_origins = get_optional_env("TIENDA_CORS_ORIGINS")
            .map(|s| parse_origins(&s))
            .unwrap_or_default();

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            utc_offset,
            mora_diaria,
            cors_origins,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Configuration with defaults for everything but the database.
    ///
    /// Used by the CLI and tests, which never read the server variables.
    #[must_use]
    pub fn with_database_url(database_url: SecretString) -> Self {
        Self {
            database_url,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            utc_offset: utc_offset_from_minutes(DEFAULT_UTC_OFFSET_MINUTES)
                .unwrap_or_else(|| Utc.fix()),
            mora_diaria: Decimal::new(1, 3),
            cors_origins: Vec::new(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Current store-local date and time.
    #[must_use]
    pub fn ahora_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.utc_offset).naive_local()
    }

    /// Current store-local date.
    #[must_use]
    pub fn hoy(&self) -> NaiveDate {
        self.ahora_local().date()
    }

    /// Convert a store-local instant to UTC.
    #[must_use]
    pub fn a_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - self.utc_offset).and_utc()
    }
}

fn utc_offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return None;
    }
    FixedOffset::east_opt(minutes * 60)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

// =============================================================================
// Helpers
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, using `default` when it is unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_socket_addr() {
        let mut config = ApiConfig::with_database_url(SecretString::from("postgres://localhost/t"));
        config.port = 8080;
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::with_database_url(SecretString::from("postgres://localhost/t"));
        assert_eq!(config.utc_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(config.mora_diaria, Decimal::new(1, 3));
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.database_url.expose_secret(), "postgres://localhost/t");
    }

    #[test]
    fn test_local_time_converts_to_utc() {
        let config = ApiConfig::with_database_url(SecretString::from("postgres://localhost/t"));
        let local = NaiveDate::from_ymd_opt(2026, 10, 15)
            .unwrap()
            .and_hms_opt(22, 30, 0)
            .unwrap();
        let utc = config.a_utc(local);
        assert_eq!(utc.to_rfc3339(), "2026-10-16T03:30:00+00:00");
    }

    #[test]
    fn test_utc_offset_bounds() {
        assert!(utc_offset_from_minutes(-300).is_some());
        assert!(utc_offset_from_minutes(14 * 60).is_some());
        assert!(utc_offset_from_minutes(15 * 60).is_none());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://tienda.pe/, ,http://localhost:5173"),
            vec!["https://tienda.pe", "http://localhost:5173"]
        );
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config =
            ApiConfig::with_database_url(SecretString::from("postgres://user:hunter2@db/tienda"));
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("hunter2"));
    }
}
