//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chapterhouse_core::authz::DraftVisibility;
use chapterhouse_core::otp::OTP_TTL_MINUTES;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Outgoing mail server for passcode delivery.
#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub otp_ttl_minutes: i64,
    pub pending_session_ttl_minutes: i64,
    pub session_ttl_days: i64,
    pub draft_visibility: DraftVisibility,
    pub cors_origin: String,
    /// `None` means passcodes are written to the log instead of mailed.
    pub smtp: Option<SmtpSettings>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Session Lifetimes ---
        let otp_ttl_minutes = parse_var("OTP_TTL_MINUTES", &OTP_TTL_MINUTES.to_string())?;
        let pending_session_ttl_minutes = parse_var("PENDING_SESSION_TTL_MINUTES", "30")?;
        let session_ttl_days = parse_var("SESSION_TTL_DAYS", "30")?;

        // --- Load Content Settings ---
        let draft_visibility = parse_var("DRAFT_VISIBILITY", "public")?;
        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load Mail Settings (as optional) ---
        let smtp = match std::env::var("SMTP_HOST").ok() {
            Some(host) => Some(SmtpSettings {
                host,
                port: parse_var("SMTP_PORT", "587")?,
                username: std::env::var("SMTP_USERNAME").ok(),
                password: std::env::var("SMTP_PASSWORD").ok(),
                from: std::env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "Chapterhouse <no-reply@localhost>".to_string()),
            }),
            None => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            otp_ttl_minutes,
            pending_session_ttl_minutes,
            session_ttl_days,
            draft_visibility,
            cors_origin,
            smtp,
        })
    }
}

impl Default for Config {
    /// Development defaults, also used by the in-process test harness.
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: String::new(),
            log_level: Level::INFO,
            otp_ttl_minutes: OTP_TTL_MINUTES,
            pending_session_ttl_minutes: 30,
            session_ttl_days: 30,
            draft_visibility: DraftVisibility::Public,
            cors_origin: "http://localhost:3000".to_string(),
            smtp: None,
        }
    }
}

/// Reads `name`, falling back to `default`, and parses it.
fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_uses_default_when_unset() {
        let minutes: i64 = parse_var("CHAPTERHOUSE_UNSET_FOR_TEST", "15").unwrap();
        assert_eq!(minutes, 15);
    }

    #[test]
    fn parse_var_reports_the_variable_name() {
        let err = parse_var::<DraftVisibility>("CHAPTERHOUSE_UNSET_FOR_TEST", "friends")
            .unwrap_err();
        assert!(err.to_string().contains("CHAPTERHOUSE_UNSET_FOR_TEST"));
    }
}
