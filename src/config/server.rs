//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the service starts on a developer machine with
//! an empty environment; missing values are logged. `SESSION_SECRET` is the one
//! exception: production refuses to start without it.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use std::{env, fmt::Display, str::FromStr};
use tracing::{info, warn};

const DEV_SESSION_SECRET: &str = "development-only-session-secret";

/// Longest accepted session lifetime, 30 days.
pub const MAX_SESSION_TTL_HOURS: i64 = 30 * 24;

/// Runtime environment of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    /// Local development; internal error messages are returned to clients
    Development,
    /// Production; internal errors are reported generically
    Production,
}

impl AppEnv {
    /// Whether internal error details may be sent to clients.
    #[must_use]
    pub const fn exposes_error_details(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Settings needed to run the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_addr: String,
    /// sea-orm connection URL
    pub database_url: String,
    /// HMAC secret for session tokens
    pub session_secret: String,
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
    /// Runtime environment
    pub app_env: AppEnv,
    /// Tax rate in percent applied to proformas when none is given
    pub default_tax_rate: f64,
    /// Path of the TOML seed file
    pub seed_config_path: String,
    /// Origins allowed to call the API with credentials
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    /// Returns `Error::Config` if a value does not parse or is out of range, or
    /// if `SESSION_SECRET` is missing while `APP_ENV=production`.
    pub fn from_env() -> Result<Self> {
        let app_env = match var("APP_ENV").as_deref() {
            Some("production") => AppEnv::Production,
            _ => AppEnv::Development,
        };

        let session_secret = match (var("SESSION_SECRET"), app_env) {
            (Some(secret), _) => secret,
            (None, AppEnv::Production) => {
                return Err(Error::Config {
                    message: "SESSION_SECRET must be set in production".to_string(),
                });
            }
            (None, AppEnv::Development) => {
                warn!("SESSION_SECRET not set, using the development secret");
                DEV_SESSION_SECRET.to_string()
            }
        };

        let default_tax_rate: f64 = try_load("DEFAULT_TAX_RATE", "11.0")?;
        if !(0.0..=100.0).contains(&default_tax_rate) {
            return Err(Error::Config {
                message: format!("DEFAULT_TAX_RATE out of range: {default_tax_rate}"),
            });
        }

        Ok(Self {
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:8080")?,
            database_url: try_load("DATABASE_URL", DEFAULT_DATABASE_URL)?,
            session_secret,
            session_ttl_hours: check_session_ttl(try_load("SESSION_TTL_HOURS", "12")?)?,
            app_env,
            default_tax_rate,
            seed_config_path: try_load("SEED_CONFIG", "config.toml")?,
            cors_origins: var("CORS_ORIGINS")
                .map(|origins| parse_origins(&origins))
                .unwrap_or_default(),
        })
    }

    /// Session lifetime in seconds.
    #[must_use]
    pub const fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_hours * 60 * 60
    }

    /// Configuration used by tests: in-memory database and a fixed secret.
    #[cfg(test)]
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            database_url: "sqlite::memory:".to_string(),
            session_secret: "test-secret".to_string(),
            session_ttl_hours: 1,
            app_env: AppEnv::Development,
            default_tax_rate: 11.0,
            seed_config_path: "config.toml".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

fn check_session_ttl(hours: i64) -> Result<i64> {
    if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(Error::Config {
            message: format!(
                "SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}, got {hours}"
            ),
        })
    }
}

/// Splits a comma separated origin list, dropping blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e| Error::Config {
        message: format!("Invalid {key} value '{raw}': {e}"),
    })
}

/// Reads the first administrator's credentials from `ADMIN_EMAIL` and
/// `ADMIN_PASSWORD`. Both must be present.
#[must_use]
pub fn admin_credentials() -> Option<(String, String)> {
    match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
        (Some(email), Some(password)) => Some((email, password)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_development_exposes_error_details() {
        assert!(AppEnv::Development.exposes_error_details());
        assert!(!AppEnv::Production.exposes_error_details());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" http://localhost:5173, ,https://lab.example.com "),
            vec!["http://localhost:5173", "https://lab.example.com"]
        );
    }

    #[test]
    fn test_session_ttl_seconds() {
        let config = ServerConfig::for_tests();
        assert_eq!(config.session_ttl_seconds(), 3600);
    }

    #[test]
    fn test_session_ttl_bounds() {
        assert_eq!(check_session_ttl(12).unwrap_or(0), 12);
        assert_eq!(
            check_session_ttl(MAX_SESSION_TTL_HOURS).unwrap_or(0),
            MAX_SESSION_TTL_HOURS
        );
        for hours in [0, -5, MAX_SESSION_TTL_HOURS + 1, i64::MAX] {
            assert!(matches!(
                check_session_ttl(hours),
                Err(Error::Config { .. })
            ));
        }
    }

    #[test]
    fn test_try_load_falls_back_to_default() {
        let port: u16 = try_load("SAMPLE_LEDGER_TEST_UNSET_PORT", "8080").unwrap_or(0);
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_try_load_rejects_unparsable_default() {
        let result: Result<i64> = try_load("SAMPLE_LEDGER_TEST_UNSET_NUMBER", "twelve");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
