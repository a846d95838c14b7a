//! Configuration loading and representation.
//!
//! All settings come from environment variables. [`AppConfig::from_lookup`] takes the
//! lookup as a function so tests do not have to mutate the process environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Postgres connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Upper bound on waiting for a row lock inside one transaction.
    pub lock_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres(DatabaseConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    /// Deadline applied to calls that carry none of their own.
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            store: StoreBackend::InMemory,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr: SocketAddr = parse_or("BIND_ADDR", var("BIND_ADDR"), DEFAULT_BIND_ADDR.parse().ok())?;
        let request_timeout = Duration::from_millis(parse_or(
            "REQUEST_TIMEOUT_MS",
            var("REQUEST_TIMEOUT_MS"),
            Some(DEFAULT_REQUEST_TIMEOUT_MS),
        )?);

        let persistent = match var("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => parse_bool("USE_PERSISTENT_STORES", &raw)?,
        };

        let store = if persistent {
            let url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = parse_or(
                "DB_MAX_CONNECTIONS",
                var("DB_MAX_CONNECTIONS"),
                Some(DEFAULT_DB_MAX_CONNECTIONS),
            )?;
            if max_connections == 0 {
                return Err(ConfigError::Invalid {
                    var: "DB_MAX_CONNECTIONS",
                    reason: "must be at least 1".to_string(),
                });
            }
            let lock_timeout =
                parse_or("LOCK_TIMEOUT_MS", var("LOCK_TIMEOUT_MS"), Some(DEFAULT_LOCK_TIMEOUT_MS))?;

            StoreBackend::Postgres(DatabaseConfig {
                url,
                max_connections,
                acquire_timeout: request_timeout,
                lock_timeout: Duration::from_millis(lock_timeout),
            })
        } else {
            StoreBackend::InMemory
        };

        Ok(Self {
            bind_addr,
            store,
            request_timeout,
        })
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("{raw:?}: {e}"),
        }),
        None => default.ok_or(ConfigError::Missing(var)),
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("{raw:?} is not a boolean"),
        }),
    }
}
