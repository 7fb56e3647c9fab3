//! Process configuration, read once from the environment at startup.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be a valid number, got '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Settings for the sales service.
///
/// | Variable | Default |
/// |---|---|
/// | `DATABASE_URL` | required |
/// | `HOST` | `0.0.0.0` |
/// | `PORT` | `3003` |
/// | `CLIENTS_SERVICE_URL` | `http://localhost:3001/api` |
/// | `PRODUCTS_SERVICE_URL` | `http://localhost:3002/api` |
/// | `GATEWAY_TIMEOUT_SECS` | `5` |
/// | `DB_POOL_SIZE` | `10` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub clients_service_url: String,
    pub products_service_url: String,
    pub gateway_timeout: Duration,
    pub db_pool_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default =
            |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            host: or_default("HOST", "0.0.0.0"),
            port: parse_number(&lookup, "PORT", 3003)?,
            clients_service_url: or_default("CLIENTS_SERVICE_URL", "http://localhost:3001/api"),
            products_service_url: or_default("PRODUCTS_SERVICE_URL", "http://localhost:3002/api"),
            gateway_timeout: Duration::from_secs(parse_number(&lookup, "GATEWAY_TIMEOUT_SECS", 5)?),
            db_pool_size: parse_number(&lookup, "DB_POOL_SIZE", 10)?,
        })
    }
}

fn parse_number<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
