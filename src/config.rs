//! Service configuration, read from the environment.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
    pub db_max_connections: u32,
    pub currency: String,
    pub image_timeout: Duration,
    pub strict_image_bounds: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let currency = lookup("STORE_CURRENCY").unwrap_or_else(|| "MDL".to_string()).to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid { key: "STORE_CURRENCY", value: currency });
        }

        Ok(Self {
            database_url,
            port: parse(&lookup, "PORT", 8083)?,
            nats_url: lookup("NATS_URL").filter(|url| !url.is_empty()),
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            currency,
            image_timeout: Duration::from_secs(parse(&lookup, "IMAGE_TIMEOUT_SECS", 30)?),
            strict_image_bounds: parse(&lookup, "IMAGE_STRICT_BOUNDS", false)?,
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
