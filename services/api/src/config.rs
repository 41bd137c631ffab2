//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use folktale_core::feed::{FeedConfig, DEFAULT_DEBOUNCE, DEFAULT_PAGE_SIZE};
use folktale_core::StoryOrder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Directory uploaded cover images are written to.
    pub storage_root: PathBuf,
    /// Base URL under which this server is reachable; cover URLs are built from it.
    pub public_base_url: String,
    pub cors_origin: String,
    pub page_size: usize,
    pub debounce: Duration,
    pub session_ttl_days: i64,
    pub max_upload_bytes: usize,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse().ok())?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage and HTTP Settings ---
        let storage_root = lookup("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./storage"));
        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", Some(10 * 1024 * 1024))?;

        // --- Feed and Session Settings ---
        let page_size: usize = parse_or(&lookup, "FEED_PAGE_SIZE", Some(DEFAULT_PAGE_SIZE))?;
        if page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "FEED_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let debounce_ms: u64 = parse_or(
            &lookup,
            "FEED_DEBOUNCE_MS",
            Some(DEFAULT_DEBOUNCE.as_millis() as u64),
        )?;
        let session_ttl_days: i64 = parse_or(&lookup, "SESSION_TTL_DAYS", Some(30))?;
        if session_ttl_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_DAYS".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            storage_root,
            public_base_url,
            cors_origin,
            page_size,
            debounce: Duration::from_millis(debounce_ms),
            session_ttl_days,
            max_upload_bytes,
        })
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            page_size: self.page_size,
            debounce: self.debounce,
            order: StoryOrder::Newest,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_database_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")])).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.page_size, 6);
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.session_ttl_days, 30);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn database_url_is_required() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "DATABASE_URL"));
    }

    #[test]
    fn zero_page_size_is_invalid() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("FEED_PAGE_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "FEED_PAGE_SIZE"));
    }

    #[test]
    fn trailing_slash_is_trimmed_from_the_public_url() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("PUBLIC_BASE_URL", "https://tales.example/"),
            ("FEED_DEBOUNCE_MS", "150"),
        ]))
        .unwrap();
        assert_eq!(config.public_base_url, "https://tales.example");
        assert_eq!(config.feed_config().debounce, Duration::from_millis(150));
    }
}
