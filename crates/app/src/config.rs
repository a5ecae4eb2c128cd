//! Startup configuration for the `koach` binary.
//!
//! Values come from the environment (with an optional `.env` file for local
//! use); command-line flags override them afterwards.

use std::path::Path;

use koach_core::model::UserId;
use storage::sqlite::{DEFAULT_DB_URL, MEMORY_URL as MEMORY_DB_URL, normalize_sqlite_url};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Normalized `sqlite://` URL, or `sqlite::memory:`.
    pub db_url: String,
    pub user_id: UserId,
    pub log_filter: String,
}

impl Config {
    /// Load `.env` if present, then read `KOACH_DB_URL`, `KOACH_USER_ID` and
    /// `RUST_LOG`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unparsable user id or log
    /// filter.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as `from_env`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_url = match lookup("KOACH_DB_URL") {
            Some(raw) if !raw.trim().is_empty() => normalize_sqlite_url(&raw),
            _ => normalize_sqlite_url(DEFAULT_DB_URL),
        };

        let user_id = match lookup("KOACH_USER_ID") {
            Some(raw) => parse_user_id("KOACH_USER_ID", &raw)?,
            None => UserId::default(),
        };

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());
        EnvFilter::try_new(&log_filter)
            .map_err(|e| ConfigError::InvalidValue("RUST_LOG", e.to_string()))?;

        Ok(Self {
            db_url,
            user_id,
            log_filter,
        })
    }

    /// Override the database URL from `--db`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a blank value.
    pub fn set_db_url(&mut self, raw: &str) -> Result<(), ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::InvalidValue("--db", raw.to_string()));
        }
        self.db_url = normalize_sqlite_url(raw);
        Ok(())
    }

    /// Override the user from `--user`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `raw` is not a UUID.
    pub fn set_user_id(&mut self, raw: &str) -> Result<(), ConfigError> {
        self.user_id = parse_user_id("--user", raw)?;
        Ok(())
    }

    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_filter).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn parse_user_id(source: &'static str, raw: &str) -> Result<UserId, ConfigError> {
    raw.trim()
        .parse::<UserId>()
        .map_err(|_| ConfigError::InvalidValue(source, raw.to_string()))
}

/// Create the database file (and parent directories) so SQLite can open it.
///
/// # Errors
///
/// Returns an IO error if the file or its directory cannot be created, or
/// `ConfigError` if `db_url` is not a `sqlite://` URL.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == MEMORY_DB_URL || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ConfigError::InvalidValue("KOACH_DB_URL", db_url.to_string()))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ConfigError::InvalidValue("KOACH_DB_URL", db_url.to_string()).into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}
