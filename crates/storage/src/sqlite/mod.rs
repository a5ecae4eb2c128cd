//! `SQLite` adapter for the repository contracts.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::Storage;

mod book_repo;
mod mapping;
mod migrate;
mod plan_repo;
mod session_repo;

/// Database used when neither `KOACH_DB_URL` nor `--db` is given.
pub const DEFAULT_DB_URL: &str = "sqlite://koach.sqlite3";
/// A private in-memory database on a single connection.
pub const MEMORY_URL: &str = "sqlite::memory:";

fn is_memory_url(url: &str) -> bool {
    url == MEMORY_URL || url.contains("mode=memory")
}

/// Turn `path`, `sqlite:path` or `sqlite://path` into an absolute
/// `sqlite://` URL, resolved against the working directory. In-memory URLs
/// pass through.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if is_memory_url(trimmed) {
        return trimmed.to_string();
    }

    let path_str = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// One pool shared by every repository role.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open (creating if missing) the database at `database_url`.
    ///
    /// Every connection enforces foreign keys and waits up to five seconds on
    /// a busy database. File databases use WAL journaling.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is malformed or the connection
    /// cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let in_memory = is_memory_url(database_url);

        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Keep an unnamed in-memory database on a single connection.
        let max_connections = if database_url == MEMORY_URL { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;
        tracing::debug!(max_connections, in_memory, "opened sqlite pool");

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the schema up to the latest version.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Connect, migrate, and wire every repository role to one `SQLite` pool.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self::from_repository(repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[test]
    fn relative_urls_become_absolute() {
        let url = normalize_sqlite_url("sqlite:koach.sqlite3");
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("/koach.sqlite3"));
        assert_eq!(url, normalize_sqlite_url(DEFAULT_DB_URL));
        assert_eq!(url, normalize_sqlite_url("koach.sqlite3"));
        assert_eq!(
            normalize_sqlite_url("sqlite:///var/lib/koach.db"),
            "sqlite:///var/lib/koach.db"
        );
    }

    #[test]
    fn memory_urls_pass_through() {
        assert_eq!(normalize_sqlite_url(" sqlite::memory: "), MEMORY_URL);
        let shared = "sqlite:file:koach?mode=memory&cache=shared";
        assert_eq!(normalize_sqlite_url(shared), shared);
    }

    #[tokio::test]
    async fn private_memory_database_keeps_its_schema() {
        let storage = Storage::sqlite(MEMORY_URL).await.unwrap();
        assert!(
            storage
                .plans
                .get_plan(koach_core::model::PlanId::new(1))
                .await
                .unwrap()
                .is_none()
        );
    }
}
