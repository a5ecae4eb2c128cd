use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: [&str; 6] = [
    r"
        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            total_pages INTEGER NOT NULL CHECK (total_pages >= 0)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS reading_plans (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            book_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            goal_mode TEXT NOT NULL CHECK (goal_mode IN ('pages_per_day', 'finish_by_date')),
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            daily_goal INTEGER NOT NULL CHECK (daily_goal > 0),
            total_pages INTEGER NOT NULL CHECK (total_pages >= 0),
            current_page INTEGER NOT NULL DEFAULT 0 CHECK (current_page >= 0),
            minutes_spent INTEGER NOT NULL DEFAULT 0 CHECK (minutes_spent >= 0),
            status TEXT NOT NULL CHECK (status IN ('active', 'completed', 'paused')),
            created_at TEXT NOT NULL,
            CHECK (end_date >= start_date)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS reading_sessions (
            id INTEGER PRIMARY KEY,
            plan_id INTEGER,
            book_id INTEGER NOT NULL,
            pages_read INTEGER NOT NULL CHECK (pages_read > 0),
            minutes_spent INTEGER NOT NULL CHECK (minutes_spent >= 0),
            notes TEXT,
            koach_earned INTEGER NOT NULL CHECK (koach_earned >= 0),
            created_at TEXT NOT NULL,
            FOREIGN KEY (plan_id) REFERENCES reading_plans(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_reading_plans_user
            ON reading_plans (user_id, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_reading_sessions_plan
            ON reading_sessions (plan_id, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_reading_sessions_book_created
            ON reading_sessions (book_id, created_at);
    ",
];

/// Runs versioned migrations. Each version is applied in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
        ",
    )
    .execute(pool)
    .await?;

    // Version 1: books, plans and sessions.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied sqlite migration");
    }

    Ok(())
}
