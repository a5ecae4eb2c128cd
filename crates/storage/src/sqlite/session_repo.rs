use koach_core::model::{PlanId, PlanStatus, ReadingSession};
use sqlx::{Executor, Row, Sqlite};

use super::SqliteRepository;
use super::mapping::{
    SESSION_COLUMNS, conn, id_i64, map_session_row, parse_plan_status, ser, session_id_from_i64,
};
use super::plan_repo::fetch_plan;
use crate::repository::{
    NewSessionRecord, PlanProgress, RecordedSession, SessionPersistence, SessionRepository,
    StorageError,
};

async fn insert_session<'e, E>(
    exec: E,
    session: NewSessionRecord,
) -> Result<ReadingSession, StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let plan_id = session
        .draft
        .plan_id
        .map(|id| id_i64("plan_id", id.value()))
        .transpose()?;

    let res = sqlx::query(
        r"
            INSERT INTO reading_sessions (
                plan_id, book_id, pages_read, minutes_spent, notes, koach_earned, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ",
    )
    .bind(plan_id)
    .bind(id_i64("book_id", session.draft.book_id.value())?)
    .bind(i64::from(session.draft.pages_read))
    .bind(i64::from(session.draft.minutes_spent))
    .bind(session.draft.notes.clone())
    .bind(i64::from(session.koach_earned))
    .bind(session.created_at)
    .execute(exec)
    .await
    .map_err(conn)?;

    let id = session_id_from_i64(res.last_insert_rowid())?;
    Ok(session.into_session(id))
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn append_session(
        &self,
        session: NewSessionRecord,
    ) -> Result<ReadingSession, StorageError> {
        if session.draft.plan_id.is_some() {
            return Err(StorageError::Conflict);
        }
        insert_session(&self.pool, session).await
    }

    async fn sessions_for_plan(
        &self,
        plan_id: PlanId,
    ) -> Result<Vec<ReadingSession>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM reading_sessions WHERE plan_id = ?1 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("plan_id", plan_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl SessionPersistence for SqliteRepository {
    async fn record_plan_session(
        &self,
        session: NewSessionRecord,
        progress: PlanProgress,
    ) -> Result<RecordedSession, StorageError> {
        if session.draft.plan_id != Some(progress.plan_id) {
            return Err(StorageError::Conflict);
        }
        let plan_id = id_i64("plan_id", progress.plan_id.value())?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        // Take the write lock first so the read below and the update see the
        // same row, and a deferred read never has to upgrade a stale snapshot.
        let locked = sqlx::query("UPDATE reading_plans SET status = status WHERE id = ?1")
            .bind(plan_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        if locked.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let row = sqlx::query(
            "SELECT status, current_page, minutes_spent FROM reading_plans WHERE id = ?1",
        )
        .bind(plan_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;
        let status_before = parse_plan_status(&row.try_get::<String, _>("status").map_err(ser)?)?;
        let page_before: i64 = row.try_get("current_page").map_err(ser)?;
        let minutes_before: i64 = row.try_get("minutes_spent").map_err(ser)?;
        check_counter("current_page", page_before, progress.pages)?;
        check_counter("minutes_spent", minutes_before, progress.minutes)?;

        // Completion is judged on the stored counters, including pages other
        // writers committed since the caller read the plan.
        sqlx::query(
            r"
            UPDATE reading_plans SET
                current_page = current_page + ?1,
                minutes_spent = minutes_spent + ?2,
                status = CASE
                    WHEN status = 'active'
                        AND total_pages > 0
                        AND current_page + ?1 >= total_pages
                    THEN 'completed'
                    ELSE status
                END
            WHERE id = ?3
            ",
        )
        .bind(i64::from(progress.pages))
        .bind(i64::from(progress.minutes))
        .bind(plan_id)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let stored = insert_session(&mut *tx, session).await?;
        let plan = fetch_plan(&mut *tx, plan_id)
            .await?
            .ok_or(StorageError::NotFound)?;

        tx.commit().await.map_err(conn)?;

        let just_completed =
            status_before == PlanStatus::Active && plan.status() == PlanStatus::Completed;
        Ok(RecordedSession {
            session: stored,
            plan,
            just_completed,
        })
    }
}

fn check_counter(field: &'static str, stored: i64, delta: u32) -> Result<(), StorageError> {
    let stored = u32::try_from(stored)
        .map_err(|_| StorageError::Serialization(format!("invalid {field}: {stored}")))?;
    stored
        .checked_add(delta)
        .map(|_| ())
        .ok_or(StorageError::Overflow(field))
}
