use koach_core::model::{PlanId, ReadingPlan, UserId};
use sqlx::{Executor, Sqlite};

use super::SqliteRepository;
use super::mapping::{PLAN_COLUMNS, conn, id_i64, map_plan_row};
use crate::repository::{NewPlanRecord, PlanPatch, PlanRepository, StorageError};

/// Load one plan through any executor, so callers inside a transaction read
/// their own writes.
pub(crate) async fn fetch_plan<'e, E>(exec: E, id: i64) -> Result<Option<ReadingPlan>, StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {PLAN_COLUMNS} FROM reading_plans WHERE id = ?1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await
        .map_err(conn)?;

    row.as_ref().map(map_plan_row).transpose()
}

#[async_trait::async_trait]
impl PlanRepository for SqliteRepository {
    async fn insert_new_plan(&self, plan: NewPlanRecord) -> Result<ReadingPlan, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO reading_plans (
                user_id, book_id, title, goal_mode, start_date, end_date,
                daily_goal, total_pages, current_page, minutes_spent, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, 'active', ?9)
            ",
        )
        .bind(plan.user_id.to_string())
        .bind(id_i64("book_id", plan.book_id.value())?)
        .bind(plan.title)
        .bind(plan.goal_mode.as_str())
        .bind(plan.start_date)
        .bind(plan.end_date)
        .bind(i64::from(plan.daily_goal))
        .bind(i64::from(plan.total_pages))
        .bind(plan.created_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let stored = fetch_plan(&mut *tx, res.last_insert_rowid())
            .await?
            .ok_or(StorageError::NotFound)?;
        tx.commit().await.map_err(conn)?;
        Ok(stored)
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<ReadingPlan>, StorageError> {
        fetch_plan(&self.pool, id_i64("plan_id", id.value())?).await
    }

    async fn update_plan(&self, id: PlanId, patch: PlanPatch) -> Result<ReadingPlan, StorageError> {
        let plan_id = id_i64("plan_id", id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            UPDATE reading_plans SET
                title = COALESCE(?1, title),
                status = COALESCE(?2, status)
            WHERE id = ?3
            ",
        )
        .bind(patch.title)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(plan_id)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let updated = fetch_plan(&mut *tx, plan_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        tx.commit().await.map_err(conn)?;
        Ok(updated)
    }

    async fn list_plans(&self, user_id: UserId) -> Result<Vec<ReadingPlan>, StorageError> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM reading_plans WHERE user_id = ?1 ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut plans = Vec::with_capacity(rows.len());
        for row in rows {
            plans.push(map_plan_row(&row)?);
        }
        Ok(plans)
    }
}
