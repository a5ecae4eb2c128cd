use koach_core::model::{
    BookId, GoalMode, PlanId, PlanStatus, ReadingPlan, ReadingSession, SessionId, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_column(row: &SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    let v: i64 = row.try_get(field).map_err(ser)?;
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn plan_id_from_i64(v: i64) -> Result<PlanId, StorageError> {
    Ok(PlanId::new(i64_to_u64("plan_id", v)?))
}

pub(crate) fn book_id_from_i64(v: i64) -> Result<BookId, StorageError> {
    Ok(BookId::new(i64_to_u64("book_id", v)?))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

pub(crate) fn parse_goal_mode(s: &str) -> Result<GoalMode, StorageError> {
    match s {
        "pages_per_day" => Ok(GoalMode::PagesPerDay),
        "finish_by_date" => Ok(GoalMode::FinishByDate),
        _ => Err(StorageError::Serialization(format!("invalid goal mode: {s}"))),
    }
}

pub(crate) fn parse_plan_status(s: &str) -> Result<PlanStatus, StorageError> {
    match s {
        "active" => Ok(PlanStatus::Active),
        "completed" => Ok(PlanStatus::Completed),
        "paused" => Ok(PlanStatus::Paused),
        _ => Err(StorageError::Serialization(format!("invalid status: {s}"))),
    }
}

pub(crate) const PLAN_COLUMNS: &str = r"
    id, user_id, book_id, title, goal_mode, start_date, end_date,
    daily_goal, total_pages, current_page, minutes_spent, status, created_at
";

pub(crate) const SESSION_COLUMNS: &str = r"
    id, plan_id, book_id, pages_read, minutes_spent, notes, koach_earned, created_at
";

pub(crate) fn map_plan_row(row: &SqliteRow) -> Result<ReadingPlan, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let goal_mode: String = row.try_get("goal_mode").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;

    ReadingPlan::from_persisted(
        plan_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        user_id.parse::<UserId>().map_err(ser)?,
        book_id_from_i64(row.try_get::<i64, _>("book_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        parse_goal_mode(&goal_mode)?,
        row.try_get("start_date").map_err(ser)?,
        row.try_get("end_date").map_err(ser)?,
        u32_column(row, "daily_goal")?,
        u32_column(row, "total_pages")?,
        u32_column(row, "current_page")?,
        u32_column(row, "minutes_spent")?,
        parse_plan_status(&status)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<ReadingSession, StorageError> {
    Ok(ReadingSession {
        id: session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        plan_id: row
            .try_get::<Option<i64>, _>("plan_id")
            .map_err(ser)?
            .map(plan_id_from_i64)
            .transpose()?,
        book_id: book_id_from_i64(row.try_get::<i64, _>("book_id").map_err(ser)?)?,
        pages_read: u32_column(row, "pages_read")?,
        minutes_spent: u32_column(row, "minutes_spent")?,
        notes: row.try_get("notes").map_err(ser)?,
        koach_earned: u32_column(row, "koach_earned")?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [PlanStatus::Active, PlanStatus::Completed, PlanStatus::Paused] {
            assert_eq!(parse_plan_status(status.as_str()).unwrap(), status);
        }
        assert!(parse_plan_status("archived").is_err());
    }

    #[test]
    fn goal_mode_strings_round_trip() {
        for mode in [GoalMode::PagesPerDay, GoalMode::FinishByDate] {
            assert_eq!(parse_goal_mode(mode.as_str()).unwrap(), mode);
        }
    }

    #[test]
    fn negative_ids_are_rejected() {
        assert!(plan_id_from_i64(-1).is_err());
        assert_eq!(book_id_from_i64(5).unwrap(), BookId::new(5));
    }
}
