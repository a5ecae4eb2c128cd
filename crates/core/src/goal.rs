//! Turns a user's goal (a pace or a finish date) into a daily page target and
//! an end date.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Field;
use crate::model::GoalMode;

/// Plan length used when the book's page count is unknown.
pub const UNKNOWN_LENGTH_PLAN_DAYS: u64 = 30;

/// Daily goal used for finish-by-date plans when the page count is unknown.
pub const UNKNOWN_LENGTH_DAILY_GOAL: u32 = 10;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GoalError {
    #[error("pages per day must be > 0, got {provided}")]
    InvalidPagesPerDay { provided: i64 },

    #[error("pages per day is too large: {provided}")]
    PagesPerDayOutOfRange { provided: i64 },

    #[error("pages per day ({pages_per_day}) exceeds the book's {total_pages} pages")]
    PagesPerDayExceedsTotal { pages_per_day: i64, total_pages: u32 },

    #[error("end date {end} must be after start date {start}")]
    EndDateNotAfterStart { start: NaiveDate, end: NaiveDate },

    #[error("plan end date is out of the supported calendar range")]
    DateOutOfRange,
}

impl GoalError {
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            GoalError::InvalidPagesPerDay { .. }
            | GoalError::PagesPerDayOutOfRange { .. }
            | GoalError::PagesPerDayExceedsTotal { .. } => Field::PagesPerDay,
            GoalError::EndDateNotAfterStart { .. } | GoalError::DateOutOfRange => Field::EndDate,
        }
    }
}

//
// ─── INPUT / OUTPUT ────────────────────────────────────────────────────────────
//

/// What the user typed when creating a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalInput {
    PagesPerDay(i64),
    FinishBy(NaiveDate),
}

impl GoalInput {
    #[must_use]
    pub fn mode(&self) -> GoalMode {
        match self {
            GoalInput::PagesPerDay(_) => GoalMode::PagesPerDay,
            GoalInput::FinishBy(_) => GoalMode::FinishByDate,
        }
    }
}

/// Normalized goal: every plan carries both a pace and an end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGoal {
    pub daily_goal: u32,
    pub end_date: NaiveDate,
}

//
// ─── RESOLVER ──────────────────────────────────────────────────────────────────
//

/// Resolve a goal against the book length and start date.
///
/// Day counting is inclusive: reading on `start_date` counts as day 1.
/// A `total_pages` of 0 means the length is unknown and the documented
/// fallbacks apply instead of an error.
///
/// # Errors
///
/// Returns `GoalError` for a non-positive pace, a pace above a known page
/// count, or an end date that is not after the start date.
///
/// ```
/// # use chrono::NaiveDate;
/// # use koach_core::goal::{resolve, GoalInput};
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let goal = resolve(250, start, GoalInput::PagesPerDay(25))?;
/// assert_eq!(goal.end_date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
/// # Ok::<(), koach_core::goal::GoalError>(())
/// ```
pub fn resolve(
    total_pages: u32,
    start_date: NaiveDate,
    input: GoalInput,
) -> Result<ResolvedGoal, GoalError> {
    match input {
        GoalInput::PagesPerDay(pages) => resolve_pace(total_pages, start_date, pages),
        GoalInput::FinishBy(end_date) => resolve_deadline(total_pages, start_date, end_date),
    }
}

fn resolve_pace(
    total_pages: u32,
    start_date: NaiveDate,
    pages_per_day: i64,
) -> Result<ResolvedGoal, GoalError> {
    if pages_per_day <= 0 {
        return Err(GoalError::InvalidPagesPerDay {
            provided: pages_per_day,
        });
    }
    if total_pages > 0 && pages_per_day > i64::from(total_pages) {
        return Err(GoalError::PagesPerDayExceedsTotal {
            pages_per_day,
            total_pages,
        });
    }
    let daily_goal =
        u32::try_from(pages_per_day).map_err(|_| GoalError::PagesPerDayOutOfRange {
            provided: pages_per_day,
        })?;

    let extra_days = if total_pages > 0 {
        u64::from(total_pages.div_ceil(daily_goal)) - 1
    } else {
        UNKNOWN_LENGTH_PLAN_DAYS
    };
    let end_date = start_date
        .checked_add_days(Days::new(extra_days))
        .ok_or(GoalError::DateOutOfRange)?;

    Ok(ResolvedGoal {
        daily_goal,
        end_date,
    })
}

fn resolve_deadline(
    total_pages: u32,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<ResolvedGoal, GoalError> {
    if end_date <= start_date {
        return Err(GoalError::EndDateNotAfterStart {
            start: start_date,
            end: end_date,
        });
    }

    // Both boundary days are reading days.
    let span = end_date.signed_duration_since(start_date).num_days();
    let reading_days = u64::try_from(span).map_err(|_| GoalError::DateOutOfRange)? + 1;

    let daily_goal = if total_pages > 0 {
        // Never exceeds total_pages, so it fits back into u32.
        u32::try_from(u64::from(total_pages).div_ceil(reading_days))
            .map_err(|_| GoalError::DateOutOfRange)?
    } else {
        UNKNOWN_LENGTH_DAILY_GOAL
    };

    Ok(ResolvedGoal {
        daily_goal,
        end_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn pace_derives_inclusive_end_date() {
        let goal = resolve(250, date(2024, 1, 1), GoalInput::PagesPerDay(25)).unwrap();
        assert_eq!(goal.daily_goal, 25);
        assert_eq!(goal.end_date, date(2024, 1, 10));
    }

    #[test]
    fn pace_rounds_partial_last_day_up() {
        let goal = resolve(251, date(2024, 1, 1), GoalInput::PagesPerDay(25)).unwrap();
        assert_eq!(goal.end_date, date(2024, 1, 11));
    }

    #[test]
    fn deadline_derives_ceiling_pace() {
        let goal = resolve(250, date(2024, 1, 1), GoalInput::FinishBy(date(2024, 1, 11))).unwrap();
        assert_eq!(goal.daily_goal, 23);
        assert_eq!(goal.end_date, date(2024, 1, 11));
    }

    #[test]
    fn unknown_length_pace_falls_back_to_thirty_days() {
        let goal = resolve(0, date(2024, 3, 1), GoalInput::PagesPerDay(20)).unwrap();
        assert_eq!(goal.daily_goal, 20);
        assert_eq!(goal.end_date, date(2024, 3, 31));
    }

    #[test]
    fn unknown_length_deadline_falls_back_to_ten_pages() {
        let goal = resolve(0, date(2024, 3, 1), GoalInput::FinishBy(date(2024, 3, 8))).unwrap();
        assert_eq!(goal.daily_goal, UNKNOWN_LENGTH_DAILY_GOAL);
    }

    #[test]
    fn non_positive_pace_is_rejected() {
        for pages in [0, -3] {
            let err = resolve(100, date(2024, 1, 1), GoalInput::PagesPerDay(pages)).unwrap_err();
            assert_eq!(err, GoalError::InvalidPagesPerDay { provided: pages });
            assert_eq!(err.field(), Field::PagesPerDay);
        }
    }

    #[test]
    fn unknown_length_pace_above_u32_is_out_of_range() {
        let err = resolve(0, date(2024, 1, 1), GoalInput::PagesPerDay(5_000_000_000)).unwrap_err();
        assert_eq!(
            err,
            GoalError::PagesPerDayOutOfRange {
                provided: 5_000_000_000
            }
        );
        assert_eq!(err.field(), Field::PagesPerDay);
        assert_eq!(err.to_string(), "pages per day is too large: 5000000000");
    }

    #[test]
    fn pace_above_known_total_is_rejected() {
        let err = resolve(100, date(2024, 1, 1), GoalInput::PagesPerDay(101)).unwrap_err();
        assert!(matches!(err, GoalError::PagesPerDayExceedsTotal { .. }));
        assert_eq!(err.field(), Field::PagesPerDay);
    }

    #[test]
    fn pace_equal_to_total_is_a_single_day_plan() {
        let goal = resolve(100, date(2024, 1, 1), GoalInput::PagesPerDay(100)).unwrap();
        assert_eq!(goal.end_date, date(2024, 1, 1));
    }

    #[test]
    fn deadline_on_or_before_start_is_rejected() {
        for end in [date(2024, 1, 1), date(2023, 12, 31)] {
            let err = resolve(100, date(2024, 1, 1), GoalInput::FinishBy(end)).unwrap_err();
            assert!(matches!(err, GoalError::EndDateNotAfterStart { .. }));
            assert_eq!(err.field(), Field::EndDate);
        }
    }

    #[test]
    fn pace_always_finishes_by_end_date() {
        let start = date(2024, 1, 1);
        for total in [1_u32, 7, 99, 250, 1_001] {
            for pace in 1..=total.min(60) {
                let goal = resolve(total, start, GoalInput::PagesPerDay(i64::from(pace))).unwrap();
                let days = u32::try_from((goal.end_date - start).num_days() + 1).unwrap();
                assert!(
                    goal.daily_goal * days >= total,
                    "total={total} pace={pace} days={days}"
                );
                assert!(goal.daily_goal * (days - 1) < total, "plan has a spare day");
            }
        }
    }
}
