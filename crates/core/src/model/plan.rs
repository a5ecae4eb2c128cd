use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Field;
use crate::goal::ResolvedGoal;
use crate::model::ids::{BookId, PlanId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlanError {
    #[error("plan title cannot be empty")]
    EmptyTitle,

    #[error("daily goal must be > 0")]
    InvalidDailyGoal,

    #[error("end date {end} is before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("plan is already completed")]
    AlreadyCompleted,

    #[error("pages read would overflow the plan's page counter")]
    PagesOverflow,

    #[error("minutes spent would overflow the plan's minute counter")]
    MinutesOverflow,
}

impl PlanError {
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            PlanError::EmptyTitle => Field::Title,
            PlanError::InvalidDailyGoal => Field::PagesPerDay,
            PlanError::InvalidDateRange { .. } => Field::EndDate,
            PlanError::AlreadyCompleted => Field::Status,
            PlanError::PagesOverflow => Field::PagesRead,
            PlanError::MinutesOverflow => Field::MinutesSpent,
        }
    }
}

//
// ─── GOAL MODE & STATUS ────────────────────────────────────────────────────────
//

/// How the user expressed their goal when the plan was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalMode {
    /// Fixed pace; the end date is derived.
    PagesPerDay,
    /// Fixed finish date; the pace is derived.
    FinishByDate,
}

impl GoalMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GoalMode::PagesPerDay => "pages_per_day",
            GoalMode::FinishByDate => "finish_by_date",
        }
    }
}

/// Lifecycle of a plan.
///
/// `Active -> Completed` happens automatically once the book is finished.
/// `Active <-> Paused` is manual. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Completed,
    Paused,
}

impl PlanStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Active => "active",
            PlanStatus::Completed => "completed",
            PlanStatus::Paused => "paused",
        }
    }
}

//
// ─── READING PLAN ──────────────────────────────────────────────────────────────
//

/// A user's commitment to finish a book at a pace or by a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPlan {
    id: PlanId,
    user_id: UserId,
    book_id: BookId,
    title: String,
    goal_mode: GoalMode,
    start_date: NaiveDate,
    end_date: NaiveDate,
    daily_goal: u32,
    total_pages: u32,
    current_page: u32,
    minutes_spent: u32,
    status: PlanStatus,
    created_at: DateTime<Utc>,
}

impl ReadingPlan {
    /// Build a fresh, active plan from a resolved goal.
    ///
    /// The `id` is a placeholder until storage assigns the real one.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::EmptyTitle` for a blank title, and
    /// `PlanError::InvalidDailyGoal` / `PlanError::InvalidDateRange` if the
    /// resolved goal is unusable.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PlanId,
        user_id: UserId,
        book_id: BookId,
        title: impl Into<String>,
        goal_mode: GoalMode,
        start_date: NaiveDate,
        goal: ResolvedGoal,
        total_pages: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, PlanError> {
        Self::from_persisted(
            id,
            user_id,
            book_id,
            title,
            goal_mode,
            start_date,
            goal.end_date,
            goal.daily_goal,
            total_pages,
            0,
            0,
            PlanStatus::Active,
            created_at,
        )
    }

    /// Rehydrate a plan from persisted storage.
    ///
    /// `current_page` may exceed `total_pages`; overshoot is kept as logged.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` if the stored fields violate plan invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: PlanId,
        user_id: UserId,
        book_id: BookId,
        title: impl Into<String>,
        goal_mode: GoalMode,
        start_date: NaiveDate,
        end_date: NaiveDate,
        daily_goal: u32,
        total_pages: u32,
        current_page: u32,
        minutes_spent: u32,
        status: PlanStatus,
        created_at: DateTime<Utc>,
    ) -> Result<Self, PlanError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(PlanError::EmptyTitle);
        }
        if daily_goal == 0 {
            return Err(PlanError::InvalidDailyGoal);
        }
        if end_date < start_date {
            return Err(PlanError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }

        Ok(Self {
            id,
            user_id,
            book_id,
            title,
            goal_mode,
            start_date,
            end_date,
            daily_goal,
            total_pages,
            current_page,
            minutes_spent,
            status,
            created_at,
        })
    }

    /// Same plan under a storage-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: PlanId) -> Self {
        self.id = id;
        self
    }

    /// Transition to `Completed`.
    ///
    /// Returns `true` only when this call performed the `Active -> Completed`
    /// edge, so callers can fire the completion event exactly once.
    pub fn mark_completed(&mut self) -> bool {
        let fired = self.status == PlanStatus::Active;
        if fired {
            self.status = PlanStatus::Completed;
        }
        fired
    }

    /// Manually pause an active plan. Pausing a paused plan is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::AlreadyCompleted` for completed plans.
    pub fn pause(&mut self) -> Result<(), PlanError> {
        match self.status {
            PlanStatus::Completed => Err(PlanError::AlreadyCompleted),
            PlanStatus::Active | PlanStatus::Paused => {
                self.status = PlanStatus::Paused;
                Ok(())
            }
        }
    }

    /// Resume a paused plan. Resuming an active plan is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::AlreadyCompleted` for completed plans.
    pub fn resume(&mut self) -> Result<(), PlanError> {
        match self.status {
            PlanStatus::Completed => Err(PlanError::AlreadyCompleted),
            PlanStatus::Active | PlanStatus::Paused => {
                self.status = PlanStatus::Active;
                Ok(())
            }
        }
    }

    pub(crate) fn add_progress(&mut self, pages: u32, minutes: u32) -> Result<(), PlanError> {
        let current_page = self
            .current_page
            .checked_add(pages)
            .ok_or(PlanError::PagesOverflow)?;
        let minutes_spent = self
            .minutes_spent
            .checked_add(minutes)
            .ok_or(PlanError::MinutesOverflow)?;
        self.current_page = current_page;
        self.minutes_spent = minutes_spent;
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> PlanId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn goal_mode(&self) -> GoalMode {
        self.goal_mode
    }

    #[must_use]
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    #[must_use]
    pub fn daily_goal(&self) -> u32 {
        self.daily_goal
    }

    /// Page count snapshotted from the book at creation. Zero means unknown.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    #[must_use]
    pub fn minutes_spent(&self) -> u32 {
        self.minutes_spent
    }

    #[must_use]
    pub fn status(&self) -> PlanStatus {
        self.status
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn plan(status: PlanStatus) -> ReadingPlan {
        ReadingPlan::from_persisted(
            PlanId::new(1),
            UserId::random(),
            BookId::new(1),
            "Dune",
            GoalMode::PagesPerDay,
            day(1),
            day(10),
            25,
            250,
            0,
            0,
            status,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn blank_title_is_rejected() {
        let goal = ResolvedGoal {
            daily_goal: 10,
            end_date: day(5),
        };
        let err = ReadingPlan::new(
            PlanId::new(1),
            UserId::random(),
            BookId::new(1),
            "  ",
            GoalMode::PagesPerDay,
            day(1),
            goal,
            50,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, PlanError::EmptyTitle);
        assert_eq!(err.field(), Field::Title);
    }

    #[test]
    fn inverted_dates_are_rejected() {
        let err = ReadingPlan::from_persisted(
            PlanId::new(1),
            UserId::random(),
            BookId::new(1),
            "Dune",
            GoalMode::FinishByDate,
            day(10),
            day(1),
            5,
            100,
            0,
            0,
            PlanStatus::Active,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidDateRange { .. }));
    }

    #[test]
    fn mark_completed_fires_once() {
        let mut plan = plan(PlanStatus::Active);
        assert!(plan.mark_completed());
        assert!(!plan.mark_completed());
        assert_eq!(plan.status(), PlanStatus::Completed);
    }

    #[test]
    fn paused_plan_does_not_fire_completion() {
        let mut plan = plan(PlanStatus::Paused);
        assert!(!plan.mark_completed());
        assert_eq!(plan.status(), PlanStatus::Paused);
    }

    #[test]
    fn completed_plan_cannot_be_paused_or_resumed() {
        let mut plan = plan(PlanStatus::Completed);
        assert_eq!(plan.pause(), Err(PlanError::AlreadyCompleted));
        assert_eq!(plan.resume(), Err(PlanError::AlreadyCompleted));
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let mut plan = plan(PlanStatus::Active);
        plan.pause().unwrap();
        assert_eq!(plan.status(), PlanStatus::Paused);
        plan.resume().unwrap();
        assert_eq!(plan.status(), PlanStatus::Active);
    }
}
