//! Re-estimation of a plan against the calendar.
//!
//! Recomputed on demand from the persisted plan, so it follows every new
//! session and the passing of days without being stored.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::completion;
use crate::model::ReadingPlan;
use crate::progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEstimate {
    pub progress_percent: u8,
    pub pages_remaining: u32,
    /// Reading days left, counting today and the end date.
    pub days_remaining: u32,
    /// Pace needed from today to finish on the end date.
    pub required_daily_pace: Option<u32>,
    /// Finish date if the plan's daily goal is kept from today.
    pub projected_end_date: Option<NaiveDate>,
    pub on_track: bool,
}

/// Estimate where `plan` stands on `today`.
///
/// Before the start date, counting begins at the start date. A plan with an
/// unknown length has nothing to project and is on track until its end date
/// has passed.
#[must_use]
pub fn estimate(plan: &ReadingPlan, today: NaiveDate) -> PlanEstimate {
    let from = today.max(plan.start_date());
    let days_remaining = if from > plan.end_date() {
        0
    } else {
        let span = plan.end_date().signed_duration_since(from).num_days() + 1;
        u32::try_from(span).unwrap_or(u32::MAX)
    };

    let pages_remaining = plan.total_pages().saturating_sub(plan.current_page());
    let complete = completion::evaluate(plan).is_complete;

    let required_daily_pace =
        (pages_remaining > 0 && days_remaining > 0).then(|| pages_remaining.div_ceil(days_remaining));

    let projected_end_date = if pages_remaining > 0 {
        let days = u64::from(pages_remaining.div_ceil(plan.daily_goal())) - 1;
        from.checked_add_days(Days::new(days))
    } else {
        None
    };

    let on_track = if complete {
        true
    } else if plan.total_pages() == 0 {
        days_remaining > 0
    } else {
        projected_end_date.is_some_and(|d| d <= plan.end_date())
    };

    PlanEstimate {
        progress_percent: progress::percent(plan),
        pages_remaining,
        days_remaining,
        required_daily_pace,
        projected_end_date,
        on_track,
    }
}
