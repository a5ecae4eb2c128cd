use serde::{Deserialize, Serialize};

use crate::model::{PlanError, ReadingPlan, ReadingSession, SessionDraft};

/// Running totals over a set of sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTotals {
    pub sessions: u32,
    pub pages: u32,
    pub minutes: u32,
    pub koach: u32,
}

/// Apply one session to a plan and return the staged result.
///
/// Pages are added as-is; reading past `total_pages` stays visible so the
/// completion check can see it.
///
/// # Errors
///
/// Returns `PlanError::PagesOverflow` or `PlanError::MinutesOverflow` if a
/// counter would exceed `u32::MAX`. The input plan is never modified.
pub fn apply(plan: &ReadingPlan, session: &SessionDraft) -> Result<ReadingPlan, PlanError> {
    let mut updated = plan.clone();
    updated.add_progress(session.pages_read, session.minutes_spent)?;
    Ok(updated)
}

/// Display percentage in `0..=100`, rounded half up. Unknown length reads as 0%.
#[must_use]
pub fn percent(plan: &ReadingPlan) -> u8 {
    percent_of(plan.current_page(), plan.total_pages())
}

#[must_use]
pub fn percent_of(current_page: u32, total_pages: u32) -> u8 {
    if total_pages == 0 {
        return 0;
    }
    let current = u64::from(current_page);
    let total = u64::from(total_pages);
    let rounded = (current * 200 + total) / (total * 2);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

/// Fold stored sessions into totals.
#[must_use]
pub fn totals<'a>(sessions: impl IntoIterator<Item = &'a ReadingSession>) -> ProgressTotals {
    sessions
        .into_iter()
        .fold(ProgressTotals::default(), |acc, s| ProgressTotals {
            sessions: acc.sessions.saturating_add(1),
            pages: acc.pages.saturating_add(s.pages_read),
            minutes: acc.minutes.saturating_add(s.minutes_spent),
            koach: acc.koach.saturating_add(s.koach_earned),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookId, GoalMode, PlanId, PlanStatus, SessionId, UserId};
    use crate::time::fixed_now;
    use chrono::NaiveDate;

    fn plan(total: u32, current: u32) -> ReadingPlan {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ReadingPlan::from_persisted(
            PlanId::new(1),
            UserId::random(),
            BookId::new(1),
            "Plan",
            GoalMode::PagesPerDay,
            start,
            start,
            10,
            total,
            current,
            0,
            PlanStatus::Active,
            fixed_now(),
        )
        .unwrap()
    }

    fn draft(pages: i64, minutes: i64) -> SessionDraft {
        SessionDraft::new(BookId::new(1), Some(PlanId::new(1)), pages, Some(minutes), None)
            .unwrap()
    }

    #[test]
    fn apply_adds_pages_and_minutes_without_capping() {
        let before = plan(100, 90);
        let after = apply(&before, &draft(15, 20)).unwrap();
        assert_eq!(after.current_page(), 105);
        assert_eq!(after.minutes_spent(), 20);
        assert_eq!(before.current_page(), 90, "input plan is untouched");
    }

    #[test]
    fn apply_rejects_counter_overflow() {
        let before = plan(100, u32::MAX - 5);
        let err = apply(&before, &draft(10, 0)).unwrap_err();
        assert_eq!(err, PlanError::PagesOverflow);
        assert_eq!(err.field(), crate::Field::PagesRead);
        assert_eq!(before.current_page(), u32::MAX - 5);

        assert_eq!(
            apply(&before, &draft(5, 0)).unwrap().current_page(),
            u32::MAX
        );
    }

    #[test]
    fn percent_rounds_and_caps() {
        assert_eq!(percent_of(0, 250), 0);
        assert_eq!(percent_of(1, 200), 1); // 0.5% rounds up
        assert_eq!(percent_of(1, 201), 0);
        assert_eq!(percent_of(125, 250), 50);
        assert_eq!(percent_of(105, 100), 100);
    }

    #[test]
    fn percent_of_unknown_length_is_zero() {
        assert_eq!(percent(&plan(0, 40)), 0);
    }

    #[test]
    fn progress_never_decreases() {
        let mut current = plan(300, 0);
        let mut last_percent = 0;
        for pages in [1, 5, 40, 2, 100, 200] {
            let next = apply(&current, &draft(pages, 0)).unwrap();
            assert!(next.current_page() > current.current_page());
            assert!(percent(&next) >= last_percent);
            last_percent = percent(&next);
            current = next;
        }
        assert_eq!(last_percent, 100);
    }

    #[test]
    fn totals_fold_sessions() {
        let sessions: Vec<ReadingSession> = [(10, 5), (20, 15)]
            .into_iter()
            .enumerate()
            .map(|(i, (pages, minutes))| {
                ReadingSession::from_draft(
                    SessionId::new(i as u64 + 1),
                    draft(pages, minutes),
                    u32::try_from(pages).unwrap(),
                    fixed_now(),
                )
            })
            .collect();

        let totals = totals(&sessions);
        assert_eq!(totals.sessions, 2);
        assert_eq!(totals.pages, 30);
        assert_eq!(totals.minutes, 20);
        assert_eq!(totals.koach, 30);
    }
}
