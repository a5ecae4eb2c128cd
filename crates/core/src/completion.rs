use serde::{Deserialize, Serialize};

use crate::model::ReadingPlan;

/// Whether a plan's accumulated pages have reached its total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub is_complete: bool,
}

/// Evaluate completion for an (already progressed) plan.
///
/// A plan with an unknown length (`total_pages == 0`) is never complete.
/// This is level-triggered; firing the one-time event is the caller's job,
/// based on the status the plan had before the session was applied.
#[must_use]
pub fn evaluate(plan: &ReadingPlan) -> Completion {
    Completion {
        is_complete: plan.total_pages() > 0 && plan.current_page() >= plan.total_pages(),
    }
}
