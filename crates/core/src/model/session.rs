use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Field;
use crate::model::ids::{BookId, PlanId, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("pages read must be > 0, got {provided}")]
    NonPositivePages { provided: i64 },

    #[error("pages read is too large: {provided}")]
    PagesOutOfRange { provided: i64 },

    #[error("minutes spent must be >= 0, got {provided}")]
    NegativeMinutes { provided: i64 },

    #[error("minutes spent is too large: {provided}")]
    MinutesOutOfRange { provided: i64 },
}

impl SessionError {
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            SessionError::NonPositivePages { .. } | SessionError::PagesOutOfRange { .. } => {
                Field::PagesRead
            }
            SessionError::NegativeMinutes { .. } | SessionError::MinutesOutOfRange { .. } => {
                Field::MinutesSpent
            }
        }
    }
}

/// Validated, not-yet-persisted reading event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDraft {
    pub book_id: BookId,
    pub plan_id: Option<PlanId>,
    pub pages_read: u32,
    pub minutes_spent: u32,
    pub notes: Option<String>,
}

impl SessionDraft {
    /// Validate raw user input for a reading session.
    ///
    /// Missing minutes default to 0. Blank notes are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if pages are not positive or minutes are negative.
    pub fn new(
        book_id: BookId,
        plan_id: Option<PlanId>,
        pages_read: i64,
        minutes_spent: Option<i64>,
        notes: Option<String>,
    ) -> Result<Self, SessionError> {
        if pages_read <= 0 {
            return Err(SessionError::NonPositivePages {
                provided: pages_read,
            });
        }
        let pages_read = u32::try_from(pages_read).map_err(|_| SessionError::PagesOutOfRange {
            provided: pages_read,
        })?;

        let minutes = minutes_spent.unwrap_or(0);
        if minutes < 0 {
            return Err(SessionError::NegativeMinutes { provided: minutes });
        }
        let minutes_spent = u32::try_from(minutes)
            .map_err(|_| SessionError::MinutesOutOfRange { provided: minutes })?;

        let notes = notes
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());

        Ok(Self {
            book_id,
            plan_id,
            pages_read,
            minutes_spent,
            notes,
        })
    }
}

/// One logged reading event. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingSession {
    pub id: SessionId,
    pub book_id: BookId,
    pub plan_id: Option<PlanId>,
    pub pages_read: u32,
    pub minutes_spent: u32,
    pub notes: Option<String>,
    pub koach_earned: u32,
    pub created_at: DateTime<Utc>,
}

impl ReadingSession {
    #[must_use]
    pub fn from_draft(
        id: SessionId,
        draft: SessionDraft,
        koach_earned: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            book_id: draft.book_id,
            plan_id: draft.plan_id,
            pages_read: draft.pages_read,
            minutes_spent: draft.minutes_spent,
            notes: draft.notes,
            koach_earned,
            created_at,
        }
    }
}
