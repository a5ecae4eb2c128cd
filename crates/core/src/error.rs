use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::goal::GoalError;
use crate::model::{PlanError, SessionError};

/// User-facing input field a validation error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    PagesPerDay,
    EndDate,
    PagesRead,
    MinutesSpent,
    Status,
}

impl Field {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::PagesPerDay => "pages_per_day",
            Field::EndDate => "end_date",
            Field::PagesRead => "pages_read",
            Field::MinutesSpent => "minutes_spent",
            Field::Status => "status",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any domain validation failure raised by the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Goal(#[from] GoalError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl Error {
    /// The input field responsible for this error.
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            Error::Goal(e) => e.field(),
            Error::Plan(e) => e.field(),
            Error::Session(e) => e.field(),
        }
    }
}
