//! Error type for the plan services.

use thiserror::Error;

use koach_core::Field;
use koach_core::goal::GoalError;
use koach_core::model::{PlanError, PlanId, SessionError};
use storage::repository::StorageError;

/// Errors emitted by `PlanService`.
///
/// Callers can tell "fix your input" (`ValidationFailed`) from "try again
/// later" (`StorageFailure`) from "this plan is gone" (`NotFound`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanServiceError {
    #[error("invalid {field}: {reason}")]
    ValidationFailed { field: Field, reason: String },
    #[error("storage failure: {0}")]
    StorageFailure(#[from] StorageError),
    #[error("plan {0} not found")]
    NotFound(PlanId),
}

impl PlanServiceError {
    /// Map a storage error from a call that targeted `plan_id`.
    pub(crate) fn for_plan(plan_id: PlanId, err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound(plan_id),
            StorageError::Overflow(counter) => Self::ValidationFailed {
                field: if counter == "minutes_spent" {
                    Field::MinutesSpent
                } else {
                    Field::PagesRead
                },
                reason: err.to_string(),
            },
            other => Self::StorageFailure(other),
        }
    }
}

impl From<koach_core::Error> for PlanServiceError {
    fn from(err: koach_core::Error) -> Self {
        Self::ValidationFailed {
            field: err.field(),
            reason: err.to_string(),
        }
    }
}

impl From<GoalError> for PlanServiceError {
    fn from(err: GoalError) -> Self {
        koach_core::Error::from(err).into()
    }
}

impl From<PlanError> for PlanServiceError {
    fn from(err: PlanError) -> Self {
        koach_core::Error::from(err).into()
    }
}

impl From<SessionError> for PlanServiceError {
    fn from(err: SessionError) -> Self {
        koach_core::Error::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_keep_their_field() {
        let err: PlanServiceError = SessionError::NonPositivePages { provided: -5 }.into();
        assert!(matches!(
            err,
            PlanServiceError::ValidationFailed {
                field: Field::PagesRead,
                ..
            }
        ));
        assert_eq!(err.to_string(), "invalid pages_read: pages read must be > 0, got -5");
    }

    #[test]
    fn missing_rows_become_not_found() {
        let err = PlanServiceError::for_plan(PlanId::new(3), StorageError::NotFound);
        assert!(matches!(err, PlanServiceError::NotFound(id) if id == PlanId::new(3)));

        let err = PlanServiceError::for_plan(PlanId::new(3), StorageError::Conflict);
        assert!(matches!(err, PlanServiceError::StorageFailure(_)));
    }

    #[test]
    fn counter_overflow_is_a_validation_error() {
        let err = PlanServiceError::for_plan(PlanId::new(3), StorageError::Overflow("current_page"));
        assert!(matches!(
            err,
            PlanServiceError::ValidationFailed {
                field: Field::PagesRead,
                ..
            }
        ));

        let err =
            PlanServiceError::for_plan(PlanId::new(3), StorageError::Overflow("minutes_spent"));
        assert!(matches!(
            err,
            PlanServiceError::ValidationFailed {
                field: Field::MinutesSpent,
                ..
            }
        ));
    }
}
