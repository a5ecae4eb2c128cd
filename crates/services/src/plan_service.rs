use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use koach_core::estimate::{self, PlanEstimate};
use koach_core::goal::{self, GoalInput};
use koach_core::model::{
    BookId, PlanId, ReadingPlan, ReadingSession, SessionDraft, UserId,
};
use koach_core::progress::{self, ProgressTotals};
use koach_core::reward;
use storage::repository::{
    BookRepository, NewPlanRecord, NewSessionRecord, PlanPatch, PlanProgress, PlanRepository,
    RecordedSession, SessionPersistence, SessionRepository, Storage,
};

use crate::Clock;
use crate::error::PlanServiceError;
use crate::plan_locks::PlanLocks;

//
// ─── REQUESTS & RESULTS ────────────────────────────────────────────────────────
//

/// Input for `PlanService::create_plan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePlan {
    pub user_id: UserId,
    pub book_id: BookId,
    /// Overrides the catalogue page count. `None` reads it from the book.
    pub total_pages: Option<u32>,
    /// Defaults to today.
    pub start_date: Option<NaiveDate>,
    pub goal: GoalInput,
    /// Defaults to the book title.
    pub title: Option<String>,
}

/// Input for `PlanService::log_session`, as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSession {
    pub book_id: BookId,
    pub plan_id: Option<PlanId>,
    pub pages_read: i64,
    pub minutes_spent: Option<i64>,
    pub notes: Option<String>,
}

/// Outcome of logging a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionLogged {
    pub session: ReadingSession,
    /// The plan as persisted after this session, when one was attached.
    pub plan: Option<ReadingPlan>,
    pub koach_earned: u32,
    /// Set only on the call that moved the plan from active to completed.
    pub book_just_completed: bool,
}

/// A plan with its derived progress figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOverview {
    pub plan: ReadingPlan,
    pub estimate: PlanEstimate,
    pub totals: ProgressTotals,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Creates reading plans and applies logged sessions to them.
///
/// Owns per-plan serialization: two sessions for the same plan are applied one
/// after the other, each against freshly loaded state.
pub struct PlanService {
    clock: Clock,
    plans: Arc<dyn PlanRepository>,
    sessions: Arc<dyn SessionRepository>,
    progress: Arc<dyn SessionPersistence>,
    books: Arc<dyn BookRepository>,
    locks: PlanLocks,
}

impl PlanService {
    #[must_use]
    pub fn new(
        clock: Clock,
        plans: Arc<dyn PlanRepository>,
        sessions: Arc<dyn SessionRepository>,
        progress: Arc<dyn SessionPersistence>,
        books: Arc<dyn BookRepository>,
    ) -> Self {
        Self {
            clock,
            plans,
            sessions,
            progress,
            books,
            locks: PlanLocks::default(),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.plans),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.books),
        )
    }

    /// Resolve the goal and persist a new active plan.
    ///
    /// `total_pages` and `title` fall back to the catalogue book. An unknown
    /// book with no explicit page count gets an unknown length (0).
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::ValidationFailed` for a blank title or an
    /// unusable goal; nothing is stored in that case.
    /// Returns `PlanServiceError::StorageFailure` if persistence fails.
    pub async fn create_plan(&self, request: CreatePlan) -> Result<ReadingPlan, PlanServiceError> {
        let book = match (&request.total_pages, &request.title) {
            (Some(_), Some(_)) => None,
            _ => self.books.get_book(request.book_id).await?,
        };

        let total_pages = request
            .total_pages
            .or_else(|| book.as_ref().map(|b| b.total_pages()))
            .unwrap_or(0);
        let title = request
            .title
            .or_else(|| book.as_ref().map(|b| b.title().to_owned()))
            .unwrap_or_default();
        let start_date = request.start_date.unwrap_or_else(|| self.clock.today());

        let resolved = goal::resolve(total_pages, start_date, request.goal)?;
        let draft = ReadingPlan::new(
            PlanId::new(0),
            request.user_id,
            request.book_id,
            title,
            request.goal.mode(),
            start_date,
            resolved,
            total_pages,
            self.clock.now(),
        )?;

        let plan = self
            .plans
            .insert_new_plan(NewPlanRecord::from_plan(&draft))
            .await?;

        info!(
            plan_id = %plan.id(),
            book_id = %plan.book_id(),
            mode = plan.goal_mode().as_str(),
            daily_goal = plan.daily_goal(),
            end_date = %plan.end_date(),
            "created reading plan"
        );
        Ok(plan)
    }

    /// Record a reading session, award points, and advance the attached plan.
    ///
    /// Progress is staged on a freshly loaded copy of the plan and only
    /// confirmed once the session and plan update are stored together. On a
    /// storage failure the staged copy is discarded and nothing is written.
    /// Whether the book was just completed is decided by storage against the
    /// stored counters, not the staged copy.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::ValidationFailed` for non-positive pages,
    /// negative minutes, or counters that would overflow. Nothing is written.
    /// Returns `PlanServiceError::NotFound` if `plan_id` does not exist.
    /// Returns `PlanServiceError::StorageFailure` if persistence fails.
    pub async fn log_session(&self, request: LogSession) -> Result<SessionLogged, PlanServiceError> {
        let draft = SessionDraft::new(
            request.book_id,
            request.plan_id,
            request.pages_read,
            request.minutes_spent,
            request.notes,
        )?;
        let koach_earned = reward::koach_for(draft.pages_read);
        let record = NewSessionRecord::new(draft, koach_earned, self.clock.now());

        let Some(plan_id) = request.plan_id else {
            let session = self.sessions.append_session(record).await?;
            debug!(session_id = %session.id, pages = session.pages_read, "logged free reading");
            return Ok(SessionLogged {
                session,
                plan: None,
                koach_earned,
                book_just_completed: false,
            });
        };

        let _guard = self.locks.acquire(plan_id).await;

        let current = self
            .plans
            .get_plan(plan_id)
            .await
            .map_err(|e| PlanServiceError::for_plan(plan_id, e))?
            .ok_or(PlanServiceError::NotFound(plan_id))?;

        // Rejects counters that would overflow before anything is written.
        let staged = progress::apply(&current, &record.draft)?;

        let delta = PlanProgress {
            plan_id,
            pages: record.draft.pages_read,
            minutes: record.draft.minutes_spent,
        };

        // Storage decides completion against the stored counters, so pages
        // committed by another writer since `current` was read still count.
        let recorded = match self.progress.record_plan_session(record, delta).await {
            Ok(recorded) => recorded,
            Err(err) => {
                warn!(
                    plan_id = %plan_id,
                    staged_page = staged.current_page(),
                    error = %err,
                    "discarding staged plan progress"
                );
                return Err(PlanServiceError::for_plan(plan_id, err));
            }
        };
        let RecordedSession {
            session,
            plan,
            just_completed: book_just_completed,
        } = recorded;

        if book_just_completed {
            info!(plan_id = %plan_id, pages = plan.current_page(), "reading plan completed");
        }
        debug!(
            plan_id = %plan_id,
            session_id = %session.id,
            current_page = plan.current_page(),
            koach = koach_earned,
            "logged plan session"
        );

        Ok(SessionLogged {
            session,
            plan: Some(plan),
            koach_earned,
            book_just_completed,
        })
    }

    /// Load a plan with progress, totals and a fresh estimate for today.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::NotFound` if the plan is missing.
    /// Returns `PlanServiceError::StorageFailure` if repository access fails.
    pub async fn get_plan(&self, plan_id: PlanId) -> Result<PlanOverview, PlanServiceError> {
        let plan = self.load_plan(plan_id).await?;
        let sessions = self
            .sessions
            .sessions_for_plan(plan_id)
            .await
            .map_err(|e| PlanServiceError::for_plan(plan_id, e))?;

        Ok(PlanOverview {
            estimate: estimate::estimate(&plan, self.clock.today()),
            totals: progress::totals(&sessions),
            plan,
        })
    }

    /// List a user's plans ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::StorageFailure` if repository access fails.
    pub async fn list_plans(&self, user_id: UserId) -> Result<Vec<ReadingPlan>, PlanServiceError> {
        Ok(self.plans.list_plans(user_id).await?)
    }

    /// Sessions logged against a plan, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::NotFound` if the plan is missing.
    /// Returns `PlanServiceError::StorageFailure` if repository access fails.
    pub async fn plan_sessions(
        &self,
        plan_id: PlanId,
    ) -> Result<Vec<ReadingSession>, PlanServiceError> {
        self.load_plan(plan_id).await?;
        self.sessions
            .sessions_for_plan(plan_id)
            .await
            .map_err(|e| PlanServiceError::for_plan(plan_id, e))
    }

    /// Manually pause an active plan.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::ValidationFailed` (field `status`) for a
    /// completed plan, `NotFound` if it is missing, or `StorageFailure`.
    pub async fn pause_plan(&self, plan_id: PlanId) -> Result<ReadingPlan, PlanServiceError> {
        self.set_status(plan_id, ReadingPlan::pause).await
    }

    /// Resume a paused plan.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::ValidationFailed` (field `status`) for a
    /// completed plan, `NotFound` if it is missing, or `StorageFailure`.
    pub async fn resume_plan(&self, plan_id: PlanId) -> Result<ReadingPlan, PlanServiceError> {
        self.set_status(plan_id, ReadingPlan::resume).await
    }

    async fn set_status(
        &self,
        plan_id: PlanId,
        transition: fn(&mut ReadingPlan) -> Result<(), koach_core::model::PlanError>,
    ) -> Result<ReadingPlan, PlanServiceError> {
        let _guard = self.locks.acquire(plan_id).await;

        let mut plan = self.load_plan(plan_id).await?;
        let before = plan.status();
        transition(&mut plan)?;
        if plan.status() == before {
            return Ok(plan);
        }

        let patch = PlanPatch {
            status: Some(plan.status()),
            ..PlanPatch::default()
        };
        let updated = self
            .plans
            .update_plan(plan_id, patch)
            .await
            .map_err(|e| PlanServiceError::for_plan(plan_id, e))?;

        info!(plan_id = %plan_id, status = updated.status().as_str(), "plan status changed");
        Ok(updated)
    }

    async fn load_plan(&self, plan_id: PlanId) -> Result<ReadingPlan, PlanServiceError> {
        self.plans
            .get_plan(plan_id)
            .await
            .map_err(|e| PlanServiceError::for_plan(plan_id, e))?
            .ok_or(PlanServiceError::NotFound(plan_id))
    }
}
