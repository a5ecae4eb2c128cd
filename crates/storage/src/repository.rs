use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use koach_core::completion;
use koach_core::model::{
    Book, BookId, GoalMode, PlanId, PlanStatus, ReadingPlan, ReadingSession, SessionDraft,
    SessionId, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0} would overflow")]
    Overflow(&'static str),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert shape for a plan; storage assigns the id.
#[derive(Debug, Clone)]
pub struct NewPlanRecord {
    pub user_id: UserId,
    pub book_id: BookId,
    pub title: String,
    pub goal_mode: GoalMode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_goal: u32,
    pub total_pages: u32,
    pub created_at: DateTime<Utc>,
}

impl NewPlanRecord {
    #[must_use]
    pub fn from_plan(plan: &ReadingPlan) -> Self {
        Self {
            user_id: plan.user_id(),
            book_id: plan.book_id(),
            title: plan.title().to_owned(),
            goal_mode: plan.goal_mode(),
            start_date: plan.start_date(),
            end_date: plan.end_date(),
            daily_goal: plan.daily_goal(),
            total_pages: plan.total_pages(),
            created_at: plan.created_at(),
        }
    }
}

/// Insert shape for a session; storage assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionRecord {
    pub draft: SessionDraft,
    pub koach_earned: u32,
    pub created_at: DateTime<Utc>,
}

impl NewSessionRecord {
    #[must_use]
    pub fn new(draft: SessionDraft, koach_earned: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            draft,
            koach_earned,
            created_at,
        }
    }

    /// Materialize the stored session under its assigned id.
    #[must_use]
    pub fn into_session(self, id: SessionId) -> ReadingSession {
        ReadingSession::from_draft(id, self.draft, self.koach_earned, self.created_at)
    }
}

/// Partial update of user-editable plan fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanPatch {
    pub title: Option<String>,
    pub status: Option<PlanStatus>,
}

/// Additive progress written together with a session.
///
/// Adapters add `pages`/`minutes` to the stored counters rather than
/// overwriting them. Completion is decided against the stored counters in the
/// same write: an `active` plan whose known length is reached becomes
/// `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanProgress {
    pub plan_id: PlanId,
    pub pages: u32,
    pub minutes: u32,
}

/// Result of `SessionPersistence::record_plan_session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSession {
    pub session: ReadingSession,
    /// The plan as persisted after the update.
    pub plan: ReadingPlan,
    /// This write moved the plan from `active` to `completed`.
    pub just_completed: bool,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for reading plans.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Insert a new plan and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the plan cannot be stored.
    async fn insert_new_plan(&self, plan: NewPlanRecord) -> Result<ReadingPlan, StorageError>;

    /// Fetch a plan by ID. Returns `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_plan(&self, id: PlanId) -> Result<Option<ReadingPlan>, StorageError>;

    /// Apply a patch and return the updated plan.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the plan is missing, or other storage errors.
    async fn update_plan(&self, id: PlanId, patch: PlanPatch) -> Result<ReadingPlan, StorageError>;

    /// List a user's plans ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_plans(&self, user_id: UserId) -> Result<Vec<ReadingPlan>, StorageError>;
}

/// Append-only session log.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Append a session that does not touch any plan.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session references a plan; use
    /// `SessionPersistence` for those.
    async fn append_session(&self, session: NewSessionRecord)
    -> Result<ReadingSession, StorageError>;

    /// Sessions logged against a plan, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn sessions_for_plan(&self, plan_id: PlanId)
    -> Result<Vec<ReadingSession>, StorageError>;
}

/// Atomic write of a plan-attached session and its progress.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    /// Store the session and apply `progress` to its plan in one unit.
    ///
    /// Either both writes land or neither does. Completion is evaluated on
    /// the stored counters inside the same unit, so pages added by other
    /// writers count toward it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session and progress name
    /// different plans, `StorageError::NotFound` if the plan is missing,
    /// `StorageError::Overflow` if a counter would exceed `u32::MAX`, or
    /// other storage errors.
    async fn record_plan_session(
        &self,
        session: NewSessionRecord,
        progress: PlanProgress,
    ) -> Result<RecordedSession, StorageError>;
}

/// Catalogue lookups used when creating plans.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Insert or replace a book.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the book cannot be stored.
    async fn upsert_book(&self, book: &Book) -> Result<(), StorageError>;

    /// Fetch a book by ID. Returns `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_book(&self, id: BookId) -> Result<Option<Book>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    books: HashMap<BookId, Book>,
    plans: BTreeMap<PlanId, ReadingPlan>,
    sessions: Vec<ReadingSession>,
    next_plan_id: u64,
    next_session_id: u64,
}

impl MemoryState {
    fn next_session_id(&mut self) -> SessionId {
        self.next_session_id += 1;
        SessionId::new(self.next_session_id)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All collections sit behind one lock so a plan update and its session are
/// always observed together.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn rebuild_plan(
    plan: &ReadingPlan,
    title: String,
    current_page: u32,
    minutes_spent: u32,
    status: PlanStatus,
) -> Result<ReadingPlan, StorageError> {
    ReadingPlan::from_persisted(
        plan.id(),
        plan.user_id(),
        plan.book_id(),
        title,
        plan.goal_mode(),
        plan.start_date(),
        plan.end_date(),
        plan.daily_goal(),
        plan.total_pages(),
        current_page,
        minutes_spent,
        status,
        plan.created_at(),
    )
    .map_err(|e| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl PlanRepository for InMemoryRepository {
    async fn insert_new_plan(&self, plan: NewPlanRecord) -> Result<ReadingPlan, StorageError> {
        let mut guard = self.lock()?;
        let id = PlanId::new(guard.next_plan_id + 1);
        let stored = ReadingPlan::from_persisted(
            id,
            plan.user_id,
            plan.book_id,
            plan.title,
            plan.goal_mode,
            plan.start_date,
            plan.end_date,
            plan.daily_goal,
            plan.total_pages,
            0,
            0,
            PlanStatus::Active,
            plan.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.next_plan_id += 1;
        guard.plans.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<ReadingPlan>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.plans.get(&id).cloned())
    }

    async fn update_plan(&self, id: PlanId, patch: PlanPatch) -> Result<ReadingPlan, StorageError> {
        let mut guard = self.lock()?;
        let current = guard.plans.get(&id).ok_or(StorageError::NotFound)?;
        let updated = rebuild_plan(
            current,
            patch.title.unwrap_or_else(|| current.title().to_owned()),
            current.current_page(),
            current.minutes_spent(),
            patch.status.unwrap_or(current.status()),
        )?;
        guard.plans.insert(id, updated.clone());
        Ok(updated)
    }

    async fn list_plans(&self, user_id: UserId) -> Result<Vec<ReadingPlan>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .plans
            .values()
            .filter(|p| p.user_id() == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn append_session(
        &self,
        session: NewSessionRecord,
    ) -> Result<ReadingSession, StorageError> {
        if session.draft.plan_id.is_some() {
            return Err(StorageError::Conflict);
        }
        let mut guard = self.lock()?;
        let id = guard.next_session_id();
        let stored = session.into_session(id);
        guard.sessions.push(stored.clone());
        Ok(stored)
    }

    async fn sessions_for_plan(
        &self,
        plan_id: PlanId,
    ) -> Result<Vec<ReadingSession>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .sessions
            .iter()
            .filter(|s| s.plan_id == Some(plan_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionPersistence for InMemoryRepository {
    async fn record_plan_session(
        &self,
        session: NewSessionRecord,
        progress: PlanProgress,
    ) -> Result<RecordedSession, StorageError> {
        if session.draft.plan_id != Some(progress.plan_id) {
            return Err(StorageError::Conflict);
        }

        let mut guard = self.lock()?;
        let current = guard
            .plans
            .get(&progress.plan_id)
            .ok_or(StorageError::NotFound)?;
        let current_page = current
            .current_page()
            .checked_add(progress.pages)
            .ok_or(StorageError::Overflow("current_page"))?;
        let minutes_spent = current
            .minutes_spent()
            .checked_add(progress.minutes)
            .ok_or(StorageError::Overflow("minutes_spent"))?;
        let mut updated = rebuild_plan(
            current,
            current.title().to_owned(),
            current_page,
            minutes_spent,
            current.status(),
        )?;
        let just_completed =
            completion::evaluate(&updated).is_complete && updated.mark_completed();

        let id = guard.next_session_id();
        let stored = session.into_session(id);
        guard.sessions.push(stored.clone());
        guard.plans.insert(progress.plan_id, updated.clone());
        Ok(RecordedSession {
            session: stored,
            plan: updated,
            just_completed,
        })
    }
}

#[async_trait]
impl BookRepository for InMemoryRepository {
    async fn upsert_book(&self, book: &Book) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.books.insert(book.id(), book.clone());
        Ok(())
    }

    async fn get_book(&self, id: BookId) -> Result<Option<Book>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.books.get(&id).cloned())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub plans: Arc<dyn PlanRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub progress: Arc<dyn SessionPersistence>,
    pub books: Arc<dyn BookRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one backend for every repository role.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: PlanRepository
            + SessionRepository
            + SessionPersistence
            + BookRepository
            + Clone
            + 'static,
    {
        Self {
            plans: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            books: Arc::new(repo),
        }
    }
}
