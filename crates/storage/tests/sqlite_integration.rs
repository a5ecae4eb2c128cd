use chrono::NaiveDate;
use koach_core::model::{
    Book, BookId, GoalMode, PlanId, PlanStatus, SessionDraft, UserId,
};
use koach_core::time::fixed_now;
use storage::repository::{
    BookRepository, NewPlanRecord, NewSessionRecord, PlanPatch, PlanProgress, PlanRepository,
    SessionPersistence, SessionRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn new_plan(user_id: UserId, total_pages: u32) -> NewPlanRecord {
    NewPlanRecord {
        user_id,
        book_id: BookId::new(1),
        title: "The Name of the Rose".into(),
        goal_mode: GoalMode::PagesPerDay,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        daily_goal: 25,
        total_pages,
        created_at: fixed_now(),
    }
}

fn session(plan_id: Option<PlanId>, pages: i64, minutes: i64) -> NewSessionRecord {
    let draft = SessionDraft::new(
        BookId::new(1),
        plan_id,
        pages,
        Some(minutes),
        Some("chapter one".into()),
    )
    .unwrap();
    NewSessionRecord::new(draft, u32::try_from(pages).unwrap(), fixed_now())
}

fn progress(plan_id: PlanId, pages: u32, minutes: u32) -> PlanProgress {
    PlanProgress {
        plan_id,
        pages,
        minutes,
    }
}

#[tokio::test]
async fn sqlite_plan_round_trip() {
    let repo = connect("memdb_plan_round_trip").await;
    let user = UserId::random();

    let stored = repo.insert_new_plan(new_plan(user, 250)).await.unwrap();
    assert_eq!(stored.status(), PlanStatus::Active);
    assert_eq!(stored.current_page(), 0);

    let fetched = repo.get_plan(stored.id()).await.unwrap().expect("plan");
    assert_eq!(fetched, stored);
    assert_eq!(fetched.start_date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(fetched.user_id(), user);

    let listed = repo.list_plans(user).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(repo.get_plan(PlanId::new(999)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_records_session_and_progress_together() {
    let repo = connect("memdb_record_session").await;
    let plan = repo
        .insert_new_plan(new_plan(UserId::random(), 100))
        .await
        .unwrap();

    let first = repo
        .record_plan_session(session(Some(plan.id()), 90, 60), progress(plan.id(), 90, 60))
        .await
        .unwrap();
    assert_eq!(first.plan.current_page(), 90);
    assert_eq!(first.plan.status(), PlanStatus::Active);
    assert!(!first.just_completed);

    let second = repo
        .record_plan_session(session(Some(plan.id()), 15, 10), progress(plan.id(), 15, 10))
        .await
        .unwrap();
    assert_eq!(second.plan.current_page(), 105);
    assert_eq!(second.plan.minutes_spent(), 70);
    assert_eq!(second.plan.status(), PlanStatus::Completed);
    assert!(second.just_completed);
    assert_eq!(second.session.notes.as_deref(), Some("chapter one"));

    let third = repo
        .record_plan_session(session(Some(plan.id()), 5, 0), progress(plan.id(), 5, 0))
        .await
        .unwrap();
    assert_eq!(third.plan.current_page(), 110);
    assert!(!third.just_completed);

    let sessions = repo.sessions_for_plan(plan.id()).await.unwrap();
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[1], second.session);
}

#[tokio::test]
async fn sqlite_completion_counts_pages_committed_by_other_writers() {
    let repo = connect("memdb_other_writer").await;
    let plan = repo
        .insert_new_plan(new_plan(UserId::random(), 100))
        .await
        .unwrap();

    // Another process moves the counter without this caller seeing it.
    sqlx::query("UPDATE reading_plans SET current_page = 95 WHERE id = ?1")
        .bind(i64::try_from(plan.id().value()).unwrap())
        .execute(repo.pool())
        .await
        .unwrap();

    let recorded = repo
        .record_plan_session(session(Some(plan.id()), 5, 3), progress(plan.id(), 5, 3))
        .await
        .unwrap();
    assert_eq!(recorded.plan.current_page(), 100);
    assert_eq!(recorded.plan.status(), PlanStatus::Completed);
    assert!(recorded.just_completed);
}

#[tokio::test]
async fn sqlite_counter_overflow_writes_nothing() {
    let repo = connect("memdb_counter_overflow").await;
    let plan = repo
        .insert_new_plan(new_plan(UserId::random(), 0))
        .await
        .unwrap();
    let near_max = i64::from(u32::MAX) - 5;
    sqlx::query("UPDATE reading_plans SET current_page = ?1 WHERE id = ?2")
        .bind(near_max)
        .bind(i64::try_from(plan.id().value()).unwrap())
        .execute(repo.pool())
        .await
        .unwrap();

    let err = repo
        .record_plan_session(session(Some(plan.id()), 10, 1), progress(plan.id(), 10, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Overflow("current_page")));

    let after = repo.get_plan(plan.id()).await.unwrap().unwrap();
    assert_eq!(i64::from(after.current_page()), near_max);
    assert_eq!(after.minutes_spent(), 0);
    assert!(repo.sessions_for_plan(plan.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_missing_plan_rolls_back_session() {
    let repo = connect("memdb_missing_plan").await;
    let missing = PlanId::new(77);

    let err = repo
        .record_plan_session(session(Some(missing), 5, 0), progress(missing, 5, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
    assert!(repo.sessions_for_plan(missing).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_paused_plan_accumulates_without_completing() {
    let repo = connect("memdb_status_patch").await;
    let plan = repo
        .insert_new_plan(new_plan(UserId::random(), 10))
        .await
        .unwrap();

    let paused = repo
        .update_plan(
            plan.id(),
            PlanPatch {
                status: Some(PlanStatus::Paused),
                ..PlanPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(paused.status(), PlanStatus::Paused);

    let recorded = repo
        .record_plan_session(session(Some(plan.id()), 10, 0), progress(plan.id(), 10, 0))
        .await
        .unwrap();
    assert_eq!(recorded.plan.status(), PlanStatus::Paused);
    assert_eq!(recorded.plan.current_page(), 10);
    assert!(!recorded.just_completed);

    repo.update_plan(
        plan.id(),
        PlanPatch {
            status: Some(PlanStatus::Active),
            ..PlanPatch::default()
        },
    )
    .await
    .unwrap();
    let resumed = repo
        .record_plan_session(session(Some(plan.id()), 1, 0), progress(plan.id(), 1, 0))
        .await
        .unwrap();
    assert_eq!(resumed.plan.status(), PlanStatus::Completed);
    assert!(resumed.just_completed);
}

#[tokio::test]
async fn sqlite_standalone_sessions_and_books() {
    let repo = connect("memdb_standalone").await;

    let stored = repo.append_session(session(None, 12, 20)).await.unwrap();
    assert_eq!(stored.plan_id, None);
    assert_eq!(stored.koach_earned, 12);

    let book = Book::new(BookId::new(9), "Moby-Dick", 635).unwrap();
    repo.upsert_book(&book).await.unwrap();
    assert_eq!(repo.get_book(book.id()).await.unwrap(), Some(book));

    let renamed = Book::new(BookId::new(9), "Moby Dick", 640).unwrap();
    repo.upsert_book(&renamed).await.unwrap();
    let fetched = repo.get_book(BookId::new(9)).await.unwrap().unwrap();
    assert_eq!(fetched.total_pages(), 640);
}
