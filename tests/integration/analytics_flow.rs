use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use tempfile::TempDir;

use habitgrid_analytics::db::repositories::habit_repository::HabitRepository;
use habitgrid_analytics::db::repositories::snapshot_repository::SnapshotRepository;
use habitgrid_analytics::db::DbPool;
use habitgrid_analytics::models::analytics::{RangeSelector, SnapshotEnvelope, SCHEMA_VERSION};
use habitgrid_analytics::models::goal::{CreateGoalRequest, Goal};
use habitgrid_analytics::services::analytics_service::{AnalyticsConfig, AnalyticsService};
use habitgrid_analytics::services::cache_service::InMemoryPayloadCache;
use habitgrid_analytics::services::store::SqliteHabitStore;

const USER: &str = "user-1";

struct Harness {
    _dir: TempDir,
    pub db: DbPool,
    pub store: SqliteHabitStore,
}

fn setup() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let _ = habitgrid_analytics::utils::logger::init_logging(&dir.path().join("logs"));
    let db = DbPool::new(dir.path().join("habits.db")).expect("db pool");
    let store = SqliteHabitStore::new(db.clone());
    Harness {
        _dir: dir,
        db,
        store,
    }
}

fn service(harness: &Harness) -> AnalyticsService {
    AnalyticsService::new(
        Arc::new(harness.store.clone()),
        Arc::new(harness.store.clone()),
        Arc::new(InMemoryPayloadCache::new()),
        AnalyticsConfig::default(),
    )
}

/// Monday of the week `weeks_back` weeks before the current one, so seeded
/// logs always land inside the trailing windows the service resolves.
fn monday(weeks_back: i64) -> NaiveDate {
    let today = Utc::now().date_naive();
    let this_monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    this_monday - Duration::days(7 * weeks_back)
}

fn seed_goal(harness: &Harness, name: &str) -> Goal {
    harness
        .db
        .with_connection(|conn| {
            HabitRepository::insert_goal(
                conn,
                &CreateGoalRequest {
                    user_id: USER.to_string(),
                    name: name.to_string(),
                    start_date: None,
                },
            )
        })
        .expect("insert goal")
}

fn seed_week(harness: &Harness, goal_id: &str, week_start: NaiveDate, states: [bool; 7]) {
    harness
        .db
        .with_connection(|conn| {
            HabitRepository::upsert_weekly_log(conn, USER, goal_id, week_start, 3, states)
        })
        .expect("upsert weekly log");
}

#[tokio::test(flavor = "multi_thread")]
async fn end_to_end_payload_from_sqlite() {
    let harness = setup();
    let goal = seed_goal(&harness, "Stretch");
    seed_week(
        &harness,
        &goal.id,
        monday(2),
        [true, false, true, false, false, false, false],
    );
    seed_week(
        &harness,
        &goal.id,
        monday(1),
        [true, true, true, false, false, false, false],
    );

    let service = service(&harness);
    let payload = service
        .get_analytics(USER, RangeSelector::default(), false)
        .await
        .expect("payload");

    assert_eq!(payload.lifetime_stats.total_completions, 5);
    assert_eq!(payload.lifetime_stats.goals_tracked, 1);
    assert_eq!(payload.daily_trend.len(), 30);
    assert_eq!(payload.streak_timeline.len(), 1);
    assert_eq!(payload.streak_timeline[0].goal_name, "Stretch");
    assert!(payload.target_vs_actual.iter().any(|p| p.target == 3));
    assert_eq!(payload.meta.range, "365d");
}

#[tokio::test(flavor = "multi_thread")]
async fn default_selector_persists_a_versioned_snapshot() {
    let harness = setup();
    let goal = seed_goal(&harness, "Journal");
    seed_week(&harness, &goal.id, monday(1), [true; 7]);

    let service = service(&harness);
    let payload = service
        .get_analytics(USER, RangeSelector::default(), false)
        .await
        .expect("payload");
    service.wait_for_background().await;

    let row = harness
        .db
        .with_connection(|conn| SnapshotRepository::find_by_user(conn, USER))
        .expect("snapshot query")
        .expect("snapshot row");
    let envelope: SnapshotEnvelope = serde_json::from_str(&row.payload_json).expect("envelope");

    assert_eq!(envelope.schema_version, SCHEMA_VERSION);
    assert_eq!(envelope.payload, payload);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_default_selector_is_never_snapshotted() {
    let harness = setup();
    let goal = seed_goal(&harness, "Run");
    seed_week(&harness, &goal.id, monday(1), [true; 7]);

    let service = service(&harness);
    service
        .get_analytics(USER, RangeSelector::TrailingDays(30), false)
        .await
        .expect("payload");
    service.wait_for_background().await;

    let row = harness
        .db
        .with_connection(|conn| SnapshotRepository::find_by_user(conn, USER))
        .expect("snapshot query");
    assert!(row.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn soft_deleted_goal_leaves_every_slice() {
    let harness = setup();
    let kept = seed_goal(&harness, "Stretch");
    let dropped = seed_goal(&harness, "Journal");
    seed_week(&harness, &kept.id, monday(1), [true; 7]);
    seed_week(&harness, &dropped.id, monday(1), [true; 7]);

    let service = service(&harness);
    let before = service
        .get_analytics(USER, RangeSelector::default(), false)
        .await
        .expect("payload");
    assert_eq!(before.streak_timeline.len(), 2);

    harness
        .db
        .with_connection(|conn| HabitRepository::soft_delete_goal(conn, &dropped.id))
        .expect("soft delete");

    let after = service
        .get_analytics(USER, RangeSelector::default(), true)
        .await
        .expect("payload");

    assert_eq!(after.streak_timeline.len(), 1);
    assert_eq!(after.streak_timeline[0].goal_id, kept.id);
    assert_eq!(after.lifetime_stats.goals_tracked, 1);
    assert!(after
        .goal_completion_pie
        .iter()
        .all(|slice| slice.goal_id == kept.id));
}

#[tokio::test(flavor = "multi_thread")]
async fn cached_reads_are_byte_identical() {
    let harness = setup();
    let goal = seed_goal(&harness, "Stretch");
    seed_week(&harness, &goal.id, monday(1), [true, true, false, false, false, false, false]);

    let service = service(&harness);
    let first = service
        .get_analytics(USER, RangeSelector::default(), false)
        .await
        .expect("payload");
    let second = service
        .get_analytics(USER, RangeSelector::default(), false)
        .await
        .expect("payload");

    let first_json = serde_json::to_string(&first).expect("json");
    let second_json = serde_json::to_string(&second).expect("json");
    assert_eq!(first_json, second_json);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalidate_warms_with_fresh_data() {
    let harness = setup();
    let goal = seed_goal(&harness, "Stretch");
    seed_week(
        &harness,
        &goal.id,
        monday(2),
        [true, false, false, false, false, false, false],
    );

    let service = service(&harness);
    let before = service
        .get_analytics(USER, RangeSelector::default(), false)
        .await
        .expect("payload");
    assert_eq!(before.lifetime_stats.total_completions, 1);

    seed_week(&harness, &goal.id, monday(1), [true; 7]);
    service.invalidate(USER);
    service.wait_for_background().await;

    let after = service
        .get_analytics(USER, RangeSelector::default(), false)
        .await
        .expect("payload");
    assert_eq!(after.lifetime_stats.total_completions, 8);

    // The warm also rewrote the durable snapshot.
    let row = harness
        .db
        .with_connection(|conn| SnapshotRepository::find_by_user(conn, USER))
        .expect("snapshot query")
        .expect("snapshot row");
    let envelope: SnapshotEnvelope = serde_json::from_str(&row.payload_json).expect("envelope");
    assert_eq!(envelope.payload.lifetime_stats.total_completions, 8);
}

#[tokio::test(flavor = "multi_thread")]
async fn cold_start_serves_the_persisted_snapshot() {
    let harness = setup();
    let goal = seed_goal(&harness, "Stretch");
    seed_week(&harness, &goal.id, monday(1), [true; 7]);

    let warm_service = service(&harness);
    let original = warm_service
        .get_analytics(USER, RangeSelector::default(), false)
        .await
        .expect("payload");
    warm_service.wait_for_background().await;

    // Fresh service instance with an empty in-process cache.
    let cold_service = service(&harness);
    let restored = cold_service
        .get_analytics(USER, RangeSelector::default(), false)
        .await
        .expect("payload");

    // The snapshot carries the original payload verbatim, generatedAt included.
    assert_eq!(restored, original);
}

#[tokio::test(flavor = "multi_thread")]
async fn user_with_no_data_gets_an_empty_payload() {
    let harness = setup();
    let service = service(&harness);

    let payload = service
        .get_analytics("nobody", RangeSelector::default(), false)
        .await
        .expect("payload");

    assert_eq!(payload.lifetime_stats.total_completions, 0);
    assert_eq!(payload.lifetime_stats.overall_rate, 0);
    assert!(payload.streak_timeline.is_empty());
    assert!(payload.goal_completion_pie.is_empty());
    assert_eq!(payload.daily_trend.len(), 30);
    assert!(payload.daily_trend.iter().all(|p| p.percentage == 0));
    assert_eq!(payload.consistency_score.overall, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn year_selector_only_counts_that_year() {
    let harness = setup();
    let goal = seed_goal(&harness, "Stretch");
    // A fixed week fully inside 2024: Monday 2024-03-04.
    let week_2024 = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    seed_week(&harness, &goal.id, week_2024, [true; 7]);
    seed_week(&harness, &goal.id, monday(1), [true; 7]);

    let service = service(&harness);
    let payload = service
        .get_analytics(USER, RangeSelector::Year(2024), false)
        .await
        .expect("payload");

    assert_eq!(payload.lifetime_stats.total_completions, 7);
    assert_eq!(payload.meta.range, "2024");
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_bounds_trailing_days_is_rejected() {
    let harness = setup();
    let service = service(&harness);

    let err = service
        .get_analytics(USER, RangeSelector::TrailingDays(0), false)
        .await
        .expect_err("validation error");
    assert!(matches!(
        err,
        habitgrid_analytics::error::AppError::Validation { .. }
    ));

    let err = service
        .get_analytics(USER, RangeSelector::TrailingDays(9999), false)
        .await
        .expect_err("validation error");
    assert!(matches!(
        err,
        habitgrid_analytics::error::AppError::Validation { .. }
    ));
}
