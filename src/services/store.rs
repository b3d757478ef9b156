use std::sync::Arc;

use async_trait::async_trait;
use tokio::task;

use crate::db::repositories::habit_repository::HabitRepository;
use crate::db::repositories::snapshot_repository::SnapshotRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::analytics::DateRange;
use crate::models::goal::Goal;
use crate::models::weekly_log::WeeklyLogRecord;

/// The persistent store holding raw weekly-log and goal rows. The analytics
/// core only ever asks it for one user's rows over one window.
#[async_trait]
pub trait HabitDataSource: Send + Sync {
    async fn fetch_weekly_logs_and_goals(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> AppResult<(Vec<WeeklyLogRecord>, Vec<Goal>)>;
}

/// Raw persisted snapshot row. Deserialization and shape checks happen in the
/// manager; a store only moves bytes.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub payload_json: String,
    pub updated_at: String,
}

/// Durable fallback snapshot, one row per user, default selector only.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn read_snapshot(&self, user_id: &str) -> AppResult<Option<StoredSnapshot>>;
    async fn write_snapshot(&self, user_id: &str, payload_json: String) -> AppResult<()>;
}

/// Reference implementation over the bundled sqlite layer. rusqlite work is
/// blocking, so every call hops onto the blocking pool.
#[derive(Clone)]
pub struct SqliteHabitStore {
    db: Arc<DbPool>,
}

impl SqliteHabitStore {
    pub fn new(db: DbPool) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn pool(&self) -> &DbPool {
        &self.db
    }
}

#[async_trait]
impl HabitDataSource for SqliteHabitStore {
    async fn fetch_weekly_logs_and_goals(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> AppResult<(Vec<WeeklyLogRecord>, Vec<Goal>)> {
        let db = Arc::clone(&self.db);
        let user = user_id.to_string();

        task::spawn_blocking(move || {
            db.with_connection(|conn| {
                let goals = HabitRepository::list_goals(conn, &user)?;
                let logs =
                    HabitRepository::list_weekly_logs_in_range(conn, &user, range.start, range.end)?;
                Ok((logs, goals))
            })
        })
        .await
        .map_err(|err| AppError::other(format!("blocking fetch task failed: {err}")))?
    }
}

#[async_trait]
impl SnapshotStore for SqliteHabitStore {
    async fn read_snapshot(&self, user_id: &str) -> AppResult<Option<StoredSnapshot>> {
        let db = Arc::clone(&self.db);
        let user = user_id.to_string();

        task::spawn_blocking(move || {
            db.with_connection(|conn| {
                let row = SnapshotRepository::find_by_user(conn, &user)?;
                Ok(row.map(|row| StoredSnapshot {
                    payload_json: row.payload_json,
                    updated_at: row.updated_at,
                }))
            })
        })
        .await
        .map_err(|err| AppError::other(format!("blocking snapshot read failed: {err}")))?
    }

    async fn write_snapshot(&self, user_id: &str, payload_json: String) -> AppResult<()> {
        let db = Arc::clone(&self.db);
        let user = user_id.to_string();

        task::spawn_blocking(move || {
            db.with_connection(|conn| SnapshotRepository::upsert(conn, &user, &payload_json))
        })
        .await
        .map_err(|err| AppError::other(format!("blocking snapshot write failed: {err}")))?
    }
}
