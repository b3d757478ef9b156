use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;

/// One row per user holding the serialized default-range payload.
#[derive(Debug, Clone)]
pub struct SnapshotRow {
    pub user_id: String,
    pub payload_json: String,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for SnapshotRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.get("user_id")?,
            payload_json: row.get("payload_json")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct SnapshotRepository;

impl SnapshotRepository {
    pub fn upsert(conn: &Connection, user_id: &str, payload_json: &str) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO analytics_snapshots (user_id, payload_json, updated_at)
                VALUES (:user_id, :payload_json, :updated_at)
                ON CONFLICT(user_id) DO UPDATE SET
                    payload_json = excluded.payload_json,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":user_id": user_id,
                ":payload_json": payload_json,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )?;

        Ok(())
    }

    pub fn find_by_user(conn: &Connection, user_id: &str) -> AppResult<Option<SnapshotRow>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, payload_json, updated_at
            FROM analytics_snapshots
            WHERE user_id = ?1
        "#,
        )?;

        let row = stmt
            .query_row([user_id], |row| SnapshotRow::try_from(row))
            .optional()?;

        Ok(row)
    }

    pub fn delete(conn: &Connection, user_id: &str) -> AppResult<usize> {
        let deleted = conn.execute(
            "DELETE FROM analytics_snapshots WHERE user_id = ?1",
            [user_id],
        )?;
        Ok(deleted)
    }
}
