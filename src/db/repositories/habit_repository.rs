use std::convert::TryFrom;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{named_params, Connection, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::goal::{CreateGoalRequest, Goal};
use crate::models::weekly_log::{WeeklyLogRecord, DAYS_PER_WEEK};

#[derive(Debug, Clone)]
pub struct GoalRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: String,
    pub start_date: Option<String>,
    pub archived_from_week: Option<String>,
    pub deleted_at: Option<String>,
}

impl TryFrom<&Row<'_>> for GoalRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
            start_date: row.get("start_date")?,
            archived_from_week: row.get("archived_from_week")?,
            deleted_at: row.get("deleted_at")?,
        })
    }
}

impl GoalRow {
    pub fn into_record(self) -> AppResult<Goal> {
        Ok(Goal {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            created_at: parse_datetime(&self.created_at)?,
            start_date: self.start_date.as_deref().map(parse_date).transpose()?,
            archived_from_week: self
                .archived_from_week
                .as_deref()
                .map(parse_date)
                .transpose()?,
            deleted_at: self
                .deleted_at
                .as_deref()
                .map(|raw| parse_datetime(raw))
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WeeklyLogRow {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    pub week_start_date: String,
    pub weekly_target: i64,
    pub checkbox_states: String,
}

impl TryFrom<&Row<'_>> for WeeklyLogRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            goal_id: row.get("goal_id")?,
            week_start_date: row.get("week_start_date")?,
            weekly_target: row.get("weekly_target")?,
            checkbox_states: row.get("checkbox_states")?,
        })
    }
}

impl WeeklyLogRow {
    pub fn into_record(self) -> AppResult<WeeklyLogRecord> {
        let states: Vec<bool> = serde_json::from_str(&self.checkbox_states)?;
        let checkbox_states: [bool; DAYS_PER_WEEK] = states.try_into().map_err(|_| {
            AppError::database(format!(
                "weekly log {} does not hold exactly {} day flags",
                self.id, DAYS_PER_WEEK
            ))
        })?;

        Ok(WeeklyLogRecord {
            id: self.id,
            user_id: self.user_id,
            goal_id: self.goal_id,
            week_start_date: parse_date(&self.week_start_date)?,
            weekly_target: self.weekly_target.max(0) as u32,
            checkbox_states,
        })
    }
}

pub struct HabitRepository;

impl HabitRepository {
    pub fn insert_goal(conn: &Connection, request: &CreateGoalRequest) -> AppResult<Goal> {
        let goal = Goal {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            name: request.name.clone(),
            created_at: Utc::now(),
            start_date: request.start_date,
            archived_from_week: None,
            deleted_at: None,
        };

        conn.execute(
            r#"
                INSERT INTO goals (id, user_id, name, created_at, start_date, archived_from_week, deleted_at)
                VALUES (:id, :user_id, :name, :created_at, :start_date, NULL, NULL)
            "#,
            named_params! {
                ":id": &goal.id,
                ":user_id": &goal.user_id,
                ":name": &goal.name,
                ":created_at": goal.created_at.to_rfc3339(),
                ":start_date": goal.start_date.map(|date| date.to_string()),
            },
        )?;

        Ok(goal)
    }

    pub fn soft_delete_goal(conn: &Connection, goal_id: &str) -> AppResult<()> {
        let updated = conn.execute(
            "UPDATE goals SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            (Utc::now().to_rfc3339(), goal_id),
        )?;
        if updated == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    /// Visible goals only; soft-deleted goals never reach the aggregation path.
    pub fn list_goals(conn: &Connection, user_id: &str) -> AppResult<Vec<Goal>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, name, created_at, start_date, archived_from_week, deleted_at
            FROM goals
            WHERE user_id = ?1 AND deleted_at IS NULL
            ORDER BY created_at ASC
        "#,
        )?;

        let rows = stmt
            .query_map([user_id], |row| GoalRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(GoalRow::into_record).collect()
    }

    pub fn upsert_weekly_log(
        conn: &Connection,
        user_id: &str,
        goal_id: &str,
        week_start_date: NaiveDate,
        weekly_target: u32,
        checkbox_states: [bool; DAYS_PER_WEEK],
    ) -> AppResult<WeeklyLogRecord> {
        let record = WeeklyLogRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            goal_id: goal_id.to_string(),
            week_start_date,
            weekly_target,
            checkbox_states,
        };
        let states_json = serde_json::to_string(&record.checkbox_states.to_vec())?;

        conn.execute(
            r#"
                INSERT INTO weekly_logs (id, user_id, goal_id, week_start_date, weekly_target, checkbox_states)
                VALUES (:id, :user_id, :goal_id, :week_start_date, :weekly_target, :checkbox_states)
                ON CONFLICT(goal_id, week_start_date) DO UPDATE SET
                    weekly_target = excluded.weekly_target,
                    checkbox_states = excluded.checkbox_states
            "#,
            named_params! {
                ":id": &record.id,
                ":user_id": &record.user_id,
                ":goal_id": &record.goal_id,
                ":week_start_date": record.week_start_date.to_string(),
                ":weekly_target": record.weekly_target as i64,
                ":checkbox_states": &states_json,
            },
        )?;

        Ok(record)
    }

    /// Weekly logs whose seven-day span overlaps the window. A week starting
    /// up to six days before the window start still contributes days inside it.
    pub fn list_weekly_logs_in_range(
        conn: &Connection,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<WeeklyLogRecord>> {
        let earliest_week = start - Duration::days((DAYS_PER_WEEK - 1) as i64);
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, goal_id, week_start_date, weekly_target, checkbox_states
            FROM weekly_logs
            WHERE user_id = :user_id
              AND week_start_date >= :earliest
              AND week_start_date <= :latest
            ORDER BY week_start_date ASC
        "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":user_id": user_id,
                    ":earliest": earliest_week.to_string(),
                    ":latest": end.to_string(),
                },
                |row| WeeklyLogRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(WeeklyLogRow::into_record).collect()
    }
}

fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| AppError::database(format!("invalid stored date {raw:?}: {err}")))
}

fn parse_datetime(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| AppError::database(format!("invalid stored timestamp {raw:?}: {err}")))
}
