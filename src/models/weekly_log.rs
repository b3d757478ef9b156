use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DAYS_PER_WEEK: usize = 7;

/// One persisted record covering seven consecutive days of habit completion
/// for one goal. `week_start_date` is always the Monday of its week.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyLogRecord {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    pub week_start_date: NaiveDate,
    pub weekly_target: u32,
    /// Index 0 is the week's first day (Monday). The array type carries the
    /// exactly-seven invariant.
    pub checkbox_states: [bool; DAYS_PER_WEEK],
}

/// One derived, in-memory record representing a single day's completion
/// status for a single goal. Built fresh on every aggregation call and
/// discarded after the pipelines run; never persisted, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub goal_id: String,
    pub goal_name: String,
    pub completed: bool,
    pub target: u32,
}
