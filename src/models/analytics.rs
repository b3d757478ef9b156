use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Bumped whenever the payload's field set changes, so a persisted snapshot
/// shaped for an old schema is never served.
pub const SCHEMA_VERSION: &str = "v2";

pub const DEFAULT_TRAILING_DAYS: u32 = 365;
pub const MAX_TRAILING_DAYS: u32 = 365;

/// The window a caller asks analytics for: either a trailing-day count or a
/// specific calendar year. Only the default selector (trailing 365 days) is
/// eligible for snapshot persistence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RangeSelector {
    TrailingDays(u32),
    Year(i32),
}

impl RangeSelector {
    pub fn as_str(&self) -> String {
        match self {
            RangeSelector::TrailingDays(days) => format!("{days}d"),
            RangeSelector::Year(year) => year.to_string(),
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, RangeSelector::TrailingDays(days) if *days == DEFAULT_TRAILING_DAYS)
    }
}

impl Default for RangeSelector {
    fn default() -> Self {
        RangeSelector::TrailingDays(DEFAULT_TRAILING_DAYS)
    }
}

/// Inclusive calendar-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// Bucket label: a calendar date for daily/weekly buckets, `YYYY-MM` for
    /// monthly buckets.
    pub bucket: String,
    pub completed: i64,
    pub total: i64,
    pub percentage: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    pub date: NaiveDate,
    pub completed: i64,
    pub total: i64,
    /// `floor(completionRatio * 5)` clamped to `[0, 4]`; 0 for empty days.
    pub intensity: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayCell {
    pub goal_name: String,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u8,
    pub label: String,
    pub completed: i64,
    pub total: i64,
    pub percentage: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalStreak {
    pub goal_id: String,
    pub goal_name: String,
    pub current_streak: i64,
    pub longest_streak: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PieSlice {
    pub goal_id: String,
    pub goal_name: String,
    /// Completion percentage for the goal pie, raw completed count for the
    /// lifetime contribution pie.
    pub value: i64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetActualPoint {
    pub date: NaiveDate,
    pub target: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyScore {
    pub overall: i64,
    pub by_goal: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeStats {
    pub total_completions: i64,
    pub total_days: i64,
    pub goals_tracked: i64,
    pub overall_rate: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    pub generated_at: String,
    pub range: String,
}

/// The full analytics bundle for one user and one range selector. Each slice
/// is independent and order-stable; none depends on another slice's output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsPayload {
    pub daily_trend: Vec<TrendPoint>,
    pub weekly_trend: Vec<TrendPoint>,
    pub monthly_trend: Vec<TrendPoint>,
    pub calendar_heatmap: Vec<HeatmapCell>,
    pub time_of_week_heatmap: Vec<WeekdayCell>,
    pub goal_completion_pie: Vec<PieSlice>,
    pub lifetime_contribution_pie: Vec<PieSlice>,
    pub target_vs_actual: Vec<TargetActualPoint>,
    pub streak_timeline: Vec<GoalStreak>,
    pub longest_streaks: Vec<GoalStreak>,
    pub consistency_score: ConsistencyScore,
    pub lifetime_stats: LifetimeStats,
    pub meta: PayloadMeta,
}

/// What the snapshot row actually stores. Deserialization failure or a
/// version mismatch is treated as a cache miss, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEnvelope {
    pub schema_version: String,
    pub payload: AnalyticsPayload,
}
