use std::collections::HashMap;

use chrono::Duration;

use crate::models::goal::Goal;
use crate::models::weekly_log::{DailyRecord, WeeklyLogRecord, DAYS_PER_WEEK};

/// Expand weekly logs into one `DailyRecord` per day flag. Every log yields
/// exactly seven records with `date = week_start_date + day_index`; output
/// order is unspecified and pipelines bucket or sort as they need.
///
/// Days before a goal's active-from date are NOT suppressed here; the live
/// aggregation path counts the full week a log covers. See
/// `normalize_from_active_window` for the filtering variant.
pub fn normalize(logs: &[WeeklyLogRecord], goals: &[Goal]) -> Vec<DailyRecord> {
    let names = goal_names(goals);
    let mut records = Vec::with_capacity(logs.len() * DAYS_PER_WEEK);

    for log in logs {
        for (day_index, completed) in log.checkbox_states.iter().enumerate() {
            records.push(DailyRecord {
                date: log.week_start_date + Duration::days(day_index as i64),
                goal_id: log.goal_id.clone(),
                goal_name: display_name(&names, &log.goal_id),
                completed: *completed,
                target: log.weekly_target,
            });
        }
    }

    records
}

/// Variant that drops days falling before the goal's active-from date, so a
/// goal created mid-week does not accrue empty days for the week's head.
/// Not wired into the assembler; the live path uses `normalize`.
pub fn normalize_from_active_window(logs: &[WeeklyLogRecord], goals: &[Goal]) -> Vec<DailyRecord> {
    let active_from: HashMap<&str, chrono::NaiveDate> = goals
        .iter()
        .map(|goal| (goal.id.as_str(), goal.active_from()))
        .collect();

    normalize(logs, goals)
        .into_iter()
        .filter(|record| match active_from.get(record.goal_id.as_str()) {
            Some(from) => record.date >= *from,
            None => true,
        })
        .collect()
}

fn goal_names(goals: &[Goal]) -> HashMap<&str, &str> {
    goals
        .iter()
        .map(|goal| (goal.id.as_str(), goal.name.as_str()))
        .collect()
}

fn display_name(names: &HashMap<&str, &str>, goal_id: &str) -> String {
    names
        .get(goal_id)
        .map(|name| name.to_string())
        .unwrap_or_else(|| goal_id.to_string())
}
