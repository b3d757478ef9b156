//! The aggregation pipelines. Each function consumes the shared daily
//! timeline (and the goal list where zero-activity goals must still show up)
//! and produces one independent slice of the payload. All of them are pure;
//! every ratio with a zero denominator yields 0, never NaN.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::analytics::{
    ConsistencyScore, DateRange, GoalStreak, HeatmapCell, LifetimeStats, PieSlice,
    TargetActualPoint, TrendPoint, WeekdayCell,
};
use crate::models::goal::Goal;
use crate::models::weekly_log::DailyRecord;

pub const DAILY_TREND_DAYS: u32 = 30;
pub const WEEKLY_TREND_BUCKETS: usize = 12;
pub const MONTHLY_TREND_BUCKETS: usize = 6;
pub const TARGET_VS_ACTUAL_BUCKETS: usize = 30;
pub const LONGEST_STREAKS_LIMIT: usize = 5;

/// Fixed, order-stable palette cycled by index for the pie slices.
const PALETTE: [&str; 8] = [
    "#4C9AFF", "#36B37E", "#FFAB00", "#FF5630", "#6554C0", "#00B8D9", "#FF8B00", "#998DD9",
];

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Percentage rounded to the nearest integer, 0 when the denominator is zero.
fn percentage(completed: i64, total: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as i64
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

#[derive(Default, Clone, Copy)]
struct DayCounts {
    completed: i64,
    total: i64,
}

fn counts_by_date(records: &[DailyRecord]) -> HashMap<NaiveDate, DayCounts> {
    let mut counts: HashMap<NaiveDate, DayCounts> = HashMap::new();
    for record in records {
        let entry = counts.entry(record.date).or_default();
        entry.total += 1;
        if record.completed {
            entry.completed += 1;
        }
    }
    counts
}

/// Daily completion trend. Walks every calendar day of the trailing window
/// ending at `window_end`, emitting 0% buckets for days with no records.
pub fn daily_trend(records: &[DailyRecord], window_end: NaiveDate, days: u32) -> Vec<TrendPoint> {
    let counts = counts_by_date(records);
    let days = days.max(1);
    let mut points = Vec::with_capacity(days as usize);

    let mut date = window_end - Duration::days(days as i64 - 1);
    while date <= window_end {
        let day = counts.get(&date).copied().unwrap_or_default();
        points.push(TrendPoint {
            bucket: date.to_string(),
            completed: day.completed,
            total: day.total,
            percentage: percentage(day.completed, day.total),
        });
        date += Duration::days(1);
    }

    points
}

/// Weekly completion trend over ISO weeks (Monday start). Only weeks with
/// data appear; the most recent `WEEKLY_TREND_BUCKETS` are kept, ascending.
pub fn weekly_trend(records: &[DailyRecord]) -> Vec<TrendPoint> {
    let mut buckets: HashMap<NaiveDate, DayCounts> = HashMap::new();
    for record in records {
        let entry = buckets.entry(week_start(record.date)).or_default();
        entry.total += 1;
        if record.completed {
            entry.completed += 1;
        }
    }

    let mut weeks: Vec<(NaiveDate, DayCounts)> = buckets.into_iter().collect();
    weeks.sort_by_key(|(start, _)| *start);
    if weeks.len() > WEEKLY_TREND_BUCKETS {
        weeks.drain(..weeks.len() - WEEKLY_TREND_BUCKETS);
    }

    weeks
        .into_iter()
        .map(|(start, counts)| TrendPoint {
            bucket: start.to_string(),
            completed: counts.completed,
            total: counts.total,
            percentage: percentage(counts.completed, counts.total),
        })
        .collect()
}

/// Monthly completion trend over calendar months with data; the most recent
/// `MONTHLY_TREND_BUCKETS` are kept, ascending.
pub fn monthly_trend(records: &[DailyRecord]) -> Vec<TrendPoint> {
    let mut buckets: HashMap<(i32, u32), DayCounts> = HashMap::new();
    for record in records {
        let entry = buckets
            .entry((record.date.year(), record.date.month()))
            .or_default();
        entry.total += 1;
        if record.completed {
            entry.completed += 1;
        }
    }

    let mut months: Vec<((i32, u32), DayCounts)> = buckets.into_iter().collect();
    months.sort_by_key(|(month, _)| *month);
    if months.len() > MONTHLY_TREND_BUCKETS {
        months.drain(..months.len() - MONTHLY_TREND_BUCKETS);
    }

    months
        .into_iter()
        .map(|((year, month), counts)| TrendPoint {
            bucket: format!("{year:04}-{month:02}"),
            completed: counts.completed,
            total: counts.total,
            percentage: percentage(counts.completed, counts.total),
        })
        .collect()
}

/// Calendar heatmap: one cell per day from the grid-aligned start (backed up
/// to the previous Monday) through the window end. Empty days get intensity 0.
pub fn calendar_heatmap(records: &[DailyRecord], range: DateRange) -> Vec<HeatmapCell> {
    let counts = counts_by_date(records);
    let grid_start = week_start(range.start);
    let mut cells = Vec::new();

    let mut date = grid_start;
    while date <= range.end {
        let day = counts.get(&date).copied().unwrap_or_default();
        let intensity = if day.total > 0 {
            let ratio = day.completed as f64 / day.total as f64;
            ((ratio * 5.0).floor() as i64).clamp(0, 4) as u8
        } else {
            0
        };
        cells.push(HeatmapCell {
            date,
            completed: day.completed,
            total: day.total,
            intensity,
        });
        date += Duration::days(1);
    }

    cells
}

/// Per-goal-per-weekday completion heatmap across the whole window. One cell
/// per (goal, weekday) combination that has data, including 0% cells.
pub fn time_of_week_heatmap(records: &[DailyRecord]) -> Vec<WeekdayCell> {
    let mut buckets: BTreeMap<(String, u8), DayCounts> = BTreeMap::new();
    for record in records {
        let weekday = record.date.weekday().num_days_from_monday() as u8;
        let entry = buckets
            .entry((record.goal_name.clone(), weekday))
            .or_default();
        entry.total += 1;
        if record.completed {
            entry.completed += 1;
        }
    }

    buckets
        .into_iter()
        .map(|((goal_name, weekday), counts)| WeekdayCell {
            goal_name,
            weekday,
            label: WEEKDAY_LABELS[weekday as usize].to_string(),
            completed: counts.completed,
            total: counts.total,
            percentage: percentage(counts.completed, counts.total),
        })
        .collect()
}

/// Per-goal streaks. A streak is a run of consecutive `completed=true`
/// records in date order; a single false record breaks it. Goals with no
/// records in the window still appear with 0/0.
pub fn goal_streaks(records: &[DailyRecord], goals: &[Goal]) -> Vec<GoalStreak> {
    let mut by_goal: HashMap<&str, Vec<&DailyRecord>> = HashMap::new();
    for record in records {
        by_goal.entry(record.goal_id.as_str()).or_default().push(record);
    }

    let mut streaks: Vec<GoalStreak> = Vec::new();
    let mut covered: HashSet<&str> = HashSet::new();

    for goal in goals {
        covered.insert(goal.id.as_str());
        let (current, longest) = match by_goal.get(goal.id.as_str()) {
            Some(goal_records) => streak_lengths(goal_records),
            None => (0, 0),
        };
        streaks.push(GoalStreak {
            goal_id: goal.id.clone(),
            goal_name: goal.name.clone(),
            current_streak: current,
            longest_streak: longest,
        });
    }

    // Records whose goal row is missing from the goal list still count.
    for (goal_id, goal_records) in &by_goal {
        if covered.contains(goal_id) {
            continue;
        }
        let (current, longest) = streak_lengths(goal_records);
        streaks.push(GoalStreak {
            goal_id: goal_id.to_string(),
            goal_name: goal_records[0].goal_name.clone(),
            current_streak: current,
            longest_streak: longest,
        });
    }

    streaks.sort_by(|a, b| a.goal_name.cmp(&b.goal_name).then(a.goal_id.cmp(&b.goal_id)));
    streaks
}

fn streak_lengths(goal_records: &[&DailyRecord]) -> (i64, i64) {
    let mut ordered: Vec<&DailyRecord> = goal_records.to_vec();
    ordered.sort_by_key(|record| record.date);

    let mut longest: i64 = 0;
    let mut run: i64 = 0;
    for record in &ordered {
        if record.completed {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    let current = ordered
        .iter()
        .rev()
        .take_while(|record| record.completed)
        .count() as i64;

    (current, longest)
}

/// Top goals ranked by longest streak, descending.
pub fn longest_streaks(streaks: &[GoalStreak], limit: usize) -> Vec<GoalStreak> {
    let mut ranked = streaks.to_vec();
    ranked.sort_by(|a, b| {
        b.longest_streak
            .cmp(&a.longest_streak)
            .then(a.goal_name.cmp(&b.goal_name))
    });
    ranked.truncate(limit);
    ranked
}

#[derive(Default, Clone)]
struct GoalCounts {
    goal_name: String,
    completed: i64,
    total: i64,
}

fn counts_by_goal(records: &[DailyRecord]) -> BTreeMap<String, GoalCounts> {
    let mut counts: BTreeMap<String, GoalCounts> = BTreeMap::new();
    for record in records {
        let entry = counts.entry(record.goal_id.clone()).or_default();
        entry.goal_name = record.goal_name.clone();
        entry.total += 1;
        if record.completed {
            entry.completed += 1;
        }
    }
    counts
}

/// Completion-percentage distribution: one slice per goal with at least one
/// record in the window.
pub fn goal_completion_pie(records: &[DailyRecord]) -> Vec<PieSlice> {
    counts_by_goal(records)
        .into_iter()
        .enumerate()
        .map(|(index, (goal_id, counts))| PieSlice {
            goal_id,
            goal_name: counts.goal_name,
            value: percentage(counts.completed, counts.total),
            color: PALETTE[index % PALETTE.len()].to_string(),
        })
        .collect()
}

/// Lifetime contribution distribution: raw completed counts, not percentages.
pub fn lifetime_contribution_pie(records: &[DailyRecord]) -> Vec<PieSlice> {
    counts_by_goal(records)
        .into_iter()
        .enumerate()
        .map(|(index, (goal_id, counts))| PieSlice {
            goal_id,
            goal_name: counts.goal_name,
            value: counts.completed,
            color: PALETTE[index % PALETTE.len()].to_string(),
        })
        .collect()
}

/// Target vs actual per calendar day. A day touched by multiple goal logs
/// with different weekly targets keeps the maximum target. Most recent
/// `TARGET_VS_ACTUAL_BUCKETS` days with data, ascending.
pub fn target_vs_actual(records: &[DailyRecord]) -> Vec<TargetActualPoint> {
    let mut buckets: HashMap<NaiveDate, (i64, i64)> = HashMap::new();
    for record in records {
        let entry = buckets.entry(record.date).or_insert((0, 0));
        entry.0 = entry.0.max(record.target as i64);
        if record.completed {
            entry.1 += 1;
        }
    }

    let mut days: Vec<(NaiveDate, (i64, i64))> = buckets.into_iter().collect();
    days.sort_by_key(|(date, _)| *date);
    if days.len() > TARGET_VS_ACTUAL_BUCKETS {
        days.drain(..days.len() - TARGET_VS_ACTUAL_BUCKETS);
    }

    days.into_iter()
        .map(|(date, (target, actual))| TargetActualPoint {
            date,
            target,
            actual,
        })
        .collect()
}

/// Consistency: distinct days with at least one completion over distinct days
/// with any record, overall and restricted per goal.
pub fn consistency_score(records: &[DailyRecord]) -> ConsistencyScore {
    let mut active_days: HashSet<NaiveDate> = HashSet::new();
    let mut completed_days: HashSet<NaiveDate> = HashSet::new();
    let mut goal_active: BTreeMap<String, HashSet<NaiveDate>> = BTreeMap::new();
    let mut goal_completed: BTreeMap<String, HashSet<NaiveDate>> = BTreeMap::new();

    for record in records {
        active_days.insert(record.date);
        goal_active
            .entry(record.goal_name.clone())
            .or_default()
            .insert(record.date);
        if record.completed {
            completed_days.insert(record.date);
            goal_completed
                .entry(record.goal_name.clone())
                .or_default()
                .insert(record.date);
        }
    }

    let by_goal = goal_active
        .into_iter()
        .map(|(goal_name, active)| {
            let completed = goal_completed
                .get(&goal_name)
                .map(|days| days.len() as i64)
                .unwrap_or(0);
            let score = percentage(completed, active.len() as i64);
            (goal_name, score)
        })
        .collect();

    ConsistencyScore {
        overall: percentage(completed_days.len() as i64, active_days.len() as i64),
        by_goal,
    }
}

/// Lifetime totals across the window.
pub fn lifetime_stats(records: &[DailyRecord]) -> LifetimeStats {
    let total_completions = records.iter().filter(|record| record.completed).count() as i64;
    let total_days = records
        .iter()
        .map(|record| record.date)
        .collect::<HashSet<_>>()
        .len() as i64;
    let goals_tracked = records
        .iter()
        .map(|record| record.goal_id.as_str())
        .collect::<HashSet<_>>()
        .len() as i64;

    LifetimeStats {
        total_completions,
        total_days,
        goals_tracked,
        overall_rate: percentage(total_completions, records.len() as i64),
    }
}
