use std::collections::HashSet;

use chrono::Utc;

use crate::models::analytics::{AnalyticsPayload, DateRange, PayloadMeta, RangeSelector};
use crate::models::goal::Goal;
use crate::models::weekly_log::{DailyRecord, WeeklyLogRecord};
use crate::services::{normalizer, pipelines};

/// Build the full payload for one user and one window: filter to the visible
/// goal set, expand the weekly logs once, clip the timeline to the window,
/// then fan out to every pipeline. The daily timeline lives only for the
/// duration of this call.
pub fn build_payload(
    logs: &[WeeklyLogRecord],
    goals: &[Goal],
    range: DateRange,
    selector: RangeSelector,
) -> AnalyticsPayload {
    let visible_goals: Vec<Goal> = goals.iter().filter(|goal| goal.is_visible()).cloned().collect();
    let visible_ids: HashSet<&str> = visible_goals.iter().map(|goal| goal.id.as_str()).collect();
    let visible_logs: Vec<WeeklyLogRecord> = logs
        .iter()
        .filter(|log| visible_ids.contains(log.goal_id.as_str()))
        .cloned()
        .collect();

    let timeline: Vec<DailyRecord> = normalizer::normalize(&visible_logs, &visible_goals)
        .into_iter()
        .filter(|record| record.date >= range.start && record.date <= range.end)
        .collect();

    let streak_timeline = pipelines::goal_streaks(&timeline, &visible_goals);
    let longest_streaks =
        pipelines::longest_streaks(&streak_timeline, pipelines::LONGEST_STREAKS_LIMIT);

    AnalyticsPayload {
        daily_trend: pipelines::daily_trend(&timeline, range.end, pipelines::DAILY_TREND_DAYS),
        weekly_trend: pipelines::weekly_trend(&timeline),
        monthly_trend: pipelines::monthly_trend(&timeline),
        calendar_heatmap: pipelines::calendar_heatmap(&timeline, range),
        time_of_week_heatmap: pipelines::time_of_week_heatmap(&timeline),
        goal_completion_pie: pipelines::goal_completion_pie(&timeline),
        lifetime_contribution_pie: pipelines::lifetime_contribution_pie(&timeline),
        target_vs_actual: pipelines::target_vs_actual(&timeline),
        streak_timeline,
        longest_streaks,
        consistency_score: pipelines::consistency_score(&timeline),
        lifetime_stats: pipelines::lifetime_stats(&timeline),
        meta: PayloadMeta {
            generated_at: Utc::now().to_rfc3339(),
            range: selector.as_str(),
        },
    }
}
