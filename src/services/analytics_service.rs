use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::analytics::{
    AnalyticsPayload, DateRange, RangeSelector, SnapshotEnvelope, MAX_TRAILING_DAYS,
    SCHEMA_VERSION,
};
use crate::services::assembler;
use crate::services::background::BackgroundRunner;
use crate::services::cache_service::PayloadCache;
use crate::services::store::{HabitDataSource, SnapshotStore};
use crate::utils::race::{race_with_fallback, Raced};

const CACHE_TTL_SECONDS: i64 = 60;
const FETCH_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Freshness window for in-process entries; checked on read, never a timer.
    pub cache_ttl: Duration,
    /// How long a read with a stale fallback waits for the store before
    /// serving the stale value instead.
    pub fetch_timeout: StdDuration,
    /// Whether `invalidate` schedules a default-selector warm-up.
    pub warm_on_invalidate: bool,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::seconds(CACHE_TTL_SECONDS),
            fetch_timeout: StdDuration::from_millis(FETCH_TIMEOUT_MS),
            warm_on_invalidate: true,
        }
    }
}

/// The cache & snapshot manager: owns the staleness policy around the payload
/// assembler. Reads prefer the in-process cache, fall back to the durable
/// snapshot on cold starts, and bound worst-case latency by racing the store
/// fetch against a timeout whenever a stale value exists to fall back on.
pub struct AnalyticsService {
    source: Arc<dyn HabitDataSource>,
    snapshots: Arc<dyn SnapshotStore>,
    cache: Arc<dyn PayloadCache>,
    background: BackgroundRunner,
    config: AnalyticsConfig,
    /// Users whose snapshot is pending a rewarm after `invalidate`; the
    /// snapshot cold-start path is bypassed for them so a read can never
    /// resurface the pre-invalidation payload.
    warming: Arc<Mutex<HashSet<String>>>,
}

impl AnalyticsService {
    pub fn new(
        source: Arc<dyn HabitDataSource>,
        snapshots: Arc<dyn SnapshotStore>,
        cache: Arc<dyn PayloadCache>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            source,
            snapshots,
            cache,
            background: BackgroundRunner::default(),
            config,
            warming: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn get_analytics(
        &self,
        user_id: &str,
        selector: RangeSelector,
        force_refresh: bool,
    ) -> AppResult<AnalyticsPayload> {
        let range = resolve_window(selector)?;
        let key = cache_key(user_id, selector);
        let entry = self.cache.get(&key);

        if !force_refresh {
            if let Some(entry) = &entry {
                if Utc::now() - entry.written_at <= self.config.cache_ttl {
                    debug!(target: "app::analytics", user_id, selector = %selector.as_str(), "cache hit");
                    return Ok(entry.payload.clone());
                }
            }

            if selector.is_default() && entry.is_none() && !self.is_warming(user_id) {
                if let Some(payload) = self.try_snapshot(user_id).await {
                    debug!(target: "app::analytics", user_id, "serving persisted snapshot");
                    self.cache.set(&key, payload.clone());
                    return Ok(payload);
                }
            }
        }

        // The compute runs in its own task: a caller that takes the stale
        // value on timeout never cancels the fetch, and the task still writes
        // its result through for the next reader.
        let task = tokio::spawn(recompute(
            Arc::clone(&self.source),
            Arc::clone(&self.snapshots),
            Arc::clone(&self.cache),
            self.background.clone(),
            user_id.to_string(),
            selector,
            range,
            key,
        ));
        let primary = async move {
            task.await
                .map_err(|err| AppError::other(format!("analytics compute task failed: {err}")))?
        };

        let stale = if force_refresh {
            None
        } else {
            entry.map(|entry| entry.payload)
        };

        match race_with_fallback(primary, self.config.fetch_timeout, stale).await? {
            Raced::Completed(payload) => Ok(payload),
            Raced::TimedOut(stale) => {
                warn!(
                    target: "app::analytics",
                    user_id,
                    timeout_ms = self.config.fetch_timeout.as_millis() as u64,
                    "data source slow, serving stale payload"
                );
                Ok(stale)
            }
            Raced::FailedWithFallback(stale, err) => {
                warn!(
                    target: "app::analytics",
                    user_id,
                    error = %err,
                    "data source failed, serving stale payload"
                );
                Ok(stale)
            }
        }
    }

    /// Synchronously drop every cache entry for the user, then warm the
    /// default selector in the background without blocking the caller.
    pub fn invalidate(&self, user_id: &str) {
        let dropped = self.cache.delete_by_prefix(&user_prefix(user_id));
        debug!(target: "app::analytics", user_id, dropped, "invalidated cache entries");

        if !self.config.warm_on_invalidate {
            return;
        }

        if let Ok(mut guard) = self.warming.lock() {
            guard.insert(user_id.to_string());
        }

        let selector = RangeSelector::default();
        let range = match resolve_window(selector) {
            Ok(range) => range,
            Err(err) => {
                warn!(target: "app::analytics", user_id, error = %err, "cache warm skipped");
                return;
            }
        };
        let key = cache_key(user_id, selector);
        let source = Arc::clone(&self.source);
        let snapshots = Arc::clone(&self.snapshots);
        let cache = Arc::clone(&self.cache);
        let background = self.background.clone();
        let warming = Arc::clone(&self.warming);
        let user = user_id.to_string();

        self.background.submit("cache-warm", async move {
            let outcome = recompute(
                source, snapshots, cache, background, user.clone(), selector, range, key,
            )
            .await;
            if let Ok(mut guard) = warming.lock() {
                guard.remove(&user);
            }
            outcome.map(|_| ())
        });
    }

    /// Test and shutdown helper: wait for detached snapshot writes and cache
    /// warms to settle.
    pub async fn wait_for_background(&self) {
        self.background.wait_idle().await;
    }

    fn is_warming(&self, user_id: &str) -> bool {
        self.warming
            .lock()
            .map(|guard| guard.contains(user_id))
            .unwrap_or(false)
    }

    /// Snapshot read with the structural shape check: any store error,
    /// deserialization failure, or schema-version mismatch is a miss.
    async fn try_snapshot(&self, user_id: &str) -> Option<AnalyticsPayload> {
        let stored = match self.snapshots.read_snapshot(user_id).await {
            Ok(stored) => stored?,
            Err(err) => {
                debug!(target: "app::snapshot", user_id, error = %err, "snapshot read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<SnapshotEnvelope>(&stored.payload_json) {
            Ok(envelope) if envelope.schema_version == SCHEMA_VERSION => Some(envelope.payload),
            Ok(envelope) => {
                debug!(
                    target: "app::snapshot",
                    user_id,
                    found = %envelope.schema_version,
                    expected = SCHEMA_VERSION,
                    "snapshot schema mismatch, treating as miss"
                );
                None
            }
            Err(err) => {
                warn!(target: "app::snapshot", user_id, error = %err, "snapshot corrupt, treating as miss");
                None
            }
        }
    }
}

/// Fetch, assemble, store in-process, and (default selector only) schedule
/// the durable snapshot upsert.
#[allow(clippy::too_many_arguments)]
async fn recompute(
    source: Arc<dyn HabitDataSource>,
    snapshots: Arc<dyn SnapshotStore>,
    cache: Arc<dyn PayloadCache>,
    background: BackgroundRunner,
    user_id: String,
    selector: RangeSelector,
    range: DateRange,
    key: String,
) -> AppResult<AnalyticsPayload> {
    let (logs, goals) = source.fetch_weekly_logs_and_goals(&user_id, range).await?;
    let payload = assembler::build_payload(&logs, &goals, range, selector);
    cache.set(&key, payload.clone());

    if selector.is_default() {
        let envelope = SnapshotEnvelope {
            schema_version: SCHEMA_VERSION.to_string(),
            payload: payload.clone(),
        };
        let json = serde_json::to_string(&envelope)?;
        background.submit("snapshot-upsert", async move {
            snapshots.write_snapshot(&user_id, json).await
        });
    }

    Ok(payload)
}

pub(crate) fn cache_key(user_id: &str, selector: RangeSelector) -> String {
    format!(
        "analytics:{user_id}:{selector}:{version}",
        selector = selector.as_str(),
        version = SCHEMA_VERSION
    )
}

fn user_prefix(user_id: &str) -> String {
    format!("analytics:{user_id}:")
}

pub(crate) fn resolve_window(selector: RangeSelector) -> AppResult<DateRange> {
    let today = Utc::now().date_naive();
    match selector {
        RangeSelector::TrailingDays(days) => {
            if days == 0 || days > MAX_TRAILING_DAYS {
                return Err(AppError::validation(format!(
                    "trailing day count must be in [1, {MAX_TRAILING_DAYS}], got {days}"
                )));
            }
            Ok(DateRange {
                start: today - Duration::days(days as i64 - 1),
                end: today,
            })
        }
        RangeSelector::Year(year) => {
            let start = NaiveDate::from_ymd_opt(year, 1, 1)
                .ok_or_else(|| AppError::validation(format!("invalid year {year}")))?;
            let end = NaiveDate::from_ymd_opt(year, 12, 31)
                .ok_or_else(|| AppError::validation(format!("invalid year {year}")))?;
            Ok(DateRange { start, end })
        }
    }
}
