use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::analytics::AnalyticsPayload;

/// One cached payload. Staleness is judged by the reader against its own
/// freshness window; entries are never evicted on expiry, only overwritten or
/// dropped by invalidation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: AnalyticsPayload,
    pub written_at: DateTime<Utc>,
}

/// In-process payload cache seam. Keys are the flat
/// `analytics:{user}:{selector}:{version}` strings, which makes per-user
/// invalidation a prefix delete.
pub trait PayloadCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn set(&self, key: &str, payload: AnalyticsPayload);
    fn delete_by_prefix(&self, prefix: &str) -> usize;
}

/// Default process-local implementation: a single map behind one lock. Both
/// mutations are whole-entry operations, so no finer granularity is needed,
/// and no caller holds the lock across a fetch or a pipeline run.
#[derive(Default)]
pub struct InMemoryPayloadCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryPayloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PayloadCache for InMemoryPayloadCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
    }

    fn set(&self, key: &str, payload: AnalyticsPayload) {
        if let Ok(mut guard) = self.entries.write() {
            guard.insert(
                key.to_string(),
                CacheEntry {
                    payload,
                    written_at: Utc::now(),
                },
            );
        }
    }

    fn delete_by_prefix(&self, prefix: &str) -> usize {
        let Ok(mut guard) = self.entries.write() else {
            return 0;
        };
        let before = guard.len();
        guard.retain(|key, _| !key.starts_with(prefix));
        let dropped = before - guard.len();
        if dropped > 0 {
            debug!(target: "app::cache", prefix, dropped, "dropped cache entries");
        }
        dropped
    }
}
