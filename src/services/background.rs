use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::AppResult;

const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Bounded fire-and-forget executor for work detached from a caller's control
/// flow (snapshot upserts, cache warming). Failures are logged and swallowed,
/// never surfaced and never retried.
#[derive(Clone)]
pub struct BackgroundRunner {
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
}

impl Default for BackgroundRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl BackgroundRunner {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Submit a task. Returns immediately; completion, success, or failure is
    /// never reported back to the submitter.
    pub fn submit<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            };

            match task.await {
                Ok(()) => debug!(target: "app::background", label, "background task finished"),
                Err(err) => {
                    warn!(target: "app::background", label, error = %err, "background task failed")
                }
            }

            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Test helper: poll until every submitted task has finished.
    pub async fn wait_idle(&self) {
        while self.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
