use std::future::Future;
use std::time::Duration;

/// How a raced operation resolved.
#[derive(Debug)]
pub enum Raced<T, E> {
    /// The primary future finished within the limit.
    Completed(T),
    /// The limit elapsed first; the fallback value was substituted.
    TimedOut(T),
    /// The primary future failed within the limit; the fallback value was
    /// substituted and the error is carried for the caller to log.
    FailedWithFallback(T, E),
}

impl<T, E> Raced<T, E> {
    pub fn into_value(self) -> T {
        match self {
            Raced::Completed(value) => value,
            Raced::TimedOut(value) => value,
            Raced::FailedWithFallback(value, _) => value,
        }
    }
}

/// Race a primary future against a timer, substituting a fallback value when
/// the timer fires first or the primary fails. With no fallback available the
/// primary is awaited unconditionally, however long it takes, and its error
/// propagates.
///
/// The timer only decides which value is returned; it never cancels whatever
/// work backs the primary future. Callers that need the work to survive the
/// race must spawn it and pass a handle-shaped future here.
pub async fn race_with_fallback<T, E, F>(
    primary: F,
    limit: Duration,
    fallback: Option<T>,
) -> Result<Raced<T, E>, E>
where
    F: Future<Output = Result<T, E>>,
{
    match fallback {
        None => primary.await.map(Raced::Completed),
        Some(stale) => match tokio::time::timeout(limit, primary).await {
            Ok(Ok(value)) => Ok(Raced::Completed(value)),
            Ok(Err(err)) => Ok(Raced::FailedWithFallback(stale, err)),
            Err(_elapsed) => Ok(Raced::TimedOut(stale)),
        },
    }
}
