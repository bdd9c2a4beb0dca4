//! Database retry logic
//!
//! Exponential backoff for transactional units that fail because SQLite
//! reported the database busy or locked. The whole unit is re-run from the
//! start; domain errors are returned immediately.

use std::time::{Duration, Instant};

use crate::error::{MarketError, MarketResult};

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

/// SQLITE_BUSY / SQLITE_LOCKED, including their extended codes
fn is_busy_code(code: &str) -> bool {
    code.parse::<i32>()
        .map(|c| matches!(c & 0xff, 5 | 6))
        .unwrap_or(false)
}

/// True when the error is a transient lock conflict
pub fn is_busy(err: &MarketError) -> bool {
    let MarketError::Database(db_err) = err else {
        return false;
    };
    if let Some(code) = db_err.as_database_error().and_then(|e| e.code()) {
        if is_busy_code(&code) {
            return true;
        }
    }
    let message = db_err.to_string();
    message.contains("database is locked") || message.contains("database table is locked")
}

/// Retry `operation` while it fails with a lock conflict, for at most
/// `max_wait_ms` in total.
///
/// Backoff starts at 10ms and doubles up to 1s. When the budget runs out the
/// last lock error is returned.
pub async fn retry_on_busy<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> MarketResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = MarketResult<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    let elapsed_ms = start_time.elapsed().as_millis();
                    if elapsed_ms > 2000 {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after significant retry period (>2s)"
                        );
                    } else {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after retry"
                        );
                    }
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_busy(&err) {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        max_wait_ms,
                        "Database still locked, giving up"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn locked() -> MarketError {
        MarketError::Database(sqlx::Error::Protocol("database is locked".into()))
    }

    #[test]
    fn test_busy_codes() {
        assert!(is_busy_code("5"));
        assert!(is_busy_code("6"));
        assert!(is_busy_code("517"));
        assert!(is_busy_code("262"));
        assert!(!is_busy_code("19"));
        assert!(!is_busy_code("2067"));
        assert!(!is_busy_code("SQLITE_BUSY"));
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let result = retry_on_busy("test_op", 1000, || async { Ok::<_, MarketError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_lock_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = retry_on_busy("test_op", 5000, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(locked())
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_domain_errors_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: MarketResult<()> = retry_on_busy("test_op", 5000, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(MarketError::NothingToClaim)
            }
        })
        .await;
        assert!(matches!(result, Err(MarketError::NothingToClaim)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let result: MarketResult<()> = retry_on_busy("test_op", 30, || async { Err(locked()) }).await;
        assert!(is_busy(&result.unwrap_err()));
    }
}
