//! Connection pool monitoring
//!
//! Transactions begun through `begin_monitored` log how long the pool took to
//! hand out a connection and how long the transaction held it.

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::error::MarketResult;

/// Logs hold time when the transaction ends, however it ends
struct HoldTimer {
    caller: &'static str,
    acquired_at: Instant,
    outcome: &'static str,
}

impl Drop for HoldTimer {
    fn drop(&mut self) {
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms,
                outcome = self.outcome,
                "LONG TRANSACTION - connection held for extended period"
            );
        } else if held_ms > 1000 {
            tracing::info!(
                caller = self.caller,
                held_ms,
                outcome = self.outcome,
                "Transaction held longer than expected (>1s)"
            );
        } else {
            tracing::debug!(
                caller = self.caller,
                held_ms,
                outcome = self.outcome,
                "Connection released"
            );
        }
    }
}

/// Transaction wrapper with acquisition and hold-time logging.
///
/// Dereferences to the underlying connection so query helpers taking
/// `&mut SqliteConnection` work directly. Dropping without `commit` rolls
/// back.
pub struct MonitoredTransaction<'c> {
    tx: Transaction<'c, Sqlite>,
    timer: HoldTimer,
}

impl<'c> MonitoredTransaction<'c> {
    pub async fn commit(self) -> MarketResult<()> {
        let MonitoredTransaction { tx, mut timer } = self;
        timer.outcome = "commit";
        tx.commit().await?;
        Ok(())
    }
}

impl<'c> Deref for MonitoredTransaction<'c> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.tx
    }
}

impl<'c> DerefMut for MonitoredTransaction<'c> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

/// Begin a transaction, logging slow connection acquisition
pub async fn begin_monitored<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> MarketResult<MonitoredTransaction<'c>> {
    let start = Instant::now();
    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > 1000 {
        tracing::warn!(
            caller,
            wait_ms,
            "SLOW CONNECTION ACQUISITION - pool may be saturated"
        );
    } else {
        tracing::trace!(caller, wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction {
        tx,
        timer: HoldTimer {
            caller,
            acquired_at: Instant::now(),
            outcome: "rollback",
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_commit_persists_and_drop_rolls_back() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (v INTEGER)").execute(&pool).await.unwrap();

        let mut tx = begin_monitored(&pool, "test").await.unwrap();
        sqlx::query("INSERT INTO t VALUES (1)").execute(&mut *tx).await.unwrap();
        tx.commit().await.unwrap();

        {
            let mut tx = begin_monitored(&pool, "test").await.unwrap();
            sqlx::query("INSERT INTO t VALUES (2)").execute(&mut *tx).await.unwrap();
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
