//! 账本保留期清理
//!
//! 注册为 `TaskKind::Periodic`，按 `LEDGER_SWEEP_INTERVAL_SECS` 周期删除过期条目。

use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::db::repository::{RepoResult, ledger};

/// Periodic retention sweep over the operation ledger
pub struct LedgerSweeper {
    pool: SqlitePool,
    retention_ms: i64,
    interval: Duration,
    shutdown: CancellationToken,
}

impl LedgerSweeper {
    pub fn new(
        pool: SqlitePool,
        retention_ms: i64,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pool,
            retention_ms,
            interval,
            shutdown,
        }
    }

    /// One pass; returns the number of deleted entries
    pub async fn sweep_once(&self, now: i64) -> RepoResult<u64> {
        let cutoff = now - self.retention_ms;
        let removed = ledger::sweep_expired(&self.pool, cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, cutoff, "Ledger retention sweep removed expired entries");
        } else {
            tracing::debug!(cutoff, "Ledger retention sweep found nothing to remove");
        }
        Ok(removed)
    }

    /// 主循环：等待周期或 shutdown
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            retention_hours = self.retention_ms / 3_600_000,
            "Ledger sweeper started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Ledger sweeper received shutdown signal");
                    return;
                }
            }

            if let Err(e) = self.sweep_once(shared::util::now_millis()).await {
                tracing::error!(error = %e, "Ledger retention sweep failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    #[tokio::test]
    async fn test_sweep_once_uses_retention_window() {
        let db = DbService::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO operation_ledger (op_id, user_id, operation_type, status, payload, created_at) \
             VALUES ('a', 'u1', 'transferSticker', 'completed', '{}', 1000), \
                    ('b', 'u1', 'transferSticker', 'completed', '{}', 90000)",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let sweeper = LedgerSweeper::new(
            db.pool.clone(),
            50_000,
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        assert_eq!(sweeper.sweep_once(100_000).await.unwrap(), 1);

        let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM operation_ledger")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(left, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let db = DbService::in_memory().await.unwrap();
        let token = CancellationToken::new();
        let sweeper = LedgerSweeper::new(db.pool.clone(), 1, Duration::from_secs(3600), token.clone());

        let handle = tokio::spawn(sweeper.run());
        token.cancel();
        handle.await.unwrap();
    }
}
