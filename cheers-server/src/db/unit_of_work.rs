//! Unit of work
//!
//! ```text
//! run(label, work)
//!   ├─ capabilities.transactions = true
//!   │     BEGIN IMMEDIATE → work(&mut tx) ─ Ok  → COMMIT
//!   │                                    └ Err → ROLLBACK → Err
//!   └─ capabilities.transactions = false
//!         acquire → work(&mut conn)   (autocommit, best-effort sequential)
//! ```
//!
//! The connection (or transaction) is released exactly once on every path:
//! commit/rollback consume the transaction, the pooled connection returns to
//! the pool when dropped. Work closures must capture owned data only and must
//! not touch the pool while they hold the connection.
//!
//! Units read before they write, so they open with `BEGIN IMMEDIATE`. Under a
//! deferred `BEGIN` the first write fails with `SQLITE_BUSY_SNAPSHOT` after a
//! concurrent commit; with the write lock taken up front `busy_timeout` queues them.

use futures::future::BoxFuture;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use super::repository::RepoError;
use crate::core::config::TransactionMode;
use crate::utils::{AppError, AppResult, ErrorCode};

const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// Future returned by a unit of work closure
pub type WorkFuture<'c, T> = BoxFuture<'c, AppResult<T>>;

/// 数据存储能力，启动时探测一次并缓存
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub transactions: bool,
}

impl Capabilities {
    /// Probe transaction support according to the configured mode
    pub async fn probe(pool: &SqlitePool, mode: TransactionMode) -> AppResult<Self> {
        if mode == TransactionMode::Disabled {
            tracing::warn!(
                "Transactions disabled by configuration, mutations run as best-effort sequential steps"
            );
            return Ok(Self {
                transactions: false,
            });
        }

        match probe_transaction(pool).await {
            Ok(()) => {
                tracing::info!("Datastore supports transactions");
                Ok(Self { transactions: true })
            }
            Err(e) if mode == TransactionMode::Required => Err(AppError::with_message(
                ErrorCode::TransactionUnsupported,
                format!("Transaction probe failed: {e}"),
            )),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Transaction probe failed, falling back to best-effort sequential execution"
                );
                Ok(Self {
                    transactions: false,
                })
            }
        }
    }
}

async fn probe_transaction(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT 1").execute(&mut *tx).await?;
    tx.rollback().await
}

/// Transactional boundary for a mutation plus its ledger bookkeeping
#[derive(Clone, Debug)]
pub struct UnitOfWork {
    pool: SqlitePool,
    capabilities: Capabilities,
}

impl UnitOfWork {
    pub fn new(pool: SqlitePool, capabilities: Capabilities) -> Self {
        Self { pool, capabilities }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `work` inside a transaction when supported, otherwise sequentially
    pub async fn run<T, F>(&self, label: &'static str, work: F) -> AppResult<T>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> WorkFuture<'c, T> + Send,
        T: Send,
    {
        if !self.capabilities.transactions {
            tracing::debug!(unit = label, "Running unit of work without transaction");
            let mut conn = self.pool.acquire().await.map_err(RepoError::from)?;
            return work(&mut conn).await;
        }

        let mut tx = self.pool.begin_with(BEGIN_WRITE).await.map_err(RepoError::from)?;
        match work(&mut tx).await {
            Ok(value) => {
                tx.commit().await.map_err(RepoError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(unit = label, error = %rollback_err, "Rollback failed");
                }
                tracing::debug!(unit = label, error = %err, "Unit of work aborted");
                Err(err)
            }
        }
    }
}
