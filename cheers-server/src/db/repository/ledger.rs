//! Operation Ledger Repository
//!
//! The unique index on `op_id` is the only arbiter between concurrent first
//! sightings of an opId. Every terminal write is fenced by `lease_epoch`.

use serde_json::Value;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};

use super::{RepoError, RepoResult};
use shared::models::{LedgerEntry, OperationStatus, OperationType};

const COLUMNS: &str = "id, op_id, user_id, operation_type, batch_id, status, lock_owner, \
                       lock_expires_at, lease_epoch, payload, result, error_message, \
                       created_at, completed_at";

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: i64,
    op_id: String,
    user_id: String,
    operation_type: OperationType,
    batch_id: Option<String>,
    status: OperationStatus,
    lock_owner: Option<String>,
    lock_expires_at: Option<i64>,
    lease_epoch: i64,
    payload: String,
    result: Option<String>,
    error_message: Option<String>,
    created_at: i64,
    completed_at: Option<i64>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = RepoError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: row.id,
            op_id: row.op_id,
            user_id: row.user_id,
            operation_type: row.operation_type,
            batch_id: row.batch_id,
            status: row.status,
            lock_owner: row.lock_owner,
            lock_expires_at: row.lock_expires_at,
            lease_epoch: row.lease_epoch,
            payload: serde_json::from_str(&row.payload)?,
            result: row.result.as_deref().map(serde_json::from_str).transpose()?,
            created_at: row.created_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
        })
    }
}

/// Lease request for [`acquire`]
#[derive(Debug, Clone)]
pub struct LeaseRequest<'a> {
    pub op_id: &'a str,
    pub user_id: &'a str,
    pub operation_type: OperationType,
    pub batch_id: Option<&'a str>,
    /// Request correlation id
    pub owner: &'a str,
    /// Already redacted
    pub payload: &'a Value,
    pub now: i64,
    pub ttl_ms: i64,
}

/// Outcome of an [`acquire`] attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Acquired {
    /// Caller holds the lease (fresh insert, reclaim, or re-entry by the same owner)
    Granted { entry_id: i64, epoch: i64 },
    /// Entry is completed or actively held by another owner
    Rejected(LedgerEntry),
}

/// Find a ledger entry by opId
pub async fn find_by_op_id<'e, E>(executor: E, op_id: &str) -> RepoResult<Option<LedgerEntry>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {COLUMNS} FROM operation_ledger WHERE op_id = ?");
    let row: Option<LedgerRow> = sqlx::query_as(&sql)
        .bind(op_id)
        .fetch_optional(executor)
        .await?;
    row.map(LedgerEntry::try_from).transpose()
}

/// Insert a pending entry or take over an existing one
///
/// Takeover is allowed for `failed` entries, for `pending` entries whose lease
/// expired, and for `pending` entries already leased to the same owner. The
/// epoch is bumped on every takeover by a different owner.
pub async fn acquire(conn: &mut SqliteConnection, lease: &LeaseRequest<'_>) -> RepoResult<Acquired> {
    let payload = serde_json::to_string(lease.payload)?;
    let expires_at = lease.now + lease.ttl_ms;

    let granted: Option<(i64, i64)> = sqlx::query_as(
        r#"
        INSERT INTO operation_ledger
            (op_id, user_id, operation_type, batch_id, status, lock_owner, lock_expires_at,
             lease_epoch, payload, created_at)
        VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, 1, ?7, ?8)
        ON CONFLICT(op_id) DO UPDATE SET
            status = 'pending',
            lock_owner = excluded.lock_owner,
            lock_expires_at = excluded.lock_expires_at,
            lease_epoch = CASE
                WHEN operation_ledger.status = 'pending'
                     AND operation_ledger.lock_owner = excluded.lock_owner
                THEN operation_ledger.lease_epoch
                ELSE operation_ledger.lease_epoch + 1
            END,
            payload = excluded.payload,
            error_message = NULL,
            completed_at = NULL
        WHERE operation_ledger.status = 'failed'
           OR (operation_ledger.status = 'pending'
               AND (operation_ledger.lock_expires_at IS NULL
                    OR operation_ledger.lock_expires_at <= ?8
                    OR operation_ledger.lock_owner = excluded.lock_owner))
        RETURNING id, lease_epoch
        "#,
    )
    .bind(lease.op_id)
    .bind(lease.user_id)
    .bind(lease.operation_type)
    .bind(lease.batch_id)
    .bind(lease.owner)
    .bind(expires_at)
    .bind(payload)
    .bind(lease.now)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((entry_id, epoch)) = granted {
        return Ok(Acquired::Granted { entry_id, epoch });
    }

    find_by_op_id(&mut *conn, lease.op_id)
        .await?
        .map(Acquired::Rejected)
        .ok_or_else(|| RepoError::NotFound(format!("Ledger entry {} vanished", lease.op_id)))
}

/// Mark an entry completed
///
/// Returns `false` when the write was fenced (epoch moved on) or the entry is
/// already `failed`. An existing result is kept.
pub async fn complete<'e, E>(
    executor: E,
    entry_id: i64,
    epoch: i64,
    result: Option<&Value>,
    now: i64,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = result.map(serde_json::to_string).transpose()?;
    let done = sqlx::query(
        r#"
        UPDATE operation_ledger
        SET status = 'completed',
            result = COALESCE(result, ?3),
            completed_at = COALESCE(completed_at, ?4),
            lock_owner = NULL,
            lock_expires_at = NULL
        WHERE id = ?1 AND lease_epoch = ?2 AND status IN ('pending', 'completed')
        "#,
    )
    .bind(entry_id)
    .bind(epoch)
    .bind(result)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(done.rows_affected() > 0)
}

/// Mark an entry failed; never overwrites a completed entry
pub async fn fail<'e, E>(
    executor: E,
    entry_id: i64,
    epoch: i64,
    error_message: &str,
    now: i64,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let done = sqlx::query(
        r#"
        UPDATE operation_ledger
        SET status = 'failed',
            error_message = COALESCE(error_message, ?3),
            completed_at = COALESCE(completed_at, ?4),
            lock_owner = NULL,
            lock_expires_at = NULL
        WHERE id = ?1 AND lease_epoch = ?2 AND status IN ('pending', 'failed')
        "#,
    )
    .bind(entry_id)
    .bind(epoch)
    .bind(error_message)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(done.rows_affected() > 0)
}

/// Best-effort failure mark outside an aborted transaction
///
/// Conditioned on the lease owner so a reclaimer's attempt is never touched.
pub async fn mark_failed_detached(
    pool: &SqlitePool,
    op_id: &str,
    owner: &str,
    error_message: &str,
    now: i64,
) -> RepoResult<bool> {
    let done = sqlx::query(
        r#"
        UPDATE operation_ledger
        SET status = 'failed',
            error_message = ?3,
            completed_at = ?4,
            lock_owner = NULL,
            lock_expires_at = NULL
        WHERE op_id = ?1 AND lock_owner = ?2 AND status = 'pending'
        "#,
    )
    .bind(op_id)
    .bind(owner)
    .bind(error_message)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(done.rows_affected() > 0)
}

/// Delete entries created before `cutoff`
///
/// Terminal entries go unconditionally; pending ones only when their lease
/// also expired before the cutoff.
pub async fn sweep_expired(pool: &SqlitePool, cutoff: i64) -> RepoResult<u64> {
    let done = sqlx::query(
        r#"
        DELETE FROM operation_ledger
        WHERE created_at < ?1
          AND (status IN ('completed', 'failed')
               OR lock_expires_at IS NULL
               OR lock_expires_at < ?1)
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(done.rows_affected())
}
