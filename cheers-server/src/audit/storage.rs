//! 审计日志 SQLite 存储层
//!
//! Append-only：只有 `append` / `query` / `verify_chain`，没有删除和更新接口。
//! SHA256 哈希链确保防篡改。

use std::sync::Arc;

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;

use super::types::{AuditAction, AuditChainBreak, AuditChainVerification, AuditEntry, AuditQuery};

const GENESIS_HASH: &str = "genesis";
const MAX_PAGE: i64 = 500;

#[derive(Debug, Error)]
pub enum AuditStorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unknown audit action: {0}")]
    UnknownAction(String),
}

pub type AuditStorageResult<T> = Result<T, AuditStorageError>;

impl From<AuditStorageError> for shared::error::AppError {
    fn from(err: AuditStorageError) -> Self {
        shared::error::AppError::internal(err.to_string())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    sequence: i64,
    timestamp: i64,
    action: String,
    resource_type: String,
    resource_id: String,
    operator_id: Option<String>,
    op_id: Option<String>,
    details: String,
    prev_hash: String,
    curr_hash: String,
}

impl AuditRow {
    fn recompute_hash(&self) -> String {
        compute_audit_hash(&HashInput {
            prev_hash: &self.prev_hash,
            sequence: self.sequence,
            timestamp: self.timestamp,
            action: &self.action,
            resource_type: &self.resource_type,
            resource_id: &self.resource_id,
            operator_id: self.operator_id.as_deref(),
            op_id: self.op_id.as_deref(),
            details_json: &self.details,
        })
    }
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = AuditStorageError;

    fn try_from(r: AuditRow) -> Result<Self, Self::Error> {
        let action =
            AuditAction::parse(&r.action).ok_or_else(|| AuditStorageError::UnknownAction(r.action.clone()))?;
        Ok(AuditEntry {
            id: r.sequence,
            timestamp: r.timestamp,
            action,
            resource_type: r.resource_type,
            resource_id: r.resource_id,
            operator_id: r.operator_id,
            op_id: r.op_id,
            details: serde_json::from_str(&r.details)?,
            prev_hash: r.prev_hash,
            curr_hash: r.curr_hash,
        })
    }
}

/// 待写入的审计事件
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: String,
    pub operator_id: Option<String>,
    pub op_id: Option<String>,
    pub details: serde_json::Value,
}

/// 审计日志存储 (SQLite)
#[derive(Clone)]
pub struct AuditStorage {
    pool: SqlitePool,
    /// 序列化所有 append 操作，防止 read-modify-write 竞争
    append_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AuditStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            append_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// 追加一条审计日志
    ///
    /// 1. 查询当前最大序列号和 last_hash
    /// 2. 计算新条目的哈希
    /// 3. 写入条目
    pub async fn append(&self, record: AuditRecord) -> AuditStorageResult<AuditEntry> {
        let _guard = self.append_lock.lock().await;

        let last: Option<(i64, String)> =
            sqlx::query_as("SELECT sequence, curr_hash FROM audit_log ORDER BY sequence DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        let (sequence, prev_hash) = match last {
            Some((seq, hash)) => (seq + 1, hash),
            None => (1, GENESIS_HASH.to_string()),
        };

        let timestamp = shared::util::now_millis();
        // 哈希基于存储的原始文本，读回时无需规范化
        let details_json = serde_json::to_string(&record.details)?;
        let curr_hash = compute_audit_hash(&HashInput {
            prev_hash: &prev_hash,
            sequence,
            timestamp,
            action: record.action.as_str(),
            resource_type: &record.resource_type,
            resource_id: &record.resource_id,
            operator_id: record.operator_id.as_deref(),
            op_id: record.op_id.as_deref(),
            details_json: &details_json,
        });

        sqlx::query(
            r#"
            INSERT INTO audit_log
                (sequence, timestamp, action, resource_type, resource_id, operator_id, op_id,
                 details, prev_hash, curr_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sequence)
        .bind(timestamp)
        .bind(record.action.as_str())
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(&record.operator_id)
        .bind(&record.op_id)
        .bind(&details_json)
        .bind(&prev_hash)
        .bind(&curr_hash)
        .execute(&self.pool)
        .await?;

        Ok(AuditEntry {
            id: sequence,
            timestamp,
            action: record.action,
            resource_type: record.resource_type,
            resource_id: record.resource_id,
            operator_id: record.operator_id,
            op_id: record.op_id,
            details: record.details,
            prev_hash,
            curr_hash,
        })
    }

    /// 查询审计日志（倒序分页）
    pub async fn query(&self, q: &AuditQuery) -> AuditStorageResult<(Vec<AuditEntry>, i64)> {
        const FILTER: &str = "(?1 IS NULL OR timestamp >= ?1) \
             AND (?2 IS NULL OR timestamp <= ?2) \
             AND (?3 IS NULL OR action = ?3) \
             AND (?4 IS NULL OR operator_id = ?4) \
             AND (?5 IS NULL OR resource_type = ?5)";

        let action = q.action.map(|a| a.as_str());
        let limit = q.limit.clamp(1, MAX_PAGE);
        let offset = q.offset.max(0);

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM audit_log WHERE {FILTER}"))
            .bind(q.from)
            .bind(q.to)
            .bind(action)
            .bind(q.operator_id.as_deref())
            .bind(q.resource_type.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<AuditRow> = sqlx::query_as(&format!(
            "SELECT * FROM audit_log WHERE {FILTER} ORDER BY sequence DESC LIMIT ?6 OFFSET ?7"
        ))
        .bind(q.from)
        .bind(q.to)
        .bind(action)
        .bind(q.operator_id.as_deref())
        .bind(q.resource_type.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(AuditEntry::try_from)
            .collect::<AuditStorageResult<Vec<_>>>()?;
        Ok((entries, total))
    }

    /// 验证审计链完整性（按序列号区间，含两端）
    pub async fn verify_chain(
        &self,
        from: Option<i64>,
        to: Option<i64>,
    ) -> AuditStorageResult<AuditChainVerification> {
        let from = from.unwrap_or(1).max(1);
        let to = to.unwrap_or(i64::MAX);

        // 区间起点的前驱哈希
        let mut expected_prev = if from == 1 {
            GENESIS_HASH.to_string()
        } else {
            let prev: Option<(String,)> =
                sqlx::query_as("SELECT curr_hash FROM audit_log WHERE sequence = ?")
                    .bind(from - 1)
                    .fetch_optional(&self.pool)
                    .await?;
            prev.map(|(h,)| h).unwrap_or_else(|| GENESIS_HASH.to_string())
        };

        let rows: Vec<AuditRow> = sqlx::query_as(
            "SELECT * FROM audit_log WHERE sequence >= ? AND sequence <= ? ORDER BY sequence ASC",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut breaks = Vec::new();
        for row in &rows {
            let hash_mismatch = row.recompute_hash() != row.curr_hash;
            if row.prev_hash != expected_prev || hash_mismatch {
                breaks.push(AuditChainBreak {
                    entry_id: row.sequence,
                    expected_prev_hash: expected_prev.clone(),
                    actual_prev_hash: row.prev_hash.clone(),
                    hash_mismatch,
                });
            }
            expected_prev = row.curr_hash.clone();
        }

        Ok(AuditChainVerification {
            total_entries: rows.len() as i64,
            chain_intact: breaks.is_empty(),
            breaks,
        })
    }
}

struct HashInput<'a> {
    prev_hash: &'a str,
    sequence: i64,
    timestamp: i64,
    action: &'a str,
    resource_type: &'a str,
    resource_id: &'a str,
    operator_id: Option<&'a str>,
    op_id: Option<&'a str>,
    details_json: &'a str,
}

/// 计算审计条目的 SHA256 哈希
///
/// - 变长字段间用 `\x00` 分隔，防止 `("ab","cd")` 与 `("abc","d")` 碰撞
/// - 定长字段用 LE 字节序
/// - Optional 字段用 `\x00`=None / `\x01`+bytes=Some 区分
fn compute_audit_hash(input: &HashInput<'_>) -> String {
    let mut hasher = Sha256::new();

    hasher.update(input.prev_hash.as_bytes());
    hasher.update(b"\x00");

    hasher.update(input.sequence.to_le_bytes());
    hasher.update(input.timestamp.to_le_bytes());

    for field in [input.action, input.resource_type, input.resource_id] {
        hasher.update(field.as_bytes());
        hasher.update(b"\x00");
    }

    hash_optional(&mut hasher, input.operator_id);
    hash_optional(&mut hasher, input.op_id);

    hasher.update(input.details_json.as_bytes());
    hasher.update(b"\x00");

    hex::encode(hasher.finalize())
}

fn hash_optional(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update(b"\x01");
            hasher.update(v.as_bytes());
        }
        None => {
            hasher.update(b"\x00");
        }
    }
    hasher.update(b"\x00");
}
