//! 审计日志服务
//!
//! 业务路径只调用 [`AuditService::emit`]：非阻塞 `try_send`，通道满或关闭时
//! 丢弃并记录警告，绝不影响已提交的业务结果。

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::storage::{AuditRecord, AuditStorage, AuditStorageResult};
use super::types::{AuditAction, AuditChainVerification, AuditEntry, AuditQuery};

/// 审计日志服务
pub struct AuditService {
    storage: AuditStorage,
    tx: mpsc::Sender<AuditRecord>,
}

impl std::fmt::Debug for AuditService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditService")
            .field("capacity", &self.tx.max_capacity())
            .finish_non_exhaustive()
    }
}

impl AuditService {
    /// 创建审计服务，返回的 Receiver 交给 [`super::AuditWorker`]
    pub fn new(pool: SqlitePool, buffer_size: usize) -> (Arc<Self>, mpsc::Receiver<AuditRecord>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let service = Arc::new(Self {
            storage: AuditStorage::new(pool),
            tx,
        });
        (service, rx)
    }

    /// Fire-and-forget audit emission
    pub fn emit(
        &self,
        action: AuditAction,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        operator_id: Option<String>,
        op_id: Option<String>,
        details: serde_json::Value,
    ) {
        let record = AuditRecord {
            action,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            operator_id,
            op_id,
            details,
        };

        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                tracing::warn!(
                    action = %record.action,
                    resource_id = %record.resource_id,
                    "Audit channel full, event dropped"
                );
            }
            Err(TrySendError::Closed(record)) => {
                tracing::warn!(
                    action = %record.action,
                    resource_id = %record.resource_id,
                    "Audit channel closed, event dropped"
                );
            }
        }
    }

    /// 直接写入（启动/关闭等场景）
    pub async fn log_sync(
        &self,
        action: AuditAction,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        details: serde_json::Value,
    ) -> AuditStorageResult<AuditEntry> {
        self.storage
            .append(AuditRecord {
                action,
                resource_type: resource_type.into(),
                resource_id: resource_id.into(),
                operator_id: None,
                op_id: None,
                details,
            })
            .await
    }

    pub async fn query(&self, q: &AuditQuery) -> AuditStorageResult<(Vec<AuditEntry>, i64)> {
        self.storage.query(q).await
    }

    pub async fn verify_chain(
        &self,
        from: Option<i64>,
        to: Option<i64>,
    ) -> AuditStorageResult<AuditChainVerification> {
        self.storage.verify_chain(from, to).await
    }

    pub fn storage(&self) -> &AuditStorage {
        &self.storage
    }
}
