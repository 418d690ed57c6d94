//! 审计日志后台 Worker
//!
//! 从 mpsc 通道消费 [`AuditRecord`]，写入哈希链存储。通道关闭时退出。

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::storage::{AuditRecord, AuditStorage};

pub struct AuditWorker {
    storage: AuditStorage,
}

impl AuditWorker {
    pub fn new(storage: AuditStorage) -> Self {
        Self { storage }
    }

    /// 运行 worker，直到通道关闭或收到 shutdown（先写完已排队的事件）
    pub async fn run(self, mut rx: mpsc::Receiver<AuditRecord>, shutdown: CancellationToken) {
        tracing::info!("Audit log worker started");

        loop {
            tokio::select! {
                record = rx.recv() => match record {
                    Some(record) => self.write(record).await,
                    None => break,
                },
                _ = shutdown.cancelled() => {
                    rx.close();
                    while let Some(record) = rx.recv().await {
                        self.write(record).await;
                    }
                    break;
                }
            }
        }

        tracing::info!("Audit log worker stopped");
    }

    async fn write(&self, record: AuditRecord) {
        match self.storage.append(record).await {
            Ok(entry) => {
                tracing::debug!(
                    audit_id = entry.id,
                    action = %entry.action,
                    resource = %entry.resource_type,
                    "Audit entry recorded"
                );
            }
            Err(e) => {
                // 审计失败只记录，不回滚业务
                tracing::error!(error = %e, "Failed to write audit entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, AuditQuery, AuditService};
    use crate::db::DbService;
    use serde_json::json;

    #[tokio::test]
    async fn test_worker_drains_channel() {
        let db = DbService::in_memory().await.unwrap();
        let (service, rx) = AuditService::new(db.pool.clone(), 8);
        let worker = AuditWorker::new(service.storage().clone());

        service.emit(AuditAction::StickerAwarded, "inventory", "a", Some("admin".into()), None, json!({}));
        service.emit(AuditAction::StickerRevoked, "inventory", "a", Some("admin".into()), None, json!({}));

        // 关闭发送端后 worker 处理完剩余事件再退出
        let storage = service.storage().clone();
        drop(service);
        worker.run(rx, CancellationToken::new()).await;

        let (items, total) = storage
            .query(&AuditQuery {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].action, AuditAction::StickerRevoked);
    }

    #[tokio::test]
    async fn test_worker_drains_on_shutdown() {
        let db = DbService::in_memory().await.unwrap();
        let (service, rx) = AuditService::new(db.pool.clone(), 8);
        let worker = AuditWorker::new(service.storage().clone());
        let token = CancellationToken::new();

        service.emit(AuditAction::BoardUpdated, "board", "b1", None, None, json!({}));
        token.cancel();
        // 发送端仍存活，依靠 shutdown 退出
        worker.run(rx, token).await;

        let (_, total) = service.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(total, 1);
    }
}
