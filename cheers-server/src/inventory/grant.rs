//! 发放 / 撤回 / 管理员移除
//!
//! ```text
//! START → CHECK_LEDGER ─┬─ completed ─────────▶ Cached
//!                       ├─ leased by others ──▶ InProgress
//!                       └─ ACQUIRE_LEASE → MUTATE_INVENTORY → BACKFILL_METADATA
//!                                        → COMPLETE_LEDGER → COMMIT → EMIT_AUDIT
//! ```
//!
//! 全部账本与库存写入在同一个工作单元内完成。库存不足时账本标记为 failed
//! 并提交（终态业务结果）。基础设施错误回滚后，在事务外尽力把条目标记为
//! failed，使同一 opId 可以重试。

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use shared::models::{CachedAck, GrantResult, InventoryStickerId, OpId, OperationType};
use shared::util::now_millis;

use crate::audit::{AuditAction, AuditService};
use crate::db::UnitOfWork;
use crate::db::repository::{catalog, inventory, ledger};
use crate::ledger::{LedgerDecision, decide};
use crate::utils::{AppError, AppResult, ErrorCode};

const INSUFFICIENT_STOCK: &str = "insufficient stock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    Award,
    Revoke,
    /// Decrement and delete the row when it reaches zero
    AdminRemove,
}

impl GrantKind {
    fn operation_type(self) -> OperationType {
        match self {
            Self::Award => OperationType::TransferSticker,
            Self::Revoke | Self::AdminRemove => OperationType::RemoveSticker,
        }
    }

    fn audit_action(self) -> AuditAction {
        match self {
            Self::Award => AuditAction::StickerAwarded,
            Self::Revoke => AuditAction::StickerRevoked,
            Self::AdminRemove => AuditAction::StickerRemovedByAdmin,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Award => "inventory.award",
            Self::Revoke => "inventory.revoke",
            Self::AdminRemove => "inventory.admin_remove",
        }
    }
}

/// One award/revoke attempt
#[derive(Debug, Clone)]
pub struct GrantCommand {
    pub op_id: OpId,
    /// Lease owner (request correlation id)
    pub owner: String,
    pub actor_id: String,
    pub user_id: String,
    pub sticker_id: InventoryStickerId,
    /// Redacted request snapshot
    pub payload: Value,
}

/// Applied mutation, as returned to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantApplied {
    #[serde(flatten)]
    pub result: GrantResult,
    /// Row deleted at zero (admin remove only)
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Applied(GrantApplied),
    Cached(CachedAck),
    InProgress { retry_after_ms: i64 },
    /// Terminal: ledger entry is `failed`, quantity unchanged
    InsufficientStock,
}

/// Inventory award/revoke service
#[derive(Clone, Debug)]
pub struct InventoryService {
    uow: UnitOfWork,
    audit: Arc<AuditService>,
    lease_ttl_ms: i64,
}

impl InventoryService {
    pub fn new(uow: UnitOfWork, audit: Arc<AuditService>, lease_ttl_ms: i64) -> Self {
        Self {
            uow,
            audit,
            lease_ttl_ms,
        }
    }

    /// Award one unit, creating the row on first grant
    pub async fn award(&self, cmd: GrantCommand) -> AppResult<GrantOutcome> {
        self.execute(GrantKind::Award, cmd).await
    }

    /// Revoke one unit; the row is kept at zero
    pub async fn revoke(&self, cmd: GrantCommand) -> AppResult<GrantOutcome> {
        self.execute(GrantKind::Revoke, cmd).await
    }

    /// Admin remove; the row is deleted when it reaches zero
    pub async fn admin_remove(&self, cmd: GrantCommand) -> AppResult<GrantOutcome> {
        self.execute(GrantKind::AdminRemove, cmd).await
    }

    async fn execute(&self, kind: GrantKind, cmd: GrantCommand) -> AppResult<GrantOutcome> {
        let op_id = cmd.op_id.to_string();
        let lease_ttl_ms = self.lease_ttl_ms;
        let work_cmd = cmd.clone();
        let work_op_id = op_id.clone();

        let outcome = self
            .uow
            .run(kind.label(), move |conn| {
                Box::pin(async move {
                    let cmd = work_cmd;
                    let op_id = work_op_id;
                    let now = now_millis();

                    // CHECK_LEDGER
                    let existing = ledger::find_by_op_id(&mut *conn, &op_id).await?;
                    match decide(existing.as_ref(), now, &cmd.owner) {
                        LedgerDecision::Cached(ack) => return Ok(GrantOutcome::Cached(ack)),
                        LedgerDecision::InProgress { retry_after_ms } => {
                            return Ok(GrantOutcome::InProgress { retry_after_ms });
                        }
                        LedgerDecision::Proceed => {}
                    }

                    // ACQUIRE_LEASE
                    let lease = ledger::LeaseRequest {
                        op_id: &op_id,
                        user_id: &cmd.actor_id,
                        operation_type: kind.operation_type(),
                        batch_id: None,
                        owner: &cmd.owner,
                        payload: &cmd.payload,
                        now,
                        ttl_ms: lease_ttl_ms,
                    };
                    let (entry_id, epoch) = match ledger::acquire(&mut *conn, &lease).await? {
                        ledger::Acquired::Granted { entry_id, epoch } => (entry_id, epoch),
                        ledger::Acquired::Rejected(entry) => {
                            return Ok(match decide(Some(&entry), now, &cmd.owner) {
                                LedgerDecision::Cached(ack) => GrantOutcome::Cached(ack),
                                LedgerDecision::InProgress { retry_after_ms } => {
                                    GrantOutcome::InProgress { retry_after_ms }
                                }
                                LedgerDecision::Proceed => GrantOutcome::InProgress {
                                    retry_after_ms: lease_ttl_ms,
                                },
                            });
                        }
                    };

                    // MUTATE_INVENTORY
                    let sticker_id = cmd.sticker_id.as_str();
                    let mutated = match kind {
                        GrantKind::Award => {
                            Some(inventory::increment(&mut *conn, &cmd.user_id, sticker_id, now).await?)
                        }
                        GrantKind::Revoke | GrantKind::AdminRemove => {
                            inventory::decrement_if_available(&mut *conn, &cmd.user_id, sticker_id, now)
                                .await?
                        }
                    };
                    let Some(result) = mutated else {
                        ledger::fail(&mut *conn, entry_id, epoch, INSUFFICIENT_STOCK, now).await?;
                        return Ok(GrantOutcome::InsufficientStock);
                    };

                    let mut deleted = false;
                    if kind == GrantKind::AdminRemove && result.quantity == 0 {
                        deleted = inventory::delete_if_empty(&mut *conn, result.row_id).await?;
                    } else {
                        // BACKFILL_METADATA
                        backfill_pack_id(&mut *conn, result.row_id, sticker_id).await;
                    }

                    // COMPLETE_LEDGER
                    let stored = json!({ "rowId": result.row_id, "quantity": result.quantity });
                    if !ledger::complete(&mut *conn, entry_id, epoch, Some(&stored), now).await? {
                        return Err(AppError::new(ErrorCode::LeaseLost));
                    }

                    Ok(GrantOutcome::Applied(GrantApplied { result, deleted }))
                })
            })
            .await;

        match outcome {
            Ok(GrantOutcome::Applied(applied)) => {
                tracing::info!(
                    op_id = %op_id,
                    user_id = %cmd.user_id,
                    sticker_id = %cmd.sticker_id,
                    quantity = applied.result.quantity,
                    "{} applied",
                    kind.label()
                );
                // EMIT_AUDIT
                self.audit.emit(
                    kind.audit_action(),
                    "inventory",
                    format!("{}:{}", cmd.user_id, cmd.sticker_id),
                    Some(cmd.actor_id.clone()),
                    Some(op_id),
                    json!({
                        "rowId": applied.result.row_id,
                        "quantity": applied.result.quantity,
                        "deleted": applied.deleted,
                    }),
                );
                Ok(GrantOutcome::Applied(applied))
            }
            Ok(other) => {
                if other == GrantOutcome::InsufficientStock {
                    tracing::info!(op_id = %op_id, user_id = %cmd.user_id, sticker_id = %cmd.sticker_id, "Revoke rejected: insufficient stock");
                }
                Ok(other)
            }
            Err(err) => {
                tracing::warn!(op_id = %op_id, error = %err, "{} aborted", kind.label());
                let pool = self.uow.pool();
                if let Err(e) =
                    ledger::mark_failed_detached(pool, &op_id, &cmd.owner, &err.message, now_millis()).await
                {
                    tracing::error!(op_id = %op_id, error = %e, "Failed to mark ledger entry failed");
                }
                Err(err)
            }
        }
    }
}

/// Opportunistic pack id backfill; errors are logged, never propagated
async fn backfill_pack_id(conn: &mut sqlx::SqliteConnection, row_id: i64, sticker_id: &str) {
    match catalog::find_pack_id(&mut *conn, sticker_id).await {
        Ok(Some(pack_id)) => {
            if let Err(e) = inventory::backfill_pack_id(&mut *conn, row_id, &pack_id).await {
                tracing::warn!(row_id, error = %e, "Pack id backfill failed");
            }
        }
        Ok(None) => {
            tracing::debug!(sticker_id, "Sticker not in catalog, pack id left empty");
        }
        Err(e) => {
            tracing::warn!(sticker_id, error = %e, "Catalog lookup failed");
        }
    }
}
