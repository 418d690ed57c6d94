//! 贴纸板更新
//!
//! 放置消耗与贴纸板写入在同一个工作单元内：消耗被拒绝或版本冲突时整体回滚，
//! 额度不会被扣除。幂等门已获取租约时（[`LedgerTicket`]），账本在同一事务内
//! 以租约 epoch 为条件完成。

use std::sync::Arc;

use serde_json::json;

use shared::models::{Board, BoardUpdate};
use shared::util::now_millis;

use crate::audit::{AuditAction, AuditService};
use crate::auth::CurrentUser;
use crate::db::UnitOfWork;
use crate::db::repository::{board, ledger};
use crate::ledger::LedgerTicket;
use crate::utils::{AppError, AppResult, ErrorCode};

use super::placement::{
    ConsumeOutcome, ConsumedCredit, consume_for_non_owner_placement, consume_if_appending,
};

/// Result of an accepted board update
#[derive(Debug, Clone, PartialEq)]
pub struct BoardUpdated {
    pub board: Board,
    pub consumed: Option<ConsumedCredit>,
    /// Placement by someone other than the owner
    pub cheer: bool,
}

#[derive(Clone, Debug)]
pub struct BoardService {
    uow: UnitOfWork,
    audit: Arc<AuditService>,
}

impl BoardService {
    pub fn new(uow: UnitOfWork, audit: Arc<AuditService>) -> Self {
        Self { uow, audit }
    }

    pub async fn update(
        &self,
        actor: &CurrentUser,
        board_id: &str,
        update: BoardUpdate,
        ticket: Option<LedgerTicket>,
    ) -> AppResult<BoardUpdated> {
        let work_actor = actor.clone();
        let work_board_id = board_id.to_string();
        let work_ticket = ticket.clone();

        let updated = self
            .uow
            .run("board.update", move |conn| {
                Box::pin(async move {
                    let actor = work_actor;
                    let now = now_millis();

                    let current = board::find_by_id(&mut *conn, &work_board_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::new(ErrorCode::BoardNotFound)
                                .with_detail("boardId", work_board_id.clone())
                        })?;

                    let cheer = current.owner_id != actor.id && !actor.is_admin();
                    let (name, description, stickers, outcome) = if cheer {
                        let outcome = consume_for_non_owner_placement(
                            &mut *conn,
                            &actor.id,
                            &current.stickers,
                            &update,
                            now,
                        )
                        .await?;
                        // 只允许追加，其余字段保持原值
                        let stickers = update.stickers.clone().unwrap_or_default();
                        (current.name.clone(), current.description.clone(), stickers, outcome)
                    } else {
                        let stickers = update
                            .stickers
                            .clone()
                            .unwrap_or_else(|| current.stickers.clone());
                        let outcome =
                            consume_if_appending(&mut *conn, &actor, &current.stickers, &stickers, now)
                                .await?;
                        (
                            update.name.clone().unwrap_or_else(|| current.name.clone()),
                            update
                                .description
                                .clone()
                                .unwrap_or_else(|| current.description.clone()),
                            stickers,
                            outcome,
                        )
                    };

                    let consumed = match outcome {
                        ConsumeOutcome::Consumed(credit) => Some(credit),
                        ConsumeOutcome::NotRequired => None,
                        ConsumeOutcome::Rejected(e) => return Err(e),
                    };

                    let write = board::BoardWrite {
                        id: &current.id,
                        name: &name,
                        description: &description,
                        stickers: &stickers,
                        expected_version: current.version,
                        now,
                    };
                    if !board::update_cas(&mut *conn, &write).await? {
                        return Err(AppError::new(ErrorCode::BoardModified)
                            .with_detail("boardId", current.id.clone()));
                    }

                    if let Some(ticket) = &work_ticket {
                        let result = json!({
                            "boardId": current.id,
                            "version": current.version + 1,
                            "stickerCount": stickers.len(),
                        });
                        if !ledger::complete(&mut *conn, ticket.entry_id, ticket.epoch, Some(&result), now)
                            .await?
                        {
                            return Err(AppError::new(ErrorCode::LeaseLost));
                        }
                    }

                    Ok(BoardUpdated {
                        board: Board {
                            id: current.id,
                            owner_id: current.owner_id,
                            name,
                            description,
                            stickers,
                            version: current.version + 1,
                            updated_at: now,
                        },
                        consumed,
                        cheer,
                    })
                })
            })
            .await?;

        let op_id = ticket.map(|t| t.op_id);
        let (action, details) = match (&updated.consumed, updated.cheer) {
            (Some(credit), true) => (
                AuditAction::CheerPlaced,
                json!({ "boardId": updated.board.id, "stickerId": credit.sticker_id() }),
            ),
            (Some(credit), false) => (
                AuditAction::StickerConsumed,
                json!({ "boardId": updated.board.id, "stickerId": credit.sticker_id() }),
            ),
            (None, _) => (
                AuditAction::BoardUpdated,
                json!({ "version": updated.board.version, "stickerCount": updated.board.stickers.len() }),
            ),
        };
        tracing::info!(
            board_id = %updated.board.id,
            user_id = %actor.id,
            version = updated.board.version,
            action = %action,
            "Board updated"
        );
        self.audit.emit(
            action,
            "board",
            updated.board.id.clone(),
            Some(actor.id.clone()),
            op_id,
            details,
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{cheers, inventory};
    use crate::db::{Capabilities, DbService};
    use serde_json::{Value, json};

    const HEX: &str = "65a1b2c3d4e5f6a7b8c9d0e1";

    fn user(id: &str, role: &str) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            username: id.to_string(),
            role: role.to_string(),
        }
    }

    async fn setup() -> (DbService, BoardService) {
        let db = DbService::in_memory().await.unwrap();
        sqlx::query("INSERT INTO users (id, cheers) VALUES ('owner', '[]'), ('guest', '[2,5]')")
            .execute(&db.pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO boards (id, owner_id, name, description, stickers, version, updated_at) \
             VALUES ('b1', 'owner', 'Week 1', '', '[]', 1, 0)",
        )
        .execute(&db.pool)
        .await
        .unwrap();
        let (audit, _rx) = AuditService::new(db.pool.clone(), 16);
        let uow = UnitOfWork::new(db.pool.clone(), Capabilities { transactions: true });
        (db, BoardService::new(uow, audit))
    }

    fn placement(id: Value) -> BoardUpdate {
        BoardUpdate {
            stickers: Some(vec![json!({"stickerId": id, "x": 10.0, "y": 20.0})]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_guest_cheer_consumes_once() {
        let (db, svc) = setup().await;
        let guest = user("guest", "user");

        let updated = svc.update(&guest, "b1", placement(json!(2)), None).await.unwrap();
        assert!(updated.cheer);
        assert_eq!(updated.consumed, Some(ConsumedCredit::Legacy(2)));
        assert_eq!(updated.board.version, 2);
        assert_eq!(cheers::find_credits(&db.pool, "guest").await.unwrap(), Some(vec![5]));

        // 第二次放置相对旧列表不是追加
        let err = svc.update(&guest, "b1", placement(json!(2)), None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MustAppendSticker);
        let board = board::find_by_id(&db.pool, "b1").await.unwrap().unwrap();
        assert_eq!(board.stickers.len(), 1);
    }

    #[tokio::test]
    async fn test_guest_cannot_rename() {
        let (db, svc) = setup().await;
        let mut update = placement(json!(2));
        update.name = Some("mine now".into());

        let err = svc.update(&user("guest", "user"), "b1", update, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PlacementNotAllowed);
        assert_eq!(cheers::find_credits(&db.pool, "guest").await.unwrap(), Some(vec![2, 5]));
    }

    #[tokio::test]
    async fn test_missing_credit_rolls_back() {
        let (db, svc) = setup().await;
        let err = svc
            .update(&user("guest", "user"), "b1", placement(json!(9)), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CheerNotAvailable);
        let board = board::find_by_id(&db.pool, "b1").await.unwrap().unwrap();
        assert!(board.stickers.is_empty());
        assert_eq!(board.version, 1);
    }

    #[tokio::test]
    async fn test_owner_append_consumes_inventory() {
        let (db, svc) = setup().await;
        inventory::increment(&db.pool, "owner", HEX, 0).await.unwrap();

        let mut update = placement(json!(HEX));
        update.name = Some("Week 2".into());
        let updated = svc.update(&user("owner", "user"), "b1", update, None).await.unwrap();
        assert!(!updated.cheer);
        assert_eq!(updated.board.name, "Week 2");
        assert!(matches!(updated.consumed, Some(ConsumedCredit::Inventory { .. })));
        let item = inventory::find(&db.pool, "owner", HEX).await.unwrap().unwrap();
        assert_eq!(item.quantity, 0);

        let err = svc
            .update(
                &user("owner", "user"),
                "b1",
                BoardUpdate {
                    stickers: Some(vec![
                        updated.board.stickers[0].clone(),
                        json!({"stickerId": HEX, "x": 1, "y": 1}),
                    ]),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
    }

    #[tokio::test]
    async fn test_admin_places_without_stock() {
        let (_db, svc) = setup().await;
        let updated = svc
            .update(&user("root", "admin"), "b1", placement(json!(HEX)), None)
            .await
            .unwrap();
        assert_eq!(updated.consumed, None);
        assert_eq!(updated.board.stickers.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_board() {
        let (_db, svc) = setup().await;
        let err = svc
            .update(&user("owner", "user"), "nope", BoardUpdate::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BoardNotFound);
    }
}
