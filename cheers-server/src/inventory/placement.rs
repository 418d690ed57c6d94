//! 放置消耗策略
//!
//! 两条路径都在调用方的工作单元内执行：
//!
//! - 非所有者：请求必须恰好在原列表末尾追加一枚贴纸，且不带其它字段；
//!   按 id 形态消耗一份 legacy cheers 额度或一件库存。
//! - 所有者/管理员：列表恰好增长一项且追加的是库存贴纸时消耗一件；
//!   管理员库存不足时仍允许放置。
//!
//! 业务拒绝以 [`ConsumeOutcome::Rejected`] 返回，不作为错误传播。

use serde_json::Value;
use sqlx::SqliteConnection;

use shared::models::{BoardUpdate, GrantResult, PlacedSticker, StickerRef};

use crate::auth::CurrentUser;
use crate::db::repository::{RepoResult, cheers, inventory};
use crate::utils::{AppError, ErrorCode};

/// Credit consumed by an accepted placement
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumedCredit {
    Legacy(i64),
    Inventory {
        sticker_id: String,
        remaining: GrantResult,
    },
}

impl ConsumedCredit {
    pub fn sticker_id(&self) -> String {
        match self {
            Self::Legacy(id) => id.to_string(),
            Self::Inventory { sticker_id, .. } => sticker_id.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ConsumeOutcome {
    Consumed(ConsumedCredit),
    /// Nothing to consume (not an append, lenient id, or admin without stock)
    NotRequired,
    Rejected(AppError),
}

/// Non-owner placement: validate the append, then consume exactly one credit
pub async fn consume_for_non_owner_placement(
    conn: &mut SqliteConnection,
    actor_id: &str,
    previous: &[Value],
    update: &BoardUpdate,
    now: i64,
) -> RepoResult<ConsumeOutcome> {
    let extra = update.non_sticker_fields();
    if !extra.is_empty() {
        return Ok(ConsumeOutcome::Rejected(
            AppError::new(ErrorCode::PlacementNotAllowed).with_detail("fields", extra),
        ));
    }

    let candidate = match appended_sticker(previous, update.stickers.as_deref()) {
        Some(value) => value,
        None => return Ok(ConsumeOutcome::Rejected(AppError::new(ErrorCode::MustAppendSticker))),
    };

    let placed = match PlacedSticker::from_value(candidate) {
        Ok(placed) => placed,
        Err(e) => return Ok(ConsumeOutcome::Rejected(e)),
    };

    match placed.sticker {
        StickerRef::Legacy(id) => {
            if cheers::remove_if_present(&mut *conn, actor_id, id).await? {
                Ok(ConsumeOutcome::Consumed(ConsumedCredit::Legacy(id)))
            } else {
                Ok(ConsumeOutcome::Rejected(
                    AppError::new(ErrorCode::CheerNotAvailable).with_detail("stickerId", id),
                ))
            }
        }
        StickerRef::Inventory(id) => {
            match inventory::decrement_if_available(&mut *conn, actor_id, id.as_str(), now).await? {
                Some(remaining) => Ok(ConsumeOutcome::Consumed(ConsumedCredit::Inventory {
                    sticker_id: id.to_string(),
                    remaining,
                })),
                None => Ok(ConsumeOutcome::Rejected(AppError::insufficient_stock(id.as_str()))),
            }
        }
    }
}

/// Owner/admin append: consume one inventory unit when an inventory sticker is appended
pub async fn consume_if_appending(
    conn: &mut SqliteConnection,
    actor: &CurrentUser,
    previous: &[Value],
    next: &[Value],
    now: i64,
) -> RepoResult<ConsumeOutcome> {
    if next.len() != previous.len() + 1 {
        return Ok(ConsumeOutcome::NotRequired);
    }

    // 所有者的 legacy / 不可识别 id 不消耗
    let sticker_id = match next
        .last()
        .and_then(|v| v.get("stickerId"))
        .and_then(|raw| StickerRef::resolve(raw).ok())
    {
        Some(StickerRef::Inventory(id)) => id,
        _ => return Ok(ConsumeOutcome::NotRequired),
    };

    match inventory::decrement_if_available(&mut *conn, &actor.id, sticker_id.as_str(), now).await? {
        Some(remaining) => Ok(ConsumeOutcome::Consumed(ConsumedCredit::Inventory {
            sticker_id: sticker_id.to_string(),
            remaining,
        })),
        None if actor.is_admin() => {
            tracing::info!(
                user_id = %actor.id,
                sticker_id = %sticker_id,
                "Admin placement without inventory permitted"
            );
            Ok(ConsumeOutcome::NotRequired)
        }
        None => Ok(ConsumeOutcome::Rejected(AppError::insufficient_stock(sticker_id.as_str()))),
    }
}

/// The single appended element, if `next` is `previous` plus exactly one sticker
fn appended_sticker<'a>(previous: &[Value], next: Option<&'a [Value]>) -> Option<&'a Value> {
    let next = next?;
    if next.len() != previous.len() + 1 || next[..previous.len()] != *previous {
        return None;
    }
    next.last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use serde_json::json;

    const HEX: &str = "65a1b2c3d4e5f6a7b8c9d0e1";

    fn user(id: &str, role: &str) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            username: id.to_string(),
            role: role.to_string(),
        }
    }

    fn update(stickers: Vec<Value>) -> BoardUpdate {
        BoardUpdate {
            stickers: Some(stickers),
            ..Default::default()
        }
    }

    async fn seed_cheers(db: &DbService, user_id: &str, cheers: &str) {
        sqlx::query("INSERT INTO users (id, cheers) VALUES (?, ?)")
            .bind(user_id)
            .bind(cheers)
            .execute(&db.pool)
            .await
            .unwrap();
    }

    fn rejected_code(outcome: ConsumeOutcome) -> ErrorCode {
        match outcome {
            ConsumeOutcome::Rejected(e) => e.code,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_appended_sticker_requires_exact_prefix() {
        let prev = vec![json!({"stickerId": 1, "x": 0, "y": 0})];
        let ok = vec![prev[0].clone(), json!({"stickerId": 2, "x": 1, "y": 1})];
        assert_eq!(appended_sticker(&prev, Some(ok.as_slice())), Some(&ok[1]));

        let moved = vec![json!({"stickerId": 1, "x": 5, "y": 0}), ok[1].clone()];
        assert_eq!(appended_sticker(&prev, Some(moved.as_slice())), None);
        assert_eq!(appended_sticker(&prev, Some(prev.as_slice())), None);
        assert_eq!(appended_sticker(&prev, None), None);
    }

    #[tokio::test]
    async fn test_non_owner_legacy_consumes_cheer() {
        let db = DbService::in_memory().await.unwrap();
        seed_cheers(&db, "guest", "[2,5]").await;
        let mut conn = db.pool.acquire().await.unwrap();

        let outcome = consume_for_non_owner_placement(
            &mut conn,
            "guest",
            &[],
            &update(vec![json!({"stickerId": 2, "x": 10, "y": 20})]),
            1,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, ConsumeOutcome::Consumed(ConsumedCredit::Legacy(2))));
        assert_eq!(cheers::find_credits(&mut *conn, "guest").await.unwrap(), Some(vec![5]));
    }

    #[tokio::test]
    async fn test_non_owner_absent_cheer_rejected() {
        let db = DbService::in_memory().await.unwrap();
        seed_cheers(&db, "guest", "[5]").await;
        let mut conn = db.pool.acquire().await.unwrap();

        let outcome = consume_for_non_owner_placement(
            &mut conn,
            "guest",
            &[],
            &update(vec![json!({"stickerId": 2, "x": 10, "y": 20})]),
            1,
        )
        .await
        .unwrap();
        assert_eq!(rejected_code(outcome), ErrorCode::CheerNotAvailable);
        assert_eq!(cheers::find_credits(&mut *conn, "guest").await.unwrap(), Some(vec![5]));
    }

    #[tokio::test]
    async fn test_non_owner_rules_checked_before_storage() {
        let db = DbService::in_memory().await.unwrap();
        seed_cheers(&db, "guest", "[2]").await;
        let mut conn = db.pool.acquire().await.unwrap();
        let prev = vec![json!({"stickerId": 1, "x": 0, "y": 0})];

        // 未增长
        let outcome = consume_for_non_owner_placement(&mut conn, "guest", &prev, &update(prev.clone()), 1)
            .await
            .unwrap();
        assert_eq!(rejected_code(outcome), ErrorCode::MustAppendSticker);

        // 携带其它字段
        let mut with_name = update(vec![prev[0].clone(), json!({"stickerId": 2, "x": 1, "y": 1})]);
        with_name.name = Some("mine".into());
        let outcome = consume_for_non_owner_placement(&mut conn, "guest", &prev, &with_name, 1)
            .await
            .unwrap();
        assert_eq!(rejected_code(outcome), ErrorCode::PlacementNotAllowed);

        // 坐标非法
        let bad = update(vec![prev[0].clone(), json!({"stickerId": 2, "x": "left", "y": 1})]);
        let outcome = consume_for_non_owner_placement(&mut conn, "guest", &prev, &bad, 1)
            .await
            .unwrap();
        assert_eq!(rejected_code(outcome), ErrorCode::InvalidSticker);

        assert_eq!(cheers::find_credits(&mut *conn, "guest").await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_non_owner_inventory_consumes_unit() {
        let db = DbService::in_memory().await.unwrap();
        inventory::increment(&db.pool, "guest", HEX, 1).await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let placement = update(vec![json!({"stickerId": HEX, "x": 1, "y": 1})]);

        let outcome = consume_for_non_owner_placement(&mut conn, "guest", &[], &placement, 2)
            .await
            .unwrap();
        match outcome {
            ConsumeOutcome::Consumed(ConsumedCredit::Inventory { remaining, .. }) => {
                assert_eq!(remaining.quantity, 0)
            }
            other => panic!("unexpected {other:?}"),
        }

        let outcome = consume_for_non_owner_placement(&mut conn, "guest", &[], &placement, 3)
            .await
            .unwrap();
        assert_eq!(rejected_code(outcome), ErrorCode::InsufficientStock);
    }

    #[tokio::test]
    async fn test_owner_append_consumes_inventory_only() {
        let db = DbService::in_memory().await.unwrap();
        inventory::increment(&db.pool, "owner", HEX, 1).await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let owner = user("owner", "user");

        // legacy id: lenient, nothing consumed
        let legacy = vec![json!({"stickerId": 3, "x": 0, "y": 0})];
        let outcome = consume_if_appending(&mut conn, &owner, &[], &legacy, 1).await.unwrap();
        assert!(matches!(outcome, ConsumeOutcome::NotRequired));

        let next = vec![json!({"stickerId": HEX, "x": 0, "y": 0})];
        let outcome = consume_if_appending(&mut conn, &owner, &[], &next, 1).await.unwrap();
        assert!(matches!(outcome, ConsumeOutcome::Consumed(_)));

        let outcome = consume_if_appending(&mut conn, &owner, &[], &next, 2).await.unwrap();
        assert_eq!(rejected_code(outcome), ErrorCode::InsufficientStock);

        // removal / reorder never consumes
        let outcome = consume_if_appending(&mut conn, &owner, &next, &[], 3).await.unwrap();
        assert!(matches!(outcome, ConsumeOutcome::NotRequired));
    }

    #[tokio::test]
    async fn test_admin_append_without_stock_permitted() {
        let db = DbService::in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let admin = user("root", "admin");
        let next = vec![json!({"stickerId": HEX, "x": 0, "y": 0})];

        let outcome = consume_if_appending(&mut conn, &admin, &[], &next, 1).await.unwrap();
        assert!(matches!(outcome, ConsumeOutcome::NotRequired));
    }
}
