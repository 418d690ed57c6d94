//! Inventory API 模块
//!
//! | 路径 | 方法 | operationType | 认证 |
//! |------|------|---------------|------|
//! | /api/inventory/award | POST | transferSticker | 管理员 |
//! | /api/inventory/revoke | POST | removeSticker | 管理员 |
//! | /api/admin/inventory/{user_id}/{sticker_id} | DELETE | removeSticker | 管理员 |

mod handler;

use axum::{Router, middleware, routing::{delete, post}};

use shared::models::OperationType;

use crate::auth::{rate_limit, require_admin};
use crate::core::ServerState;
use crate::idempotency::idempotency_gate;

use super::guard;

pub fn router(state: &ServerState) -> Router<ServerState> {
    let award = Router::new()
        .route("/api/inventory/award", post(handler::award))
        .route_layer(middleware::from_fn_with_state(
            guard(state, OperationType::TransferSticker),
            idempotency_gate,
        ));

    let revoke = Router::new()
        .route("/api/inventory/revoke", post(handler::revoke))
        .route(
            "/api/admin/inventory/{user_id}/{sticker_id}",
            delete(handler::admin_remove),
        )
        .route_layer(middleware::from_fn_with_state(
            guard(state, OperationType::RemoveSticker),
            idempotency_gate,
        ));

    award
        .merge(revoke)
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .route_layer(middleware::from_fn(require_admin))
}
