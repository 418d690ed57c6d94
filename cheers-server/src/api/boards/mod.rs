//! Board API 模块
//!
//! `PUT /api/boards/{board_id}` 受幂等门保护 (updateStickerboard)。

mod handler;

use axum::{Router, middleware, routing::put};

use shared::models::OperationType;

use crate::auth::rate_limit;
use crate::core::ServerState;
use crate::idempotency::idempotency_gate;

use super::guard;

pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .route("/api/boards/{board_id}", put(handler::update))
        .route_layer(middleware::from_fn_with_state(
            guard(state, OperationType::UpdateStickerboard),
            idempotency_gate,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
}
