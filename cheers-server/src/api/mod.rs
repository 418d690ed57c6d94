//! API 路由模块
//!
//! - [`health`] - 健康检查（公共）
//! - [`inventory`] - 发放 / 撤回 / 管理员移除（管理员，幂等门）
//! - [`boards`] - 贴纸板更新与放置（幂等门）
//! - [`ledger`] - 账本条目查询
//! - [`audit_log`] - 审计日志（管理员）

pub mod audit_log;
pub mod boards;
pub mod health;
pub mod inventory;
pub mod ledger;

use axum::Router;

use shared::models::OperationType;

use crate::core::ServerState;
use crate::idempotency::IdempotencyGuard;

/// 注册所有路由（无全局中间件、无状态）
pub fn build_router(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(inventory::router(state))
        .merge(boards::router(state))
        .merge(ledger::router())
        .merge(audit_log::router())
}

/// 受保护路由的幂等门状态
pub(crate) fn guard(state: &ServerState, operation: OperationType) -> IdempotencyGuard {
    IdempotencyGuard::new(
        state.pool.clone(),
        state.config.lease_ttl_ms,
        operation,
        state.config.max_body_bytes,
    )
}
