//! Ledger API 模块
//!
//! `GET /api/ledger/{op_id}` - 条目所有者或管理员查询一次尝试的结果

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::get,
};

use shared::models::{LedgerEntry, OpId};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::repository::ledger;
use crate::security_log;
use crate::utils::{ApiResponse, AppError, AppResult, ErrorCode, ok};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/ledger/{op_id}", get(get_entry))
}

async fn get_entry(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(op_id): Path<String>,
) -> AppResult<Json<ApiResponse<LedgerEntry>>> {
    let op_id = OpId::parse(&op_id)?.to_string();
    let entry = ledger::find_by_op_id(&state.pool, &op_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::LedgerEntryNotFound).with_detail("opId", op_id.clone()))?;

    if entry.user_id != user.id && !user.is_admin() {
        security_log!(
            "WARN",
            "ledger_access_denied",
            user_id = user.id.clone(),
            op_id = op_id.clone()
        );
        return Err(AppError::permission_denied("Ledger entry belongs to another user"));
    }

    Ok(ok(entry))
}
