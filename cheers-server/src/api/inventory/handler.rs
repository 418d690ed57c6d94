//! Inventory API Handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde_json::json;
use validator::Validate;

use shared::models::{GrantRequest, InventoryStickerId, OpId};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::inventory::{GrantCommand, GrantOutcome};
use crate::ledger::{LedgerTicket, redact};
use crate::utils::{AppError, AppJson, AppResult, ok};

/// POST /api/inventory/award - 发放一件
pub async fn award(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    ticket: Option<Extension<LedgerTicket>>,
    AppJson(req): AppJson<GrantRequest>,
) -> AppResult<Response> {
    let cmd = grant_command(&user, ticket.map(|Extension(t)| t), &req)?;
    let sticker_id = cmd.sticker_id.clone();
    let outcome = state.inventory.award(cmd).await?;
    respond(outcome, &sticker_id)
}

/// POST /api/inventory/revoke - 撤回一件（数量保留在 0）
pub async fn revoke(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    ticket: Option<Extension<LedgerTicket>>,
    AppJson(req): AppJson<GrantRequest>,
) -> AppResult<Response> {
    let cmd = grant_command(&user, ticket.map(|Extension(t)| t), &req)?;
    let sticker_id = cmd.sticker_id.clone();
    let outcome = state.inventory.revoke(cmd).await?;
    respond(outcome, &sticker_id)
}

/// DELETE /api/admin/inventory/{user_id}/{sticker_id} - 移除一件，归零时删除记录
pub async fn admin_remove(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    ticket: Option<Extension<LedgerTicket>>,
    Path((user_id, sticker_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let req = GrantRequest {
        op_id: None,
        user_id,
        sticker_id,
    };
    let cmd = grant_command(&user, ticket.map(|Extension(t)| t), &req)?;
    let sticker_id = cmd.sticker_id.clone();
    let outcome = state.inventory.admin_remove(cmd).await?;
    respond(outcome, &sticker_id)
}

/// Gate ticket wins; a body opId only reaches here when the gate is absent
fn grant_command(
    user: &CurrentUser,
    ticket: Option<LedgerTicket>,
    req: &GrantRequest,
) -> AppResult<GrantCommand> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let sticker_id = InventoryStickerId::try_from(req.sticker_id.clone())?;

    let (op_id, owner) = match ticket {
        Some(ticket) => (OpId::parse(&ticket.op_id)?, ticket.owner),
        None => {
            let op_id = match req.op_id.as_deref() {
                Some(raw) => OpId::parse(raw)?,
                None => OpId::generate(),
            };
            (op_id, uuid::Uuid::new_v4().to_string())
        }
    };

    Ok(GrantCommand {
        op_id,
        owner,
        actor_id: user.id.clone(),
        user_id: req.user_id.clone(),
        sticker_id,
        payload: redact(&json!({ "userId": req.user_id, "stickerId": req.sticker_id })),
    })
}

fn respond(outcome: GrantOutcome, sticker_id: &InventoryStickerId) -> AppResult<Response> {
    match outcome {
        GrantOutcome::Applied(applied) => Ok(ok(applied).into_response()),
        GrantOutcome::Cached(ack) => Ok(Json(ack).into_response()),
        GrantOutcome::InProgress { retry_after_ms } => Err(AppError::operation_in_progress(retry_after_ms)),
        GrantOutcome::InsufficientStock => Err(AppError::insufficient_stock(sticker_id.as_str())),
    }
}
