//! Board API Handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;

use shared::models::{Board, BoardUpdate};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::ledger::LedgerTicket;
use crate::utils::{ApiResponse, AppJson, AppResult, ok};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardUpdateResponse {
    pub board: Board,
    /// Sticker id of the consumed credit, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_sticker_id: Option<String>,
}

/// PUT /api/boards/{board_id} - 更新贴纸板（含放置消耗）
pub async fn update(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    ticket: Option<Extension<LedgerTicket>>,
    Path(board_id): Path<String>,
    AppJson(update): AppJson<BoardUpdate>,
) -> AppResult<Json<ApiResponse<BoardUpdateResponse>>> {
    let ticket = ticket.map(|Extension(t)| t);
    let updated = state.boards.update(&user, &board_id, update, ticket).await?;

    Ok(ok(BoardUpdateResponse {
        consumed_sticker_id: updated.consumed.as_ref().map(|c| c.sticker_id()),
        board: updated.board,
    }))
}
