//! 幂等门中间件
//!
//! ```text
//! body.opId ─┬─ 缺失 ───────────────▶ 直接放行
//!            ├─ 非 UUIDv4 ──────────▶ 400
//!            └─ decide(entry)
//!                 ├─ completed ─────▶ 200 { cached: true }
//!                 ├─ 租约有效 ───────▶ 409 + Retry-After
//!                 └─ acquire ───────▶ handler ─▶ complete / fail ─▶ 响应
//! ```
//!
//! 处理器在独立任务中运行：客户端断开不会中断进行中的工作单元，处理器
//! panic 时条目被标记为 failed。

use axum::Json;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use sqlx::SqlitePool;

use shared::models::{OpId, OperationType};
use shared::util::now_millis;

use crate::auth::CurrentUser;
use crate::db::repository::RepoError;
use crate::db::repository::ledger::{self, Acquired, LeaseRequest};
use crate::ledger::{LedgerDecision, LedgerTicket, decide, redact};
use crate::utils::{AppError, AppResult, ErrorCode};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-route guard state
#[derive(Clone, Debug)]
pub struct IdempotencyGuard {
    pool: SqlitePool,
    lease_ttl_ms: i64,
    operation: OperationType,
    max_body: usize,
}

impl IdempotencyGuard {
    pub fn new(pool: SqlitePool, lease_ttl_ms: i64, operation: OperationType, max_body: usize) -> Self {
        Self {
            pool,
            lease_ttl_ms,
            operation,
            max_body,
        }
    }
}

/// Idempotency middleware, mounted with `route_layer(from_fn_with_state(guard, ..))`
pub async fn idempotency_gate(
    State(guard): State<IdempotencyGuard>,
    req: Request,
    next: Next,
) -> Response {
    match guard_request(&guard, req, next).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn guard_request(guard: &IdempotencyGuard, req: Request, next: Next) -> AppResult<Response> {
    let (mut parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, guard.max_body)
        .await
        .map_err(|_| AppError::new(ErrorCode::PayloadTooLarge))?;

    let body_json: Option<Value> = serde_json::from_slice(&bytes).ok();
    let Some(op_id) = extract_op_id(body_json.as_ref())? else {
        return Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await);
    };
    let op_id = op_id.to_string();

    let user = parts
        .extensions
        .get::<CurrentUser>()
        .cloned()
        .ok_or_else(AppError::not_authenticated)?;
    let owner = lease_owner();
    let request_id = parts
        .headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let now = now_millis();

    let ticket = {
        let mut conn = guard.pool.acquire().await.map_err(RepoError::from)?;

        let existing = ledger::find_by_op_id(&mut *conn, &op_id).await?;
        if let Some(response) = short_circuit(decide(existing.as_ref(), now, &owner), &op_id) {
            return Ok(response);
        }

        let payload = body_json.as_ref().map(redact).unwrap_or(Value::Null);
        let lease = LeaseRequest {
            op_id: &op_id,
            user_id: &user.id,
            operation_type: guard.operation,
            batch_id: None,
            owner: &owner,
            payload: &payload,
            now,
            ttl_ms: guard.lease_ttl_ms,
        };
        match ledger::acquire(&mut conn, &lease).await? {
            Acquired::Granted { entry_id, epoch } => LedgerTicket {
                entry_id,
                op_id: op_id.clone(),
                owner: owner.clone(),
                epoch,
            },
            Acquired::Rejected(entry) => {
                // 并发首见：唯一索引已裁决，按胜者的状态响应
                let decision = decide(Some(&entry), now, &owner);
                return Ok(short_circuit(decision, &op_id)
                    .unwrap_or_else(|| in_progress(guard.lease_ttl_ms)));
            }
        }
    };

    tracing::debug!(
        op_id = %ticket.op_id,
        request_id = %request_id,
        epoch = ticket.epoch,
        operation = %guard.operation,
        "Ledger lease acquired"
    );

    parts.extensions.insert(ticket.clone());
    let req = Request::from_parts(parts, Body::from(bytes));

    let response = match tokio::spawn(next.run(req)).await {
        Ok(response) => response,
        Err(join_err) => {
            tracing::error!(op_id = %ticket.op_id, error = %join_err, "Guarded handler aborted");
            finalize(&guard.pool, &ticket, Err("handler panicked")).await;
            return Err(AppError::internal("Request handler failed"));
        }
    };

    let status = response.status();
    let outcome = if status.is_success() {
        Ok(())
    } else {
        Err(status.canonical_reason().unwrap_or("request failed"))
    };
    finalize(&guard.pool, &ticket, outcome).await;

    Ok(response)
}

/// `opId` from the request body; absent or `null` means unguarded
fn extract_op_id(body: Option<&Value>) -> AppResult<Option<OpId>> {
    match body.and_then(|b| b.get("opId")) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => OpId::parse(raw).map(Some),
        Some(other) => Err(AppError::invalid_op_id(other.to_string())),
    }
}

/// Lease owner: minted per request; client-supplied ids are never trusted as owners
fn lease_owner() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn in_progress(retry_after_ms: i64) -> Response {
    AppError::operation_in_progress(retry_after_ms).into_response()
}

fn short_circuit(decision: LedgerDecision, op_id: &str) -> Option<Response> {
    match decision {
        LedgerDecision::Proceed => None,
        LedgerDecision::Cached(ack) => {
            tracing::info!(op_id = %op_id, "Replay of completed operation");
            Some(Json(ack).into_response())
        }
        LedgerDecision::InProgress { retry_after_ms } => {
            tracing::info!(op_id = %op_id, retry_after_ms, "Operation in progress");
            Some(in_progress(retry_after_ms))
        }
    }
}

/// Persist the terminal status before the response leaves; failures are only logged
async fn finalize(pool: &SqlitePool, ticket: &LedgerTicket, outcome: Result<(), &str>) {
    let now = now_millis();
    let written = match outcome {
        Ok(()) => ledger::complete(pool, ticket.entry_id, ticket.epoch, None, now).await,
        Err(reason) => ledger::fail(pool, ticket.entry_id, ticket.epoch, reason, now).await,
    };
    match written {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(
                op_id = %ticket.op_id,
                epoch = ticket.epoch,
                "Ledger finalize skipped: lease taken over or status already terminal"
            );
        }
        Err(e) => {
            tracing::error!(op_id = %ticket.op_id, error = %e, "Failed to finalize ledger entry");
        }
    }
}
