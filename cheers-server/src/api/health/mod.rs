//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/health | GET | 状态、环境、事务能力、数据库连通性 | 无 |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::time::Instant;

use crate::core::ServerState;
use crate::db::Capabilities;

/// 健康检查路由 - 公共路由 (无需认证)
pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
    environment: String,
    capabilities: Capabilities,
    database: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let start = Instant::now();
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => CheckResult {
            status: "ok",
            latency_ms: Some(start.elapsed().as_millis() as u64),
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unreachable");
            CheckResult {
                status: "error",
                latency_ms: None,
                message: Some(e.to_string()),
            }
        }
    };

    Json(HealthResponse {
        status: if database.status == "ok" { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        capabilities: state.capabilities(),
        database,
    })
}
