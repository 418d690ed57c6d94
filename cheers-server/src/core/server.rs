//! HTTP 服务器启动和管理

use axum::Router;
use axum::middleware as axum_middleware;
use http::{HeaderName, HeaderValue};
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::core::{Config, Result, ServerState};
use crate::idempotency::REQUEST_ID_HEADER;

/// x-request-id 生成器
#[derive(Clone, Default)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// 组装完整应用：路由 + 中间件 + 状态
///
/// HTTP 服务器和集成测试 (oneshot) 共用。
pub fn build_app(state: &ServerState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    crate::api::build_router(state)
        // 访问日志（在认证之内，可读取 CurrentUser）
        .layer(axum_middleware::from_fn(crate::middleware::logging_middleware))
        .layer(TraceLayer::new_for_http())
        // JWT 认证 - require_auth 内部跳过公共路由
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, XRequestId))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state.clone())
}

/// HTTP Server
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    pub async fn run(self) -> Result<()> {
        let tasks = self.state.start_background_tasks();

        if let Err(e) = self
            .state
            .audit
            .log_sync(
                AuditAction::SystemStartup,
                "system",
                "cheers-server",
                json!({ "transactions": self.state.capabilities().transactions }),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to record startup audit entry");
        }

        let app = build_app(&self.state);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Cheers server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutting down...");
            })
            .await?;

        if let Err(e) = self
            .state
            .audit
            .log_sync(AuditAction::SystemShutdown, "system", "cheers-server", json!({}))
            .await
        {
            tracing::warn!(error = %e, "Failed to record shutdown audit entry");
        }
        tasks.shutdown().await;
        Ok(())
    }
}
