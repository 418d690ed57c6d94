//! 请求日志中间件
//!
//! 记录每个请求的方法、匹配路由、状态码、延迟和调用者

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::idempotency::REQUEST_ID_HEADER;

/// 访问日志中间件
///
/// Request ID 由外层 `SetRequestIdLayer` 生成，这里只读取。
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let user = req.extensions().get::<CurrentUser>().map(|u| u.id.clone());

    let response = next.run(req).await;

    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            latency_ms,
            user = ?user,
            "Request completed with server error"
        );
    } else if response.status().is_client_error() {
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            latency_ms,
            user = ?user,
            "Request completed with client error"
        );
    } else {
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            latency_ms,
            user = ?user,
            "Request completed"
        );
    }

    response
}
