//! 变更请求限流
//!
//! 每用户固定窗口计数，状态由 [`ServerState`] 持有并注入，过期窗口由后台
//! 周期任务清理。

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::security_log;
use crate::utils::{AppError, ErrorCode};

const WINDOW: Duration = Duration::from_secs(60);

struct UserWindow {
    count: u32,
    window_start: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    /// user id -> window
    inner: Arc<DashMap<String, UserWindow>>,
    max_per_window: u32,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked", &self.inner.len())
            .field("max_per_window", &self.max_per_window)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(max_per_window: u32) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_per_window,
        }
    }

    /// Returns `true` if the request is allowed, `false` if rate-limited.
    pub fn check(&self, user_id: &str) -> bool {
        self.check_at(user_id, Instant::now())
    }

    fn check_at(&self, user_id: &str, now: Instant) -> bool {
        let mut entry = self
            .inner
            .entry(user_id.to_owned())
            .or_insert_with(|| UserWindow {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= WINDOW {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.count <= self.max_per_window
    }

    /// Drop windows that expired more than one window ago
    pub fn cleanup(&self) -> usize {
        let before = self.inner.len();
        let now = Instant::now();
        self.inner
            .retain(|_, w| now.duration_since(w.window_start) < WINDOW * 2);
        before.saturating_sub(self.inner.len())
    }

    pub fn tracked(&self) -> usize {
        self.inner.len()
    }
}

/// 限流中间件，挂在变更路由上（需在认证之后）
pub async fn rate_limit(
    State(state): State<ServerState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(user) = req.extensions().get::<CurrentUser>()
        && !state.rate_limiter.check(&user.id)
    {
        security_log!(
            "WARN",
            "rate_limited",
            user_id = user.id.clone(),
            uri = format!("{:?}", req.uri())
        );
        return Err(AppError::new(ErrorCode::TooManyRequests));
    }
    Ok(next.run(req).await)
}
