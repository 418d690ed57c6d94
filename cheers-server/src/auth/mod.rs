//! 认证授权模块
//!
//! - [`JwtService`] - JWT 令牌校验
//! - [`CurrentUser`] - 当前调用者
//! - [`require_auth`] / [`require_admin`] - 中间件
//! - [`RateLimiter`] - 每用户变更请求限流

pub mod jwt;
pub mod middleware;
pub mod rate_limit;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
pub use middleware::{require_admin, require_auth};
pub use rate_limit::{RateLimiter, rate_limit};
