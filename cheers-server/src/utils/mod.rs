//! 工具模块
//!
//! - [`AppError`] / [`ApiResponse`] (from shared::error)
//! - [`AppJson`] 统一信封的 JSON 提取器
//! - 日志初始化

pub mod error;
pub mod extract;
pub mod logger;

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use error::{ok, ok_with_message};
pub use extract::AppJson;
