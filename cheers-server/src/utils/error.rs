//! 统一错误处理
//!
//! 错误类型统一来自 `shared::error`，这里补充仓储层错误到 [`AppError`] 的映射
//! 和处理器的成功响应辅助函数。

use axum::Json;
use serde::Serialize;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

use crate::db::repository::RepoError;

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(what) => AppError::not_found(what),
            RepoError::Duplicate(what) => AppError::conflict(what),
            RepoError::Busy(msg) => AppError::storage_busy(msg),
            RepoError::Database(msg) => AppError::database(msg),
            RepoError::Serialization(e) => AppError::internal(format!("Serialization error: {e}")),
        }
    }
}

/// 成功响应 `{ success: true, code: 0, message: "OK", data }`
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

/// 带自定义消息的成功响应
pub fn ok_with_message<T: Serialize>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success_with_message(message, data))
}
