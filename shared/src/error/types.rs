//! Error types and API response structures

use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// - Standardized error codes via [`ErrorCode`]
/// - Human-readable messages
/// - Optional structured details (retry hints, offending field, ...)
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    // ==================== Convenience constructors ====================

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        let r = resource.into();
        Self::with_message(ErrorCode::NotFound, format!("{} not found", r))
            .with_detail("resource", r)
    }

    pub fn not_authenticated() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::PermissionDenied, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::DatabaseError, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidRequest, msg)
    }

    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::TokenInvalid, msg)
    }

    pub fn token_expired() -> Self {
        Self::new(ErrorCode::TokenExpired)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::AlreadyExists, msg)
    }

    /// 409: another attempt holds the lease; `retry_after_ms` is the remaining lease time
    pub fn operation_in_progress(retry_after_ms: i64) -> Self {
        Self::new(ErrorCode::OperationInProgress).with_detail("retryAfterMs", retry_after_ms)
    }

    pub fn invalid_op_id(raw: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOpId).with_detail("opId", raw.into())
    }

    pub fn insufficient_stock(sticker_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientStock).with_detail("stickerId", sticker_id.into())
    }

    /// Transient storage contention, safe to retry
    pub fn storage_busy(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::StorageBusy, msg)
    }
}

/// Unified API response structure
///
/// - `success`: stable boolean every client can branch on
/// - `code`: error code (0 for success)
/// - `message`: human-readable message
/// - `data`: response payload (on success)
/// - `details`: additional error details (on failure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: Some(0),
            message: "OK".to_string(),
            data: Some(data),
            details: None,
        }
    }

    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            code: Some(0),
            message: message.into(),
            data: Some(data),
            details: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            message: "OK".to_string(),
            data: None,
            details: None,
        }
    }

    pub fn error(err: &AppError) -> Self {
        Self {
            success: false,
            code: Some(err.code.code()),
            message: err.message.clone(),
            data: None,
            details: err.details.clone(),
        }
    }
}

impl<T> From<AppError> for ApiResponse<T> {
    fn from(err: AppError) -> Self {
        Self {
            success: false,
            code: Some(err.code.code()),
            message: err.message,
            data: None,
            details: err.details,
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

// ===== Axum Integration =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = self.http_status();
        let body = ApiResponse::<()>::error(&self);

        if matches!(self.code.category(), super::category::ErrorCategory::System) {
            tracing::error!(
                code = %self.code,
                message = %self.message,
                "System error occurred"
            );
        }

        let mut response = (status, Json(body)).into_response();
        if self.code == ErrorCode::OperationInProgress {
            let retry_secs = self
                .details
                .as_ref()
                .and_then(|d| d.get("retryAfterMs"))
                .and_then(Value::as_i64)
                .map(|ms| ((ms + 999) / 1000).max(1))
                .unwrap_or(1);
            if let Ok(value) = http::HeaderValue::from_str(&retry_secs.to_string()) {
                response.headers_mut().insert(http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = if self.success {
            StatusCode::OK
        } else {
            self.code
                .and_then(|c| ErrorCode::try_from(c).ok())
                .map(|c| c.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        };

        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_app_error_new() {
        let err = AppError::new(ErrorCode::NotFound);
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Resource not found");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_app_error_with_detail() {
        let err = AppError::validation("Missing required fields")
            .with_detail("field", "stickerId")
            .with_detail("reason", "required");

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details = err.details.unwrap();
        assert_eq!(details.get("field").unwrap(), "stickerId");
        assert_eq!(details.get("reason").unwrap(), "required");
    }

    #[test]
    fn test_convenience_constructors() {
        let err = AppError::not_found("Board");
        assert_eq!(err.message, "Board not found");
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);

        let err = AppError::operation_in_progress(12_000);
        assert_eq!(err.http_status(), StatusCode::CONFLICT);
        assert_eq!(err.message, "Operation is already in progress");
        assert_eq!(err.details.unwrap().get("retryAfterMs").unwrap(), 12_000);

        let err = AppError::invalid_op_id("abc");
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);

        let err = AppError::storage_busy("database is locked");
        assert_eq!(err.http_status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success(42);
        assert!(response.success);
        assert_eq!(response.code, Some(0));
        assert_eq!(response.data, Some(42));
    }

    #[test]
    fn test_api_response_error_carries_success_false() {
        let err = AppError::insufficient_stock("65a1b2c3d4e5f6a7b8c9d0e1");
        let json = serde_json::to_value(ApiResponse::<()>::error(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], 4002);
        assert_eq!(json["message"], "Insufficient stock");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_in_progress_sets_retry_after() {
        let response = AppError::operation_in_progress(1_500).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get(http::header::RETRY_AFTER).unwrap(),
            "2"
        );
    }

    #[test]
    fn test_api_response_deserialize() {
        let json = r#"{"success":true,"code":0,"message":"OK","data":42}"#;
        let response: ApiResponse<i32> = serde_json::from_str(json).unwrap();
        assert!(response.success);
        assert_eq!(response.data, Some(42));
    }
}
