//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 404 Not Found (insufficient stock on revoke is reported as a missing unit)
            Self::NotFound
            | Self::InventoryNotFound
            | Self::InsufficientStock
            | Self::BoardNotFound
            | Self::LedgerEntryNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::OperationInProgress
            | Self::LeaseLost
            | Self::BoardModified => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::PermissionDenied | Self::AdminRequired => StatusCode::FORBIDDEN,

            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            // 503 Service Unavailable (transient, client can retry)
            Self::StorageBusy => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::TransactionUnsupported => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (validation and placement rules)
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::InvalidOpId
            | Self::CheerNotAvailable
            | Self::MustAppendSticker
            | Self::PlacementNotAllowed
            | Self::InvalidSticker => StatusCode::BAD_REQUEST,
        }
    }
}
