//! Unified error codes for the cheers sticker service
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Operation ledger errors
//! - 4xxx: Sticker / inventory errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so the web client can
/// switch on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Request body too large
    PayloadTooLarge = 6,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 3xxx: Operation ledger ====================
    /// opId is not a UUIDv4
    InvalidOpId = 3001,
    /// Another attempt holds the lease for this opId
    OperationInProgress = 3002,
    /// The lease was reclaimed by another attempt
    LeaseLost = 3003,
    /// Too many mutating requests
    TooManyRequests = 3004,
    /// Ledger entry not found
    LedgerEntryNotFound = 3005,

    // ==================== 4xxx: Sticker / inventory ====================
    /// Inventory row not found
    InventoryNotFound = 4001,
    /// Not enough units to revoke or consume
    InsufficientStock = 4002,
    /// Legacy cheers sticker not held by the user
    CheerNotAvailable = 4003,
    /// Non-owner update did not append exactly one sticker
    MustAppendSticker = 4004,
    /// Non-owner update touched fields other than stickers
    PlacementNotAllowed = 4005,
    /// Sticker id or coordinates are malformed
    InvalidSticker = 4006,
    /// Board not found
    BoardNotFound = 4007,
    /// Board was modified concurrently
    BoardModified = 4008,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9005,
    /// Datastore has no transaction support and it is required
    TransactionUnsupported = 9006,
    /// Datastore busy (write contention, retry later)
    StorageBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::PayloadTooLarge => "Request body is too large",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::AdminRequired => "Administrator role is required",

            // Operation ledger
            ErrorCode::InvalidOpId => "opId must be a valid UUIDv4",
            ErrorCode::OperationInProgress => "Operation is already in progress",
            ErrorCode::LeaseLost => "Operation lease was taken over by another attempt",
            ErrorCode::TooManyRequests => "Too many requests, please slow down",
            ErrorCode::LedgerEntryNotFound => "Operation not found",

            // Sticker / inventory
            ErrorCode::InventoryNotFound => "Inventory item not found",
            ErrorCode::InsufficientStock => "Insufficient stock",
            ErrorCode::CheerNotAvailable => "Cheers sticker not available",
            ErrorCode::MustAppendSticker => "Must append a sticker",
            ErrorCode::PlacementNotAllowed => "Only sticker placement is allowed on another user's board",
            ErrorCode::InvalidSticker => "Invalid sticker",
            ErrorCode::BoardNotFound => "Board not found",
            ErrorCode::BoardModified => "Board was modified by another request",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::TransactionUnsupported => "Datastore does not support transactions",
            ErrorCode::StorageBusy => "Storage busy, please retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::PayloadTooLarge),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2003 => Ok(ErrorCode::AdminRequired),

            // Operation ledger
            3001 => Ok(ErrorCode::InvalidOpId),
            3002 => Ok(ErrorCode::OperationInProgress),
            3003 => Ok(ErrorCode::LeaseLost),
            3004 => Ok(ErrorCode::TooManyRequests),
            3005 => Ok(ErrorCode::LedgerEntryNotFound),

            // Sticker / inventory
            4001 => Ok(ErrorCode::InventoryNotFound),
            4002 => Ok(ErrorCode::InsufficientStock),
            4003 => Ok(ErrorCode::CheerNotAvailable),
            4004 => Ok(ErrorCode::MustAppendSticker),
            4005 => Ok(ErrorCode::PlacementNotAllowed),
            4006 => Ok(ErrorCode::InvalidSticker),
            4007 => Ok(ErrorCode::BoardNotFound),
            4008 => Ok(ErrorCode::BoardModified),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9005 => Ok(ErrorCode::ConfigError),
            9006 => Ok(ErrorCode::TransactionUnsupported),
            9404 => Ok(ErrorCode::StorageBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::AdminRequired.code(), 2003);
        assert_eq!(ErrorCode::InvalidOpId.code(), 3001);
        assert_eq!(ErrorCode::OperationInProgress.code(), 3002);
        assert_eq!(ErrorCode::InsufficientStock.code(), 4002);
        assert_eq!(ErrorCode::MustAppendSticker.code(), 4004);
        assert_eq!(ErrorCode::StorageBusy.code(), 9404);
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::Unknown.is_success());
        assert!(!ErrorCode::InsufficientStock.is_success());
    }

    #[test]
    fn test_try_from() {
        assert_eq!(ErrorCode::try_from(0), Ok(ErrorCode::Success));
        assert_eq!(ErrorCode::try_from(3002), Ok(ErrorCode::OperationInProgress));
        assert_eq!(ErrorCode::try_from(4003), Ok(ErrorCode::CheerNotAvailable));
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::InsufficientStock).unwrap();
        assert_eq!(json, "4002");

        let code: ErrorCode = serde_json::from_str("3001").unwrap();
        assert_eq!(code, ErrorCode::InvalidOpId);

        let result: Result<ErrorCode, _> = serde_json::from_str("10000");
        assert!(result.is_err());
    }

    #[test]
    fn test_message() {
        assert_eq!(
            ErrorCode::OperationInProgress.message(),
            "Operation is already in progress"
        );
        assert_eq!(ErrorCode::MustAppendSticker.message(), "Must append a sticker");
        assert_eq!(ErrorCode::InsufficientStock.message(), "Insufficient stock");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ErrorCode::NotFound), "3");
        assert_eq!(format!("{}", ErrorCode::BoardModified), "4008");
        assert_eq!(format!("{}", InvalidErrorCode(7)), "invalid error code: 7");
    }
}
