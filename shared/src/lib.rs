//! Shared types for the cheers sticker service
//!
//! Error codes, the unified API response envelope and the domain models
//! exchanged between cheers-server and its clients.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use serde::{Deserialize, Serialize};
