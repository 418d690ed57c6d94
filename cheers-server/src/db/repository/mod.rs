//! Repository Module
//!
//! Free async functions over `&mut SqliteConnection` (inside a unit of work)
//! or `&SqlitePool` (standalone reads and best-effort writes).

pub mod board;
pub mod catalog;
pub mod cheers;
pub mod inventory;
pub mod ledger;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// SQLITE_BUSY / SQLITE_LOCKED or pool exhaustion, safe to retry
    #[error("Storage busy: {0}")]
    Busy(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut => RepoError::Busy(err.to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    return RepoError::Duplicate(db_err.message().to_string());
                }
                // 扩展错误码低 8 位为主错误码: 5 = BUSY, 6 = LOCKED
                let primary = db_err
                    .code()
                    .and_then(|c| c.parse::<i32>().ok())
                    .map(|c| c & 0xff);
                match primary {
                    Some(5) | Some(6) => RepoError::Busy(db_err.message().to_string()),
                    _ => RepoError::Database(err.to_string()),
                }
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
