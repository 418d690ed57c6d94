//! Operation Ledger Models
//!
//! 每个变更请求的尝试记录。`op_id` 由客户端生成（UUIDv4），全局唯一。

use crate::error::AppError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::{Uuid, Variant, Version};

/// Client-supplied idempotency key (hyphenated UUIDv4 only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(Uuid);

impl OpId {
    /// Parse and validate a raw opId
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        // Uuid::try_parse also accepts simple/braced/urn forms; clients always send hyphenated
        if raw.len() != 36 {
            return Err(AppError::invalid_op_id(raw));
        }
        let uuid = Uuid::try_parse(raw).map_err(|_| AppError::invalid_op_id(raw))?;
        if uuid.get_version() != Some(Version::Random) || uuid.get_variant() != Variant::RFC4122
        {
            return Err(AppError::invalid_op_id(raw));
        }
        Ok(Self(uuid))
    }

    /// Server-side key for requests that arrive without one
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for OpId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for OpId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OpId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Operation type recorded on each ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "TEXT", rename_all = "camelCase"))]
pub enum OperationType {
    PlaceSticker,
    RemoveSticker,
    ConsumeSticker,
    TransferSticker,
    UpdateStickerboard,
    CatalogIngestion,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlaceSticker => "placeSticker",
            Self::RemoveSticker => "removeSticker",
            Self::ConsumeSticker => "consumeSticker",
            Self::TransferSticker => "transferSticker",
            Self::UpdateStickerboard => "updateStickerboard",
            Self::CatalogIngestion => "catalogIngestion",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger entry status: `pending → completed` 或 `pending → failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "TEXT", rename_all = "lowercase"))]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Ledger entry as exposed over the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub op_id: String,
    pub user_id: String,
    pub operation_type: OperationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_expires_at: Option<i64>,
    /// 每次租约被接管时递增；终态写入必须携带匹配的 epoch
    pub lease_epoch: i64,
    pub payload: Value,
    pub result: Option<Value>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LedgerEntry {
    /// Remaining lease time if the entry is pending and actively held at `now`
    pub fn lease_remaining_ms(&self, now: i64) -> Option<i64> {
        if self.status != OperationStatus::Pending {
            return None;
        }
        match self.lock_expires_at {
            Some(expires) if now < expires => Some(expires - now),
            _ => None,
        }
    }

    pub fn is_actively_held(&self, now: i64) -> bool {
        self.lease_remaining_ms(now).is_some()
    }
}

/// Replay acknowledgment for an already-completed opId
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CachedAck {
    pub success: bool,
    pub cached: bool,
    pub message: String,
    pub op_id: String,
}

impl CachedAck {
    pub fn new(op_id: impl Into<String>) -> Self {
        Self {
            success: true,
            cached: true,
            message: "Operation already completed".to_string(),
            op_id: op_id.into(),
        }
    }
}
