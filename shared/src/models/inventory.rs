//! Inventory Models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Per-user, per-sticker countable credit balance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct InventoryItem {
    pub id: i64,
    pub user_id: String,
    pub sticker_id: String,
    /// Backfilled from the catalog when missing
    pub pack_id: Option<String>,
    pub quantity: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Minimal result persisted on the ledger entry after a grant/revoke
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GrantResult {
    pub row_id: i64,
    pub quantity: i64,
}

/// Award / revoke payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub op_id: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    /// Shape is checked separately (24-hex)
    #[validate(length(equal = 24))]
    pub sticker_id: String,
}
