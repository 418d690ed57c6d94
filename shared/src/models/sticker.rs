//! Sticker identity & placement models
//!
//! Two sticker systems coexist on boards:
//! - legacy "cheers" stickers, small integer ids held in a per-user credit array
//! - catalog stickers, 24-hex ids counted in the inventory table
//!
//! The shape of an id decides which credit a placement consumes. It is resolved
//! once at the request boundary into [`StickerRef`].

use crate::error::{AppError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 24-hex catalog sticker id, normalized to lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InventoryStickerId(String);

impl InventoryStickerId {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == 24 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InventoryStickerId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| {
            AppError::with_message(ErrorCode::InvalidSticker, "stickerId must be a 24-hex id")
                .with_detail("stickerId", value)
        })
    }
}

impl From<InventoryStickerId> for String {
    fn from(id: InventoryStickerId) -> Self {
        id.0
    }
}

impl fmt::Display for InventoryStickerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved sticker reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StickerRef {
    /// Legacy cheers credit (integer id)
    Legacy(i64),
    /// Catalog sticker backed by an inventory row
    Inventory(InventoryStickerId),
}

impl StickerRef {
    /// Resolve a raw JSON sticker id.
    ///
    /// Integers (or all-digit strings) are legacy credits, 24-hex strings are
    /// inventory ids; anything else is rejected.
    pub fn resolve(raw: &Value) -> Result<Self, AppError> {
        match raw {
            Value::Number(n) => n
                .as_i64()
                .filter(|v| *v >= 0)
                .map(Self::Legacy)
                .ok_or_else(|| invalid_id(raw)),
            Value::String(s) => {
                if let Some(id) = InventoryStickerId::parse(s) {
                    return Ok(Self::Inventory(id));
                }
                if !s.is_empty() && s.len() <= 18 && s.bytes().all(|b| b.is_ascii_digit()) {
                    return s.parse().map(Self::Legacy).map_err(|_| invalid_id(raw));
                }
                Err(invalid_id(raw))
            }
            _ => Err(invalid_id(raw)),
        }
    }
}

impl fmt::Display for StickerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy(id) => write!(f, "{id}"),
            Self::Inventory(id) => write!(f, "{id}"),
        }
    }
}

fn invalid_id(raw: &Value) -> AppError {
    AppError::with_message(ErrorCode::InvalidSticker, "Unrecognized sticker id")
        .with_detail("stickerId", raw.clone())
}

/// A sticker placed on a board, validated from its stored JSON form
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSticker {
    pub sticker: StickerRef,
    pub x: f64,
    pub y: f64,
}

impl PlacedSticker {
    /// Validate a board sticker element: resolvable id and finite coordinates
    pub fn from_value(value: &Value) -> Result<Self, AppError> {
        let obj = value.as_object().ok_or_else(|| {
            AppError::with_message(ErrorCode::InvalidSticker, "Sticker must be an object")
        })?;
        let raw_id = obj.get("stickerId").ok_or_else(|| {
            AppError::with_message(ErrorCode::InvalidSticker, "Sticker is missing stickerId")
        })?;
        let sticker = StickerRef::resolve(raw_id)?;
        let x = coordinate(obj.get("x"), "x")?;
        let y = coordinate(obj.get("y"), "y")?;
        Ok(Self { sticker, x, y })
    }
}

fn coordinate(value: Option<&Value>, axis: &'static str) -> Result<f64, AppError> {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            AppError::with_message(ErrorCode::InvalidSticker, "Sticker coordinates must be finite numbers")
                .with_detail("field", axis)
        })
}
