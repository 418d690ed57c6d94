//! Sticker Board Models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Board as stored and returned to clients
///
/// `stickers` keeps the raw JSON elements so an unchanged prefix compares
/// exactly against what the client sent back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub stickers: Vec<Value>,
    /// Optimistic concurrency counter, bumped on every write
    pub version: i64,
    pub updated_at: i64,
}

/// Update board payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardUpdate {
    pub op_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub stickers: Option<Vec<Value>>,
    /// Any other field the client sent
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl BoardUpdate {
    /// Field names other than `stickers` / `opId` present in the request
    pub fn non_sticker_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.other.keys().cloned().collect();
        if self.name.is_some() {
            fields.push("name".to_string());
        }
        if self.description.is_some() {
            fields.push("description".to_string());
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_sticker_fields() {
        let update: BoardUpdate = serde_json::from_value(json!({
            "opId": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "stickers": [],
        }))
        .unwrap();
        assert!(update.non_sticker_fields().is_empty());

        let update: BoardUpdate = serde_json::from_value(json!({
            "stickers": [],
            "name": "mine now",
            "isPublic": false,
        }))
        .unwrap();
        let mut fields = update.non_sticker_fields();
        fields.sort();
        assert_eq!(fields, vec!["isPublic".to_string(), "name".to_string()]);
    }
}
