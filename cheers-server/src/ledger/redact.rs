//! Payload redaction
//!
//! Ledger entries keep a snapshot of the request for diagnosis, not a copy of
//! it: credentials are dropped, long arrays become `<key>Count`, long strings
//! are cut.

use serde_json::{Map, Value};

/// Arrays longer than this are replaced by their length
const MAX_INLINE_ARRAY: usize = 5;
const MAX_STRING_CHARS: usize = 256;
const MAX_DEPTH: usize = 4;

const SENSITIVE_KEYS: &[&str] = &["password", "token", "accessToken", "refreshToken", "secret", "authorization"];

/// Redacted snapshot of a request body
pub fn redact(value: &Value) -> Value {
    redact_at(value, 0)
}

fn redact_at(value: &Value, depth: usize) -> Value {
    match value {
        Value::Object(map) if depth >= MAX_DEPTH => Value::String(format!("<{} fields>", map.len())),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                if SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                    continue;
                }
                match inner {
                    Value::Array(items) if items.len() > MAX_INLINE_ARRAY => {
                        out.insert(format!("{key}Count"), Value::from(items.len()));
                    }
                    _ => {
                        out.insert(key.clone(), redact_at(inner, depth + 1));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) if items.len() > MAX_INLINE_ARRAY => Value::from(items.len()),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_at(v, depth + 1)).collect()),
        Value::String(s) if s.chars().count() > MAX_STRING_CHARS => {
            let mut cut: String = s.chars().take(MAX_STRING_CHARS).collect();
            cut.push('…');
            Value::String(cut)
        }
        other => other.clone(),
    }
}
