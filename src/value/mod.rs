//! Value type system for tidemap
//!
//! Conversions between Rust field types and `sea_query::Value`, plus the small helpers the
//! compiler, hydrator and statements share for storage representation.
//!
//! ## Traits
//!
//! - **`ValueType`** - Maps Rust types to their `sea_query::Value` variant and storage kind
//! - **`TryGetable`** - Lenient value extraction with error handling

pub mod types;
pub mod try_getable;

pub use types::{ColumnKind, ValueType};
pub use try_getable::{TryGetable, ValueExtractionError};

use chrono::NaiveDateTime;
use sea_query::Value;

/// Canonical text form of timestamps in storage and conditions
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse canonical timestamp text; a trailing fractional part or `T` separator is accepted.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Whether a value is any of the typed null variants
pub fn value_is_null(value: &Value) -> bool {
    match value {
        Value::Bool(v) => v.is_none(),
        Value::TinyInt(v) => v.is_none(),
        Value::SmallInt(v) => v.is_none(),
        Value::Int(v) => v.is_none(),
        Value::BigInt(v) => v.is_none(),
        Value::TinyUnsigned(v) => v.is_none(),
        Value::SmallUnsigned(v) => v.is_none(),
        Value::Unsigned(v) => v.is_none(),
        Value::BigUnsigned(v) => v.is_none(),
        Value::Float(v) => v.is_none(),
        Value::Double(v) => v.is_none(),
        Value::String(v) => v.is_none(),
        Value::Char(v) => v.is_none(),
        Value::Bytes(v) => v.is_none(),
        Value::Json(v) => v.is_none(),
        _ => false,
    }
}

/// Representation written to the database: booleans become `0`/`1`, JSON becomes text.
pub fn storage_value(value: Value) -> Value {
    match value {
        Value::Bool(Some(b)) => Value::Int(Some(b as i32)),
        Value::Bool(None) => Value::Int(None),
        Value::Json(Some(j)) => Value::String(Some(j.to_string())),
        Value::Json(None) => Value::String(None),
        other => other,
    }
}

/// Text used for identifier strings and collection keys
pub fn key_text(value: &Value) -> String {
    match value {
        Value::String(Some(s)) => s.clone(),
        Value::Char(Some(c)) => c.to_string(),
        Value::Bool(Some(b)) => (*b as i32).to_string(),
        Value::Json(Some(j)) => j.to_string(),
        v if value_is_null(v) => String::new(),
        other => String::try_get(other.clone()).unwrap_or_default(),
    }
}

/// JSON view of a value for snapshots and `to_json`
pub fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    if value_is_null(value) {
        return Json::Null;
    }
    match value {
        Value::Bool(Some(b)) => Json::Bool(*b),
        Value::Float(Some(f)) => serde_json::Number::from_f64(*f as f64).map_or(Json::Null, Json::Number),
        Value::Double(Some(f)) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::String(Some(s)) => Json::String(s.clone()),
        Value::Char(Some(c)) => Json::String(c.to_string()),
        Value::Json(Some(j)) => (**j).clone(),
        Value::Bytes(Some(b)) => Json::String(String::from_utf8_lossy(b).into_owned()),
        Value::BigUnsigned(Some(u)) => Json::from(*u),
        other => match i64::try_get(other.clone()) {
            Ok(i) => Json::from(i),
            Err(_) => Json::String(format!("{other:?}")),
        },
    }
}
