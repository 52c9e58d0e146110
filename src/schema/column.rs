//! Resolved column metadata and type inference.

use chrono::Local;
use sea_query::Value;
use serde::Serialize;

use crate::value::{format_timestamp, ColumnKind};

/// Value written when an insert leaves a non-nullable column unset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    /// Current local time, rendered at insert
    Now,
}

impl DefaultValue {
    /// Storage value of the default; `Now` is evaluated at the call
    pub fn to_value(&self) -> Value {
        match self {
            DefaultValue::Null => Value::String(None),
            DefaultValue::Bool(b) => Value::Int(Some(*b as i32)),
            DefaultValue::Int(i) => Value::BigInt(Some(*i)),
            DefaultValue::Double(d) => Value::Double(Some(*d)),
            DefaultValue::Text(s) => Value::String(Some(s.clone())),
            DefaultValue::Now => Value::String(Some(format_timestamp(&Local::now().naive_local()))),
        }
    }

    /// Parse an attribute literal: `NULL`, `NOW`/`CURRENT_TIMESTAMP`, booleans, numbers,
    /// anything else as text
    pub fn parse(literal: &str) -> Self {
        match literal.trim() {
            l if l.eq_ignore_ascii_case("null") => DefaultValue::Null,
            l if l.eq_ignore_ascii_case("now") || l.eq_ignore_ascii_case("current_timestamp") => {
                DefaultValue::Now
            }
            "true" => DefaultValue::Bool(true),
            "false" => DefaultValue::Bool(false),
            l => {
                if let Ok(i) = l.parse::<i64>() {
                    DefaultValue::Int(i)
                } else if let Ok(d) = l.parse::<f64>() {
                    DefaultValue::Double(d)
                } else {
                    DefaultValue::Text(l.to_string())
                }
            }
        }
    }

    /// Default captured from a property value of a default-constructed model
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(Some(b)) => Some(DefaultValue::Bool(*b)),
            Value::TinyInt(Some(v)) => Some(DefaultValue::Int(*v as i64)),
            Value::SmallInt(Some(v)) => Some(DefaultValue::Int(*v as i64)),
            Value::Int(Some(v)) => Some(DefaultValue::Int(*v as i64)),
            Value::BigInt(Some(v)) => Some(DefaultValue::Int(*v)),
            Value::TinyUnsigned(Some(v)) => Some(DefaultValue::Int(*v as i64)),
            Value::SmallUnsigned(Some(v)) => Some(DefaultValue::Int(*v as i64)),
            Value::Unsigned(Some(v)) => Some(DefaultValue::Int(*v as i64)),
            Value::BigUnsigned(Some(v)) => i64::try_from(*v).ok().map(DefaultValue::Int),
            Value::Float(Some(v)) => Some(DefaultValue::Double(*v as f64)),
            Value::Double(Some(v)) => Some(DefaultValue::Double(*v)),
            Value::String(Some(s)) => Some(DefaultValue::Text(s.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub property: String,
    pub name: String,
    pub column_type: String,
    pub nullable: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default: Option<DefaultValue>,
    /// Extra column modifier, e.g. `ON UPDATE CURRENT_TIMESTAMP`
    pub extra: Option<String>,
}

/// Database type inferred from the storage kind of a property
///
/// ```
/// use tidemap::schema::infer_column_type;
/// use tidemap::value::ColumnKind;
///
/// assert_eq!(infer_column_type(ColumnKind::Text, Some(32)), "VARCHAR(32)");
/// assert_eq!(infer_column_type(ColumnKind::Enum(&["A", "B"]), None), "ENUM('A','B')");
/// ```
pub fn infer_column_type(kind: ColumnKind, max_length: Option<u32>) -> String {
    match kind {
        ColumnKind::Integer => match max_length {
            Some(n) => format!("INT({n})"),
            None => "INT".to_string(),
        },
        ColumnKind::BigUnsigned => "BIGINT UNSIGNED".to_string(),
        ColumnKind::Bool => "TINYINT(1)".to_string(),
        ColumnKind::Double => "DOUBLE".to_string(),
        ColumnKind::Text => match max_length {
            Some(n) => format!("VARCHAR({n})"),
            None => "TEXT".to_string(),
        },
        ColumnKind::Bytes => "BLOB".to_string(),
        ColumnKind::DateTime => "DATETIME".to_string(),
        ColumnKind::Json => "TEXT".to_string(),
        ColumnKind::Enum(variants) => enum_column_type(variants.iter().copied()),
    }
}

/// `ENUM('A','B',...)` over the given names
pub fn enum_column_type<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = names
        .into_iter()
        .map(|n| format!("'{}'", n.replace('\'', "''")))
        .collect();
    format!("ENUM({})", quoted.join(","))
}
