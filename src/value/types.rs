//! ValueType trait mapping Rust field types to `sea_query::Value` and to a storage kind
//!
//! The storage kind is what the schema resolver uses to infer a column type when the
//! declaration does not carry an explicit one.
//!
//! ```rust
//! use tidemap::value::{ColumnKind, ValueType};
//! use sea_query::Value;
//!
//! assert!(matches!(ValueType::into_value(42i32), Value::Int(Some(42))));
//! assert!(matches!(<Option<String>>::column_kind(), ColumnKind::Text));
//! assert!(<Option<String>>::is_nullable());
//! ```

use chrono::NaiveDateTime;
use sea_query::Value;

use super::format_timestamp;

/// Storage family of a property, used for column type inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Signed or small unsigned integer (`INT` / `INT(n)`)
    Integer,
    /// 64-bit unsigned integer (`BIGINT UNSIGNED`)
    BigUnsigned,
    /// Boolean stored as `TINYINT(1)`
    Bool,
    /// Floating point (`DOUBLE`)
    Double,
    /// Text (`VARCHAR(n)` / `TEXT`)
    Text,
    /// Binary blob (`BLOB`)
    Bytes,
    /// Timestamp stored as canonical text (`DATETIME`)
    DateTime,
    /// Structured value stored as encoded text (`TEXT`)
    Json,
    /// Closed set of variant names (`ENUM('A','B')`)
    Enum(&'static [&'static str]),
}

/// Trait for mapping Rust types to their corresponding `sea_query::Value` variant.
pub trait ValueType: Sized {
    /// Convert this value into a `sea_query::Value`.
    fn into_value(self) -> Value;

    /// Return the null variant for this type.
    fn null_value() -> Value;

    /// Storage kind used when inferring a column type
    fn column_kind() -> ColumnKind;

    /// Whether the property accepts null (`Option<T>`)
    fn is_nullable() -> bool {
        false
    }
}

macro_rules! impl_value_type {
    ($type:ty, $variant:ident, $kind:expr) => {
        impl ValueType for $type {
            fn into_value(self) -> Value {
                Value::$variant(Some(self))
            }

            fn null_value() -> Value {
                Value::$variant(None)
            }

            fn column_kind() -> ColumnKind {
                $kind
            }
        }
    };
}

impl_value_type!(i8, TinyInt, ColumnKind::Integer);
impl_value_type!(i16, SmallInt, ColumnKind::Integer);
impl_value_type!(i32, Int, ColumnKind::Integer);
impl_value_type!(i64, BigInt, ColumnKind::Integer);
impl_value_type!(u8, TinyUnsigned, ColumnKind::Integer);
impl_value_type!(u16, SmallUnsigned, ColumnKind::Integer);
impl_value_type!(u32, Unsigned, ColumnKind::Integer);
impl_value_type!(u64, BigUnsigned, ColumnKind::BigUnsigned);
impl_value_type!(f32, Float, ColumnKind::Double);
impl_value_type!(f64, Double, ColumnKind::Double);
impl_value_type!(bool, Bool, ColumnKind::Bool);
impl_value_type!(String, String, ColumnKind::Text);
impl_value_type!(Vec<u8>, Bytes, ColumnKind::Bytes);

impl ValueType for serde_json::Value {
    fn into_value(self) -> Value {
        Value::Json(Some(Box::new(self)))
    }

    fn null_value() -> Value {
        Value::Json(None)
    }

    fn column_kind() -> ColumnKind {
        ColumnKind::Json
    }
}

// Timestamps travel as canonical text so every backend stores the same representation.
impl ValueType for NaiveDateTime {
    fn into_value(self) -> Value {
        Value::String(Some(format_timestamp(&self)))
    }

    fn null_value() -> Value {
        Value::String(None)
    }

    fn column_kind() -> ColumnKind {
        ColumnKind::DateTime
    }
}

impl<T: ValueType> ValueType for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => T::null_value(),
        }
    }

    fn null_value() -> Value {
        T::null_value()
    }

    fn column_kind() -> ColumnKind {
        T::column_kind()
    }

    fn is_nullable() -> bool {
        true
    }
}
