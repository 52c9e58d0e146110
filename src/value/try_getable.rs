//! TryGetable trait for safe value extraction
//!
//! Drivers do not agree on the variant they hand back for a column: MySQL-style drivers
//! return text for everything, SQLite widens integers, booleans come back as `0`/`1`.
//! Extraction therefore widens and parses where the conversion is lossless, and reports a
//! [`ValueExtractionError`] otherwise.

use chrono::NaiveDateTime;
use sea_query::Value;

use super::{parse_timestamp, value_is_null, ValueType};

/// Error type for value extraction failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExtractionError {
    /// The value is null (None variant)
    NullValue,
    /// The value type doesn't match the expected type
    TypeMismatch { expected: String, actual: String },
    /// Value conversion failed (e.g., overflow, invalid format)
    ConversionError(String),
}

impl std::fmt::Display for ValueExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueExtractionError::NullValue => write!(f, "Value is null"),
            ValueExtractionError::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {}, got {}", expected, actual)
            }
            ValueExtractionError::ConversionError(msg) => {
                write!(f, "Conversion error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValueExtractionError {}

/// Trait for safe value extraction with error handling
///
/// ```rust
/// use tidemap::value::{TryGetable, ValueExtractionError};
/// use sea_query::Value;
///
/// let result: Result<i32, ValueExtractionError> = TryGetable::try_get(Value::BigInt(Some(42)));
/// assert_eq!(result, Ok(42));
///
/// let flag: Result<bool, ValueExtractionError> = TryGetable::try_get(Value::String(Some("1".into())));
/// assert_eq!(flag, Ok(true));
/// ```
pub trait TryGetable: ValueType {
    /// Try to extract a value from `sea_query::Value`, returning an error if extraction fails.
    fn try_get(value: Value) -> Result<Self, ValueExtractionError>;

    /// Try to extract a value, allowing null values to return `None`.
    fn try_get_opt(value: Value) -> Result<Option<Self>, ValueExtractionError> {
        match Self::try_get(value) {
            Ok(v) => Ok(Some(v)),
            Err(ValueExtractionError::NullValue) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn mismatch(expected: &str, value: &Value) -> ValueExtractionError {
    ValueExtractionError::TypeMismatch {
        expected: expected.to_string(),
        actual: format!("{:?}", value),
    }
}

/// Widen any integer-like value to `i128`
fn integer(value: &Value, expected: &str) -> Result<i128, ValueExtractionError> {
    if value_is_null(value) {
        return Err(ValueExtractionError::NullValue);
    }
    match value {
        Value::TinyInt(Some(v)) => Ok(*v as i128),
        Value::SmallInt(Some(v)) => Ok(*v as i128),
        Value::Int(Some(v)) => Ok(*v as i128),
        Value::BigInt(Some(v)) => Ok(*v as i128),
        Value::TinyUnsigned(Some(v)) => Ok(*v as i128),
        Value::SmallUnsigned(Some(v)) => Ok(*v as i128),
        Value::Unsigned(Some(v)) => Ok(*v as i128),
        Value::BigUnsigned(Some(v)) => Ok(*v as i128),
        Value::Bool(Some(v)) => Ok(*v as i128),
        Value::Double(Some(v)) if v.fract() == 0.0 => Ok(*v as i128),
        Value::String(Some(s)) => s.trim().parse::<i128>().map_err(|e| {
            ValueExtractionError::ConversionError(format!("\"{s}\" is not an integer: {e}"))
        }),
        _ => Err(mismatch(expected, value)),
    }
}

macro_rules! impl_try_getable_int {
    ($type:ty, $expected:expr) => {
        impl TryGetable for $type {
            fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
                let wide = integer(&value, $expected)?;
                <$type>::try_from(wide).map_err(|_| {
                    ValueExtractionError::ConversionError(format!(
                        "{} out of range for {}",
                        wide, $expected
                    ))
                })
            }
        }
    };
}

impl_try_getable_int!(i8, "i8");
impl_try_getable_int!(i16, "i16");
impl_try_getable_int!(i32, "i32");
impl_try_getable_int!(i64, "i64");
impl_try_getable_int!(u8, "u8");
impl_try_getable_int!(u16, "u16");
impl_try_getable_int!(u32, "u32");
impl_try_getable_int!(u64, "u64");

impl TryGetable for f64 {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::Double(Some(v)) => Ok(v),
            Value::Float(Some(v)) => Ok(v as f64),
            Value::String(Some(ref s)) => s.trim().parse::<f64>().map_err(|e| {
                ValueExtractionError::ConversionError(format!("\"{s}\" is not a number: {e}"))
            }),
            ref other if value_is_null(other) => Err(ValueExtractionError::NullValue),
            other => integer(&other, "f64").map(|v| v as f64),
        }
    }
}

impl TryGetable for f32 {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        f64::try_get(value).map(|v| v as f32)
    }
}

impl TryGetable for bool {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::Bool(Some(v)) => Ok(v),
            Value::String(Some(ref s)) => match s.trim() {
                "1" | "true" | "TRUE" => Ok(true),
                "0" | "false" | "FALSE" | "" => Ok(false),
                _ => Err(ValueExtractionError::ConversionError(format!(
                    "\"{s}\" is not a boolean"
                ))),
            },
            other => integer(&other, "bool").map(|v| v != 0),
        }
    }
}

impl TryGetable for String {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::String(Some(s)) => Ok(s),
            Value::Char(Some(c)) => Ok(c.to_string()),
            Value::Double(Some(v)) => Ok(v.to_string()),
            Value::Float(Some(v)) => Ok(v.to_string()),
            Value::Bytes(Some(b)) => String::from_utf8(b)
                .map_err(|e| ValueExtractionError::ConversionError(e.to_string())),
            other => integer(&other, "String").map(|v| v.to_string()),
        }
    }
}

impl TryGetable for Vec<u8> {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::Bytes(Some(b)) => Ok(b),
            Value::String(Some(s)) => Ok(s.into_bytes()),
            ref other if value_is_null(other) => Err(ValueExtractionError::NullValue),
            other => Err(mismatch("Bytes", &other)),
        }
    }
}

impl TryGetable for serde_json::Value {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::Json(Some(j)) => Ok(*j),
            Value::String(Some(s)) => serde_json::from_str(&s)
                .map_err(|e| ValueExtractionError::ConversionError(format!("invalid JSON: {e}"))),
            ref other if value_is_null(other) => Err(ValueExtractionError::NullValue),
            other => Err(mismatch("Json", &other)),
        }
    }
}

impl TryGetable for NaiveDateTime {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::String(Some(s)) => parse_timestamp(&s).ok_or_else(|| {
                ValueExtractionError::ConversionError(format!("\"{s}\" is not a timestamp"))
            }),
            ref other if value_is_null(other) => Err(ValueExtractionError::NullValue),
            other => Err(mismatch("timestamp text", &other)),
        }
    }
}

impl<T: TryGetable> TryGetable for Option<T> {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        T::try_get_opt(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widening_and_range() {
        assert_eq!(i64::try_get(Value::Int(Some(5))), Ok(5));
        assert_eq!(u8::try_get(Value::BigInt(Some(255))), Ok(255));
        assert!(matches!(
            u8::try_get(Value::BigInt(Some(256))),
            Err(ValueExtractionError::ConversionError(_))
        ));
        assert_eq!(i32::try_get(Value::String(Some(" 12 ".into()))), Ok(12));
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(i32::try_get(Value::Int(None)), Err(ValueExtractionError::NullValue));
        assert_eq!(<Option<i32>>::try_get(Value::String(None)), Ok(None));
        assert_eq!(<Option<String>>::try_get(Value::String(Some("x".into()))), Ok(Some("x".to_string())));
    }

    #[test]
    fn test_bool_from_tinyint() {
        assert_eq!(bool::try_get(Value::TinyInt(Some(1))), Ok(true));
        assert_eq!(bool::try_get(Value::Int(Some(0))), Ok(false));
    }

    #[test]
    fn test_json_from_text() {
        let v = serde_json::Value::try_get(Value::String(Some("{\"a\":1}".into()))).expect("json");
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn test_timestamp_mismatch() {
        assert!(matches!(
            NaiveDateTime::try_get(Value::Int(Some(3))),
            Err(ValueExtractionError::TypeMismatch { .. })
        ));
    }
}
