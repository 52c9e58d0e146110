//! Ordered identifier of a persisted model
//!
//! A [`ModelId`] holds one value per identifier property, in declaration order. Its
//! canonical string form (parts joined with `", "`) is only used as a map key by the
//! identity cache and by collections; business logic works with the parts.

use std::fmt;

use sea_query::Value;

use crate::value::{key_text, value_is_null, TryGetable};

/// Ordered, fixed-arity identifier key
///
/// # Example
///
/// ```
/// use tidemap::identity::ModelId;
/// use sea_query::Value;
///
/// let id = ModelId::new(vec![Value::BigInt(Some(3)), Value::BigInt(Some(7))]);
/// assert_eq!(id.arity(), 2);
/// assert_eq!(id.canonical(), "3, 7");
/// assert!(id.is_cacheable());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModelId {
    parts: Vec<Value>,
}

impl ModelId {
    pub fn new(parts: Vec<Value>) -> Self {
        Self { parts }
    }

    pub fn single(value: impl Into<Value>) -> Self {
        Self {
            parts: vec![value.into()],
        }
    }

    pub fn arity(&self) -> usize {
        self.parts.len()
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Value> {
        self.parts
    }

    /// The sole part of a single-column identifier
    pub fn as_single(&self) -> Option<&Value> {
        match self.parts.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Canonical lookup key, parts joined with `", "`
    pub fn canonical(&self) -> String {
        canonical_key(&self.parts)
    }

    /// Every part present and non-null
    pub fn is_complete(&self) -> bool {
        !self.parts.is_empty() && self.parts.iter().all(|p| !value_is_null(p))
    }

    /// Complete, and no integer part still at its zero default
    pub fn is_assigned(&self) -> bool {
        self.is_complete()
            && self.parts.iter().all(|p| match p {
                Value::String(_) | Value::Char(_) | Value::Bytes(_) | Value::Json(_) => true,
                other => i64::try_get(other.clone()).map(|v| v != 0).unwrap_or(true),
            })
    }

    /// Whether an instance with this identifier may enter the identity cache.
    ///
    /// Only strictly positive integer parts qualify: text, empty, null and non-positive
    /// identifiers are synthetic or enumerated and are never cached.
    pub fn is_cacheable(&self) -> bool {
        self.is_complete()
            && self.parts.iter().all(|p| match p {
                Value::String(_) | Value::Char(_) | Value::Bytes(_) | Value::Json(_) => false,
                other => i64::try_get(other.clone()).map(|v| v > 0).unwrap_or(false),
            })
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Join identifier values into the canonical `", "` form
pub fn canonical_key(parts: &[Value]) -> String {
    parts.iter().map(key_text).collect::<Vec<_>>().join(", ")
}
