//! Leaf conditions

use std::fmt;

use chrono::NaiveDateTime;
use sea_query::Value;

use crate::collection::ModelCollection;
use crate::error::MapperResult;
use crate::model::Instance;
use crate::value::ValueType;

use super::{ConditionGroup, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
}

impl Comparator {
    pub fn is_set(self) -> bool {
        matches!(self, Comparator::In | Comparator::NotIn)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparator::Equal => "=",
            Comparator::NotEqual => "<>",
            Comparator::Less => "<",
            Comparator::LessOrEqual => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterOrEqual => ">=",
            Comparator::Like => "LIKE",
            Comparator::NotLike => "NOT LIKE",
            Comparator::In => "IN",
            Comparator::NotIn => "NOT IN",
        };
        f.write_str(symbol)
    }
}

/// Right-hand side of a condition
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    List(Vec<Value>),
    Model(Instance),
    Models(Vec<Instance>),
}

impl Operand {
    pub fn null() -> Self {
        Operand::Value(Value::String(None))
    }

    /// Any mapped value, including `#[derive(ModelEnum)]` enums
    pub fn value(value: impl ValueType) -> Self {
        Operand::Value(value.into_value())
    }

    pub fn list<V: ValueType>(values: impl IntoIterator<Item = V>) -> Self {
        Operand::List(values.into_iter().map(ValueType::into_value).collect())
    }

    /// Every member of a collection, for `In` / `NotIn` over a reference
    ///
    /// Runs the collection's query if it has not been executed yet.
    pub fn models(collection: &mut ModelCollection) -> MapperResult<Self> {
        Ok(Operand::Models(collection.as_array()?))
    }
}

macro_rules! impl_operand_from {
    ($($type:ty),* $(,)?) => {
        $(
            impl From<$type> for Operand {
                fn from(value: $type) -> Self {
                    Operand::Value(ValueType::into_value(value))
                }
            }
        )*
    };
}

impl_operand_from!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String, NaiveDateTime);

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Value(Value::String(Some(value.to_string())))
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<Vec<Value>> for Operand {
    fn from(values: Vec<Value>) -> Self {
        Operand::List(values)
    }
}

impl From<Instance> for Operand {
    fn from(instance: Instance) -> Self {
        Operand::Model(instance)
    }
}

impl From<&Instance> for Operand {
    fn from(instance: &Instance) -> Self {
        Operand::Model(instance.clone())
    }
}

impl From<Vec<Instance>> for Operand {
    fn from(instances: Vec<Instance>) -> Self {
        Operand::Models(instances)
    }
}

/// `property <comparator> operand`
#[derive(Debug, Clone)]
pub struct Condition {
    pub property: String,
    pub comparator: Comparator,
    pub operand: Operand,
}

impl Condition {
    pub fn new(property: &str, comparator: Comparator, operand: impl Into<Operand>) -> Self {
        Self {
            property: property.to_string(),
            comparator,
            operand: operand.into(),
        }
    }

    pub fn eq(property: &str, operand: impl Into<Operand>) -> Self {
        Self::new(property, Comparator::Equal, operand)
    }

    pub fn ne(property: &str, operand: impl Into<Operand>) -> Self {
        Self::new(property, Comparator::NotEqual, operand)
    }

    pub fn lt(property: &str, operand: impl Into<Operand>) -> Self {
        Self::new(property, Comparator::Less, operand)
    }

    pub fn lte(property: &str, operand: impl Into<Operand>) -> Self {
        Self::new(property, Comparator::LessOrEqual, operand)
    }

    pub fn gt(property: &str, operand: impl Into<Operand>) -> Self {
        Self::new(property, Comparator::Greater, operand)
    }

    pub fn gte(property: &str, operand: impl Into<Operand>) -> Self {
        Self::new(property, Comparator::GreaterOrEqual, operand)
    }

    pub fn like(property: &str, pattern: &str) -> Self {
        Self::new(property, Comparator::Like, pattern)
    }

    pub fn not_like(property: &str, pattern: &str) -> Self {
        Self::new(property, Comparator::NotLike, pattern)
    }

    pub fn is_in(property: &str, operand: impl Into<Operand>) -> Self {
        Self::new(property, Comparator::In, operand)
    }

    pub fn not_in(property: &str, operand: impl Into<Operand>) -> Self {
        Self::new(property, Comparator::NotIn, operand)
    }

    pub fn and(self, other: impl Into<Filter>) -> ConditionGroup {
        ConditionGroup::new(self).and(other)
    }

    pub fn or(self, other: impl Into<Filter>) -> ConditionGroup {
        ConditionGroup::new(self).or(other)
    }

    /// Whether this is a sole equality on the given property with a plain value
    pub(crate) fn equality_on(&self, property: &str) -> Option<&Value> {
        match (&self.comparator, &self.operand) {
            (Comparator::Equal, Operand::Value(v)) if self.property == property => Some(v),
            _ => None,
        }
    }
}

impl From<Condition> for Filter {
    fn from(condition: Condition) -> Self {
        Filter::Condition(condition)
    }
}
