//! Condition groups
//!
//! A group is an ordered list of `(operator, filter)` pairs folded left to right:
//! `a AND b OR c` compiles to `(a AND b) OR c`. There is no precedence rewriting; nest
//! groups to express anything else.

use super::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

/// A leaf condition or a nested group
#[derive(Debug, Clone)]
pub enum Filter {
    Condition(Condition),
    Group(ConditionGroup),
}

#[derive(Debug, Clone)]
pub struct ConditionGroup {
    items: Vec<(BoolOperator, Filter)>,
}

impl ConditionGroup {
    pub fn new(first: impl Into<Filter>) -> Self {
        Self {
            items: vec![(BoolOperator::And, first.into())],
        }
    }

    pub fn and(mut self, filter: impl Into<Filter>) -> Self {
        self.items.push((BoolOperator::And, filter.into()));
        self
    }

    pub fn or(mut self, filter: impl Into<Filter>) -> Self {
        self.items.push((BoolOperator::Or, filter.into()));
        self
    }

    pub fn items(&self) -> &[(BoolOperator, Filter)] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<ConditionGroup> for Filter {
    fn from(group: ConditionGroup) -> Self {
        Filter::Group(group)
    }
}

impl Filter {
    pub fn and(self, other: impl Into<Filter>) -> Filter {
        Filter::Group(ConditionGroup::new(self).and(other))
    }

    pub fn or(self, other: impl Into<Filter>) -> Filter {
        Filter::Group(ConditionGroup::new(self).or(other))
    }

    /// The single leaf of a filter that is just one condition
    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Filter::Condition(condition) => Some(condition),
            Filter::Group(group) => match group.items() {
                [(_, only)] => only.as_condition(),
                _ => None,
            },
        }
    }
}
