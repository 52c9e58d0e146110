//! Condition / query compiler
//!
//! Callers build filters from property names ([`Condition`], [`ConditionGroup`]); `bake`
//! resolves them against a [`Schema`](crate::schema::Schema) into a sea-query condition
//! plus the joins relationship traversals need.
//!
//! ```
//! use tidemap::query::{Comparator, Condition};
//!
//! let filter = Condition::eq("name", "ada").or(Condition::new("id", Comparator::Greater, 10i64));
//! assert_eq!(filter.len(), 2);
//! ```

pub mod bake;
pub mod condition;
pub mod group;
pub mod iden;

pub use bake::{bake_traversal, Baked, Join};
pub use condition::{Comparator, Condition, Operand};
pub use group::{BoolOperator, ConditionGroup, Filter};
pub use iden::{qualified, Name};
