//! Model, Entity and ModelEnum traits
//!
//! These are normally implemented by `#[derive(Entity)]` and `#[derive(ModelEnum)]`.
//! `Model` is object safe: the hydrator, statements and collections only ever see
//! `dyn Model` through an [`Instance`](super::Instance). `Entity` adds the static side
//! (name, declarative metadata, blank construction) used by the registry.

use std::any::Any;

use sea_query::Value;

use crate::collection::ModelCollection;
use crate::error::MapperResult;
use crate::identity::ModelId;
use crate::schema::TableDefinition;
use crate::statement::{Count, Read, Search};
use crate::value::{TryGetable, ValueType};

use super::{ChangeTracker, RelatedSlot};

/// Dynamic access to a persisted struct
pub trait Model: Any {
    /// Registered entity name (the struct name)
    fn entity_name(&self) -> &'static str;

    /// Value of a column property, or of an enum-valued reference (as its variant name)
    ///
    /// Returns `None` for unknown properties and for relationship slots.
    fn get(&self, property: &str) -> Option<Value>;

    /// Assign a column property from a stored value without recording a modification
    fn set(&mut self, property: &str, value: Value) -> MapperResult<()>;

    /// To-one relationship slot of a property
    fn related(&self, property: &str) -> Option<&dyn RelatedSlot>;

    fn related_mut(&mut self, property: &str) -> Option<&mut dyn RelatedSlot>;

    /// To-many relationship collection of a property
    fn collection(&self, property: &str) -> Option<&ModelCollection>;

    fn collection_mut(&mut self, property: &str) -> Option<&mut ModelCollection>;

    fn tracker(&self) -> &ChangeTracker;

    fn tracker_mut(&mut self) -> &mut ChangeTracker;

    /// Identifier built from the `#[primary_key]` fields, in declaration order
    fn model_id(&self) -> ModelId;

    /// Column values as a JSON object
    fn to_json(&self) -> serde_json::Value;

    fn as_any(&self) -> &dyn Any;
}

/// Static side of a model type
///
/// # Example
///
/// ```no_run
/// use tidemap::{Entity, Registry};
///
/// #[derive(Entity)]
/// #[table_name = "user"]
/// pub struct User {
///     #[primary_key]
///     #[auto_increment]
///     pub id: i64,
///     #[max_length = 64]
///     pub name: String,
///     pub tracker: tidemap::ChangeTracker,
/// }
///
/// let registry = Registry::new();
/// registry.register::<User>();
/// let schema = registry.resolve("User").unwrap();
/// assert_eq!(schema.table_name, "user");
/// ```
pub trait Entity: Model + Sized {
    const NAME: &'static str;

    /// Write the declarative metadata of this type
    fn describe(def: &mut TableDefinition);

    /// Instance with every field at its default, used by the hydrator
    fn blank() -> Self;

    fn search() -> Search {
        Search::new(Self::NAME)
    }

    fn read() -> Read {
        Read::new(Self::NAME)
    }

    fn count() -> Count {
        Count::new(Self::NAME)
    }
}

/// Closed set of named values stored by variant name
pub trait ModelEnum: ValueType + TryGetable + Default + Clone + 'static {
    const NAME: &'static str;
    const VARIANTS: &'static [&'static str];

    fn variant_name(&self) -> &'static str;

    fn from_variant(name: &str) -> Option<Self>;
}
