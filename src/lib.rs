//! # tidemap
//!
//! Data-mapping core: declaratively described model types are resolved into schemas,
//! filters compile to SQL through sea-query, rows hydrate into identity-cached object
//! graphs with lazy relationships, and many-to-many collection edits are written back
//! as join-table statements.
//!
//! ```no_run
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use tidemap::driver::{Backend, MockDatabase};
//! use tidemap::{ChangeTracker, Condition, Entity, Registry, Session};
//!
//! #[derive(Entity)]
//! #[table_name = "user"]
//! pub struct User {
//!     #[primary_key]
//!     #[auto_increment]
//!     pub id: i64,
//!     pub name: String,
//!     pub tracker: ChangeTracker,
//! }
//!
//! let registry = Arc::new(Registry::new());
//! registry.register::<User>();
//! let session = Session::builder(registry)
//!     .database(Rc::new(MockDatabase::new(Backend::MySql)))
//!     .build();
//! let mut users = User::search()
//!     .filter(Condition::like("name", "a%"))
//!     .execute(&session)?;
//! for entry in users.iter() {
//!     let (key, user) = entry?;
//!     println!("{key}: {}", user.borrow().to_json());
//! }
//! # Ok::<(), tidemap::MapperError>(())
//! ```

extern crate self as tidemap;

pub mod cache;
pub mod collection;
pub mod config;
pub mod driver;
pub mod error;
pub mod hydrator;
pub mod identity;
pub mod metrics;
pub mod model;
pub mod query;
pub mod schema;
pub mod session;
pub mod statement;
pub mod value;

pub use cache::{IdentityMap, MemoryCache, ObjectCache};
pub use collection::{CollectionSnapshot, ModelCollection};
pub use config::MapperConfig;
pub use driver::{Backend, Cursor, Database, Row};
pub use error::{MapperError, MapperResult};
pub use hydrator::Hydrator;
pub use identity::ModelId;
pub use model::{ChangeTracker, Entity, Instance, Model, ModelEnum, Related, RelatedSlot};
pub use query::{BoolOperator, Comparator, Condition, ConditionGroup, Filter, Operand};
pub use schema::{Cardinality, Registry, Schema, TableDefinition};
pub use session::{Session, WeakSession};
pub use statement::{
    Count, CountResult, Create, Delete, Order, Read, Search, StatementState, Update,
};
pub use value::{TryGetable, ValueType};

pub use tidemap_derive::{Entity, ModelEnum};

/// Re-exported for generated code and for callers building values directly
pub use sea_query;
#[doc(hidden)]
pub use serde_json;
