//! Schema resolution
//!
//! - [`TableDefinition`]: declarative metadata a type writes about itself
//! - [`Registry`]: registered types, resolution and the schema cache
//! - [`Schema`], [`Column`], [`Reference`]: the resolved, immutable result

pub mod column;
pub mod definition;
pub mod reference;
pub mod registry;
pub mod table;

pub use column::{enum_column_type, infer_column_type, Column, DefaultValue};
pub use definition::{ColumnDefinition, ReferenceDefinition, TableDefinition};
pub use reference::{lcfirst, ucfirst, Cardinality, Reference};
pub use registry::{Registry, SharedSchemaCache};
pub use table::{Schema, DISCRIMINATOR_COLUMN};
