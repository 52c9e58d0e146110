//! Procedural macros for tidemap
//!
//! This crate provides the `Entity` and `ModelEnum` derives.

mod attributes;
mod macros;
mod utils;

use proc_macro::TokenStream;

/// Derive macro for `Entity` - generates the `Model` and `Entity` implementations
///
/// This macro generates:
/// - `Model` (dynamic `get` / `set`, relationship slots, identifier, JSON view)
/// - `Entity` (`NAME`, `describe` filling a `TableDefinition`, `blank`)
/// - a `set_<field>` setter per column and to-one field that records the modification
///
/// The struct needs exactly one `ChangeTracker` field. `Related<T>` fields are to-one
/// relationships, `ModelCollection` fields to-many relationships; both carry a
/// `#[reference(...)]` attribute.
///
/// # Example
///
/// ```ignore
/// #[derive(Entity)]
/// #[table_name = "user"]
/// pub struct User {
///     #[primary_key]
///     #[auto_increment]
///     pub id: i64,
///     #[max_length = 64]
///     pub name: String,
///     #[reference(many_to_many, target = "Group")]
///     pub groups: ModelCollection,
///     pub tracker: ChangeTracker,
/// }
/// ```
#[proc_macro_derive(
    Entity,
    attributes(
        table_name,
        super_type,
        sub_type_of,
        sub_types,
        inherit_columns,
        table_defaults,
        primary_key,
        column_name,
        column_type,
        max_length,
        nullable,
        unique,
        auto_increment,
        default_value,
        column_extra,
        reference,
        skip
    )
)]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    macros::derive_entity(input)
}

/// Derive macro for `ModelEnum` - closed sets of named values stored by variant name
///
/// Generates `ValueType`, `TryGetable` and `ModelEnum` for a fieldless enum. The enum
/// must also implement `Default` and `Clone`.
#[proc_macro_derive(ModelEnum, attributes(enum_name))]
pub fn derive_model_enum(input: TokenStream) -> TokenStream {
    macros::derive_model_enum(input)
}
