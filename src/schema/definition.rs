//! Declarative metadata of a model type
//!
//! `#[derive(Entity)]` generates an `Entity::describe` that fills a [`TableDefinition`].
//! The same builder can be written by hand, and shared column groups can be pulled in
//! with [`TableDefinition::mixin`].
//!
//! ```
//! use tidemap::schema::{Cardinality, TableDefinition};
//!
//! let mut def = TableDefinition::new("Group");
//! def.table_name("group");
//! def.column::<i64>("id").primary_key().auto_increment();
//! def.column::<String>("name").max_length(64);
//! def.reference("users", Cardinality::ManyToMany, "User");
//! assert_eq!(def.columns.len(), 2);
//! ```

use crate::model::Model;
use crate::value::{ColumnKind, ValueType};

use super::{Cardinality, DefaultValue};

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub entity: &'static str,
    pub table_name: Option<String>,
    /// Fall back to the entity name when no table name is given
    pub use_declared_names: bool,
    /// Keep columns the super-type also declares; defaults to `true`, `false` for sub-types
    pub inherit_columns: Option<bool>,
    pub is_super_type: bool,
    pub sub_type_of: Option<&'static str>,
    pub sub_types: Vec<&'static str>,
    pub columns: Vec<ColumnDefinition>,
    pub references: Vec<ReferenceDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub property: String,
    pub name: Option<String>,
    pub column_type: Option<String>,
    pub kind: ColumnKind,
    pub max_length: Option<u32>,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default: Option<DefaultValue>,
    pub extra: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDefinition {
    pub property: String,
    pub cardinality: Cardinality,
    pub target: &'static str,
    pub column: Option<String>,
    pub foreign_table: Option<String>,
    pub foreign_column: Option<String>,
    pub foreign_right_column: Option<String>,
    pub nullable: Option<bool>,
}

impl TableDefinition {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            table_name: None,
            use_declared_names: true,
            inherit_columns: None,
            is_super_type: false,
            sub_type_of: None,
            sub_types: Vec::new(),
            columns: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn table_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn super_type(&mut self) -> &mut Self {
        self.is_super_type = true;
        self
    }

    pub fn sub_type_of(&mut self, entity: &'static str) -> &mut Self {
        self.sub_type_of = Some(entity);
        self
    }

    pub fn sub_types(&mut self, entities: &[&'static str]) -> &mut Self {
        self.sub_types.extend_from_slice(entities);
        self
    }

    pub fn inherit_columns(&mut self, inherit: bool) -> &mut Self {
        self.inherit_columns = Some(inherit);
        self
    }

    /// Declare a column whose storage kind and nullability follow the Rust type `V`
    pub fn column<V: ValueType>(&mut self, property: &str) -> &mut ColumnDefinition {
        let kind = V::column_kind();
        let nullable = V::is_nullable();
        self.column_of_kind(property, kind, nullable)
    }

    pub fn column_of_kind(
        &mut self,
        property: &str,
        kind: ColumnKind,
        nullable: bool,
    ) -> &mut ColumnDefinition {
        self.columns.retain(|c| c.property != property);
        self.columns.push(ColumnDefinition {
            property: property.to_string(),
            name: None,
            column_type: None,
            kind,
            max_length: None,
            nullable,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default: None,
            extra: None,
        });
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    pub fn reference(
        &mut self,
        property: &str,
        cardinality: Cardinality,
        target: &'static str,
    ) -> &mut ReferenceDefinition {
        self.references.retain(|r| r.property != property);
        self.references.push(ReferenceDefinition {
            property: property.to_string(),
            cardinality,
            target,
            column: None,
            foreign_table: None,
            foreign_column: None,
            foreign_right_column: None,
            nullable: None,
        });
        let last = self.references.len() - 1;
        &mut self.references[last]
    }

    /// Append the columns and references another describe function declares
    pub fn mixin(&mut self, describe: fn(&mut TableDefinition)) -> &mut Self {
        let mut other = TableDefinition::new(self.entity);
        describe(&mut other);
        for column in other.columns {
            self.columns.retain(|c| c.property != column.property);
            self.columns.push(column);
        }
        for reference in other.references {
            self.references.retain(|r| r.property != reference.property);
            self.references.push(reference);
        }
        self
    }

    /// Capture defaults for columns that declared none from a default-constructed model
    pub fn defaults_from(&mut self, model: &dyn Model) -> &mut Self {
        for column in self.columns.iter_mut().filter(|c| c.default.is_none()) {
            if let Some(value) = model.get(&column.property) {
                column.default = DefaultValue::from_value(&value);
            }
        }
        self
    }

    /// Identifier properties in declaration order
    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| c.primary_key)
    }
}

impl ColumnDefinition {
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn column_type(&mut self, column_type: impl Into<String>) -> &mut Self {
        self.column_type = Some(column_type.into());
        self
    }

    pub fn max_length(&mut self, length: u32) -> &mut Self {
        self.max_length = Some(length);
        self
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(&mut self) -> &mut Self {
        self.primary_key = true;
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self
    }

    pub fn default_value(&mut self, default: DefaultValue) -> &mut Self {
        self.default = Some(default);
        self
    }

    pub fn extra(&mut self, extra: impl Into<String>) -> &mut Self {
        self.extra = Some(extra.into());
        self
    }
}

impl ReferenceDefinition {
    pub fn column(&mut self, column: impl Into<String>) -> &mut Self {
        self.column = Some(column.into());
        self
    }

    pub fn foreign_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.foreign_table = Some(table.into());
        self
    }

    pub fn foreign_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.foreign_column = Some(column.into());
        self
    }

    pub fn foreign_right_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.foreign_right_column = Some(column.into());
        self
    }

    pub fn nullable(&mut self, nullable: bool) -> &mut Self {
        self.nullable = Some(nullable);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamps(def: &mut TableDefinition) {
        def.column::<Option<chrono::NaiveDateTime>>("created");
    }

    #[test]
    fn test_redeclaring_a_column_replaces_it() {
        let mut def = TableDefinition::new("User");
        def.column::<String>("name");
        def.column::<String>("name").max_length(10);
        assert_eq!(def.columns.len(), 1);
        assert_eq!(def.columns[0].max_length, Some(10));
    }

    #[test]
    fn test_mixin_appends_columns() {
        let mut def = TableDefinition::new("User");
        def.column::<i64>("id").primary_key();
        def.mixin(timestamps);
        assert_eq!(def.columns.len(), 2);
        assert!(def.columns[1].nullable);
        assert_eq!(def.columns[1].kind, ColumnKind::DateTime);
        assert_eq!(def.primary_keys().count(), 1);
    }
}
