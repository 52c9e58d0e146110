//! Resolved, immutable per-type schema

use serde::Serialize;

use super::{Cardinality, Column, Reference};

/// Column name of the sub-type discriminator stored on super-type tables
pub const DISCRIMINATOR_COLUMN: &str = "tidemap_subtype";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub entity: String,
    pub table_name: String,
    pub columns: Vec<Column>,
    pub references: Vec<Reference>,
    /// Identifier properties in order
    pub uid: Vec<String>,
    pub is_enum: bool,
    pub enum_variants: Vec<String>,
    pub is_super_type: bool,
    pub super_type: Option<String>,
    pub sub_types: Vec<String>,
    pub discriminator: Option<Column>,
    /// One-to-one link of a sub-type to its super-type row
    pub parent: Option<Reference>,
    pub complete: bool,
}

impl Schema {
    pub(crate) fn new(entity: &str, table_name: String) -> Self {
        Self {
            entity: entity.to_string(),
            table_name,
            columns: Vec::new(),
            references: Vec::new(),
            uid: Vec::new(),
            is_enum: false,
            enum_variants: Vec::new(),
            is_super_type: false,
            super_type: None,
            sub_types: Vec::new(),
            discriminator: None,
            parent: None,
            complete: false,
        }
    }

    pub fn column(&self, property: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.property == property)
    }

    pub fn reference(&self, property: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.property == property)
    }

    pub fn is_sub_type(&self) -> bool {
        self.super_type.is_some()
    }

    pub fn is_uid(&self, property: &str) -> bool {
        self.uid.iter().any(|p| p == property)
    }

    /// Identifier columns in identifier order
    pub fn uid_columns(&self) -> Vec<&Column> {
        self.uid.iter().filter_map(|p| self.column(p)).collect()
    }

    pub fn uid_column_names(&self) -> Vec<String> {
        self.uid_columns().iter().map(|c| c.name.clone()).collect()
    }

    /// The single identifier column, if the identifier is not composite
    pub fn single_uid_column(&self) -> Option<&Column> {
        match self.uid.as_slice() {
            [only] => self.column(only),
            _ => None,
        }
    }

    /// References stored as a column of this table
    pub fn to_one_references(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| r.cardinality.is_to_one())
    }

    pub fn many_to_many_references(&self) -> impl Iterator<Item = &Reference> {
        self.references
            .iter()
            .filter(|r| r.cardinality == Cardinality::ManyToMany)
    }

    /// JSON view used for inspection and external caches
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
