//! Resolved relationship metadata.

use std::fmt;

use serde::Serialize;

/// Multiplicity of a relationship, seen from the owning type
///
/// `OneToOne` and `OneToMany` hold the foreign key on the owner's table; `ManyToOne`
/// is the inverse side (the target holds a reference back); `ManyToMany` goes through
/// a join table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// References whose value lives in a column of the owner's row
    pub fn is_to_one(self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::OneToMany)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cardinality::OneToOne => "one-to-one",
            Cardinality::OneToMany => "one-to-many",
            Cardinality::ManyToOne => "many-to-one",
            Cardinality::ManyToMany => "many-to-many",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub property: String,
    pub cardinality: Cardinality,
    /// Target entity name
    pub target: String,
    pub nullable: bool,
    /// Local column (to-one), target property (many-to-one) or owner key (many-to-many)
    pub column_name: String,
    pub foreign_table: Option<String>,
    pub foreign_column: Option<String>,
    /// Right-hand column of a many-to-many join table
    pub foreign_right_column: Option<String>,
}

/// `userGroup` from `UserGroup`
pub fn lcfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `UserId` from `userId`
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_helpers() {
        assert_eq!(lcfirst("User"), "user");
        assert_eq!(ucfirst("id"), "Id");
        assert_eq!(lcfirst(""), "");
    }

    #[test]
    fn test_cardinality_display() {
        assert_eq!(Cardinality::ManyToMany.to_string(), "many-to-many");
        assert!(Cardinality::OneToMany.is_to_one());
        assert!(!Cardinality::ManyToOne.is_to_one());
    }
}
