//! Runtime identifiers for sea-query

use sea_query::{Expr, Iden};

/// Table or column name resolved at runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Iden for Name {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// Table-qualified column expression
pub fn qualified(table: &str, column: &str) -> Expr {
    Expr::col((Name::new(table), Name::new(column)))
}

/// Split a `", "`-joined column list
pub fn split_columns(columns: &str) -> Vec<String> {
    columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{PostgresQueryBuilder, Query};

    #[test]
    fn test_qualified_column_is_quoted_per_part() {
        let sql = Query::select()
            .expr(qualified("user", "id"))
            .from(Name::new("user"))
            .to_string(PostgresQueryBuilder);
        assert_eq!(sql, r#"SELECT "user"."id" FROM "user""#);
    }

    #[test]
    fn test_split_columns() {
        assert_eq!(split_columns("a, b"), vec!["a".to_string(), "b".to_string()]);
        assert!(split_columns("").is_empty());
    }
}
