//! Database driver contract
//!
//! The mapper never talks to a connection directly: it prepares SQL text through a
//! [`Database`] and drives the returned [`Cursor`]. Absolute positioning is an explicit
//! capability ([`Database::supports_absolute_fetch`]); collections fall back to a
//! sequential scan when it is missing.

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use sea_query::Value;

use crate::error::MapperResult;

#[cfg(any(test, feature = "mock"))]
pub use mock::{LoggedStatement, MockDatabase};

/// SQL dialect used to render statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    MySql,
    Sqlite,
}

/// Render a sea-query statement for a backend, yielding `(sql, values)`
macro_rules! build_with {
    ($backend:expr, $statement:expr) => {{
        let (sql, values) = match $backend {
            $crate::driver::Backend::Postgres => $statement.build(sea_query::PostgresQueryBuilder),
            $crate::driver::Backend::MySql => $statement.build(sea_query::MysqlQueryBuilder),
            $crate::driver::Backend::Sqlite => $statement.build(sea_query::SqliteQueryBuilder),
        };
        (sql, values.iter().cloned().collect::<Vec<sea_query::Value>>())
    }};
}
pub(crate) use build_with;

/// A connection able to prepare statements
///
/// # Examples
///
/// ```
/// use tidemap::driver::{Backend, Database, MockDatabase, Row};
///
/// let db = MockDatabase::new(Backend::MySql)
///     .append_query_results(vec![vec![Row::new().with("id", 1i64)]]);
/// let mut cursor = db.prepare("SELECT `id` FROM `user`").unwrap();
/// assert_eq!(cursor.execute(&[]).unwrap(), 1);
/// assert!(cursor.fetch_next().unwrap().is_some());
/// ```
pub trait Database {
    fn backend(&self) -> Backend;

    fn prepare(&self, sql: &str) -> MapperResult<Box<dyn Cursor>>;

    /// Identifier generated by the last insert
    fn last_insert_id(&self) -> MapperResult<i64>;

    fn begin(&self) -> MapperResult<()>;

    fn commit(&self) -> MapperResult<()>;

    fn rollback(&self) -> MapperResult<()>;

    /// Whether cursors can [`Cursor::fetch`] at an arbitrary row position
    fn supports_absolute_fetch(&self) -> bool;
}

/// A prepared statement and, once executed, its result set
pub trait Cursor {
    /// Execute with bound parameters; returns the affected or selected row count
    fn execute(&mut self, params: &[Value]) -> MapperResult<u64>;

    /// Row at a zero-based position; only valid when the driver supports absolute fetch
    fn fetch(&mut self, position: usize) -> MapperResult<Option<Row>>;

    fn fetch_next(&mut self) -> MapperResult<Option<Row>>;

    /// Number of rows in the result set, when the driver can tell without scanning
    fn row_count(&self) -> Option<usize>;

    fn close(&mut self);
}

/// A result row: ordered column name → value pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: impl Into<Value>) {
        self.columns.push((name.to_string(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}
