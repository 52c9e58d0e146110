//! Statement layer
//!
//! Pull statements read ([`Search`], [`Read`], [`Count`]); push statements write
//! ([`Create`], [`Update`], [`Delete`]). Every statement moves through
//! [`StatementState`] and refuses to execute twice until [`reset`](Search::reset).

mod count;
mod create;
mod delete;
mod pull;
mod push;
mod read;
mod search;
mod update;

pub use count::{Count, CountResult};
pub use create::Create;
pub use delete::Delete;
pub use pull::Pull;
pub use read::Read;
pub use search::Search;
pub use sea_query::Order;
pub use update::Update;

use sea_query::Value;

use crate::driver::Cursor;
use crate::error::{MapperError, MapperResult};
use crate::metrics::STATS;
use crate::session::Session;

/// Lifecycle of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementState {
    #[default]
    Uninitialized,
    SchemaResolved,
    QueryCompiled,
    Executed,
}

impl StatementState {
    pub(crate) fn ensure_executable(self, statement: &str) -> MapperResult<()> {
        if self == StatementState::Executed {
            return Err(MapperError::Statement(format!(
                "{statement} was already executed; reset it before executing again"
            )));
        }
        Ok(())
    }
}

/// Prepare and execute SQL, returning the open cursor
pub(crate) fn run(
    session: &Session,
    label: &str,
    sql: &str,
    values: &[Value],
) -> MapperResult<Box<dyn Cursor>> {
    let database = session.database(label)?;
    log::trace!("{label}: {sql} {values:?}");
    let mut cursor = database.prepare(sql)?;
    cursor.execute(values)?;
    STATS.record_statement();
    Ok(cursor)
}

/// Execute a write, returning the affected row count
pub(crate) fn run_write(
    session: &Session,
    label: &str,
    sql: &str,
    values: &[Value],
) -> MapperResult<u64> {
    let database = session.database(label)?;
    log::trace!("{label}: {sql} {values:?}");
    let mut cursor = database.prepare(sql)?;
    let affected = cursor.execute(values)?;
    cursor.close();
    STATS.record_statement();
    Ok(affected)
}

/// Builder methods shared by every pull statement, forwarded to the inner [`Pull`]
macro_rules! pull_builder {
    ($statement:ident) => {
        impl $statement {
            /// Replace the filter
            pub fn filter(mut self, filter: impl Into<$crate::query::Filter>) -> Self {
                self.pull.set_filter(filter.into());
                self
            }

            /// Combine with the current filter using AND
            pub fn and(mut self, filter: impl Into<$crate::query::Filter>) -> Self {
                self.pull.combine($crate::query::BoolOperator::And, filter.into());
                self
            }

            /// Combine with the current filter using OR
            pub fn or(mut self, filter: impl Into<$crate::query::Filter>) -> Self {
                self.pull.combine($crate::query::BoolOperator::Or, filter.into());
                self
            }

            /// Rows related to `instance` through its many-to-many `property`
            pub fn with(
                mut self,
                property: &str,
                comparator: $crate::query::Comparator,
                instance: &$crate::model::Instance,
            ) -> Self {
                self.pull.add_traversal(property, comparator, instance);
                self
            }

            pub fn order(mut self, property: &str, order: sea_query::Order) -> Self {
                self.pull.add_order(property, order);
                self
            }

            pub fn limit(mut self, limit: u64) -> Self {
                self.pull.limit = Some(limit);
                self
            }

            pub fn offset(mut self, offset: u64) -> Self {
                self.pull.offset = Some(offset);
                self
            }

            pub fn entity(&self) -> &str {
                &self.pull.entity
            }

            pub fn state(&self) -> $crate::statement::StatementState {
                self.pull.state
            }

            /// Allow the statement to execute again
            pub fn reset(&mut self) {
                self.pull.state = $crate::statement::StatementState::Uninitialized;
            }
        }
    };
}
pub(crate) use pull_builder;
