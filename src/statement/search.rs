//! Search: many rows of one entity as a lazy collection

use crate::collection::ModelCollection;
use crate::driver::build_with;
use crate::error::MapperResult;
use crate::query::bake::super_schema;
use crate::session::Session;

use super::pull::{select_columns, selected_columns};
use super::{pull_builder, Pull, StatementState};

/// Select every matching row, ordered by identifier
///
/// Executing a search only compiles it: the returned [`ModelCollection`] runs the
/// query on first access.
///
/// ```no_run
/// # use tidemap::{Condition, Search, Session};
/// # fn demo(session: &Session) -> tidemap::MapperResult<()> {
/// let mut search = Search::new("User").filter(Condition::like("name", "a%")).limit(10);
/// let mut users = search.execute(session)?;
/// for entry in users.iter() {
///     let (key, user) = entry?;
///     println!("{key}: {}", user.borrow().to_json());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Search {
    pub(crate) pull: Pull,
    lazy: bool,
}

pull_builder!(Search);

impl Search {
    pub fn new(entity: &str) -> Self {
        Self {
            pull: Pull::new(entity),
            lazy: false,
        }
    }

    /// Defer every to-one relationship of the hydrated rows
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Compiled SQL and bound values
    pub fn to_sql(&mut self, session: &Session) -> MapperResult<(String, Vec<sea_query::Value>)> {
        let schema = self.pull.resolve(session, "Search")?;
        let registry = session.registry();
        let parent = super_schema(&schema, registry)?;
        let mut select = self.pull.base_select(&schema, registry)?;
        select_columns(&mut select, &selected_columns(&schema, parent.as_deref()));
        self.pull.apply_order(&mut select, &schema, registry)?;
        self.pull.apply_paging(&mut select);
        let backend = session.database("Search")?.backend();
        self.pull.state = StatementState::QueryCompiled;
        Ok(build_with!(backend, select))
    }

    pub fn execute(&mut self, session: &Session) -> MapperResult<ModelCollection> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("search", entity = %self.pull.entity).entered();

        let (sql, values) = self.to_sql(session)?;
        log::debug!("search {}: {sql}", self.pull.entity);
        self.pull.state = StatementState::Executed;
        let schema = session.schema(&self.pull.entity)?;
        Ok(ModelCollection::deferred(
            &self.pull.entity,
            sql,
            values,
            session,
            self.lazy,
            self.pull.limit,
            self.pull.offset,
        )
        .with_identifier_order(self.pull.ordered_by_identifier(&schema)))
    }
}
