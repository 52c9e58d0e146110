//! Read: the first matching row of one entity

use std::cell::RefCell;
use std::rc::Rc;

use crate::driver::build_with;
use crate::error::MapperResult;
use crate::hydrator::Hydrator;
use crate::model::{Entity, Instance};
use crate::query::bake::super_schema;
use crate::schema::Schema;
use crate::session::Session;
use crate::value::key_text;

use super::pull::{select_columns, selected_columns};
use super::{pull_builder, run, Pull, StatementState};

/// Select a single instance
///
/// A filter that is exactly `uid = value` on a single identifier is answered from the
/// session identity cache when possible, without touching the database. Reading a
/// super-type dispatches to the sub-type named by the row's discriminator.
#[derive(Debug, Clone)]
pub struct Read {
    pub(crate) pull: Pull,
    lazy: bool,
}

pull_builder!(Read);

impl Read {
    pub fn new(entity: &str) -> Self {
        Self {
            pull: Pull::new(entity),
            lazy: false,
        }
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Canonical identifier when the filter is a sole equality on the identifier
    fn identity_key(&self, schema: &Schema) -> Option<String> {
        if self.pull.has_traversals() {
            return None;
        }
        let [uid] = schema.uid.as_slice() else {
            return None;
        };
        let value = self.pull.filter()?.as_condition()?.equality_on(uid)?;
        Some(key_text(value))
    }

    pub fn to_sql(&mut self, session: &Session) -> MapperResult<(String, Vec<sea_query::Value>)> {
        let schema = self.pull.resolve(session, "Read")?;
        let registry = session.registry();
        let parent = super_schema(&schema, registry)?;
        let mut select = self.pull.base_select(&schema, registry)?;
        select_columns(&mut select, &selected_columns(&schema, parent.as_deref()));
        self.pull.apply_order(&mut select, &schema, registry)?;
        select.limit(1);
        if let Some(offset) = self.pull.offset {
            select.offset(offset);
        }
        let backend = session.database("Read")?.backend();
        self.pull.state = StatementState::QueryCompiled;
        Ok(build_with!(backend, select))
    }

    pub fn execute(&mut self, session: &Session) -> MapperResult<Option<Instance>> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("read", entity = %self.pull.entity).entered();

        let schema = self.pull.resolve(session, "Read")?;
        if let Some(key) = self.identity_key(&schema) {
            if let Some(found) = session.cached(&schema.entity, &key) {
                self.pull.state = StatementState::Executed;
                return Ok(Some(found));
            }
        }

        let (sql, values) = self.to_sql(session)?;
        let mut cursor = run(session, "Read", &sql, &values)?;
        let row = cursor.fetch_next()?;
        cursor.close();
        self.pull.state = StatementState::Executed;

        let Some(row) = row else {
            log::debug!("read {}: no row", schema.entity);
            return Ok(None);
        };
        let (_, instance) = Hydrator::new(session, &schema.entity)?.fetch(&row, session, self.lazy)?;
        Ok(Some(instance))
    }

    /// Execute and downcast to a concrete type; another entity (a sub-type) yields `None`
    pub fn execute_as<T: Entity>(&mut self, session: &Session) -> MapperResult<Option<Rc<RefCell<T>>>> {
        Ok(self.execute(session)?.and_then(|instance| instance.downcast::<T>()))
    }
}
