//! Delete: remove a model's rows and evict it from the identity cache

use sea_query::Query;

use crate::driver::build_with;
use crate::error::{MapperError, MapperResult};
use crate::model::Instance;
use crate::query::Name;
use crate::session::Session;

use super::push::{identity_condition, schemas_of};
use super::{run_write, StatementState};

#[derive(Debug, Clone)]
pub struct Delete {
    instance: Instance,
    state: StatementState,
}

impl Delete {
    pub fn new(instance: &Instance) -> Self {
        Self {
            instance: instance.clone(),
            state: StatementState::Uninitialized,
        }
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = StatementState::Uninitialized;
    }

    /// Delete the sub-type row, then the super-type row; returns whether a row was removed
    pub fn execute(&mut self, session: &Session) -> MapperResult<bool> {
        self.state.ensure_executable("Delete")?;
        let entity = self.instance.entity();

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("delete", entity).entered();

        let (schema, parent) = schemas_of(session, entity)?;
        self.state = StatementState::SchemaResolved;
        let id = self.instance.borrow().model_id();
        if !id.is_complete() {
            return Err(MapperError::Statement(format!(
                "cannot delete {entity} without a complete identifier ({id})"
            )));
        }

        let backend = session.database("Delete")?.backend();
        let mut affected = 0;
        for table in std::iter::once(&schema).chain(parent.iter()) {
            let mut delete = Query::delete();
            delete
                .from_table(Name::new(&table.table_name))
                .cond_where(identity_condition(table, id.parts())?);
            let (sql, values) = build_with!(backend, delete);
            affected += run_write(session, "Delete", &sql, &values)?;
        }
        self.state = StatementState::Executed;

        let key = id.canonical();
        session.forget(entity, &key);
        if let Some(parent) = &parent {
            session.forget(&parent.entity, &key);
        }
        log::debug!("deleted {entity}({key}), {affected} row(s)");
        Ok(affected > 0)
    }
}
