//! Update: write modified columns and flush associations

use sea_query::{Expr, Query, Value};

use crate::driver::build_with;
use crate::error::{MapperError, MapperResult};
use crate::model::{Instance, Model};
use crate::query::Name;
use crate::schema::Schema;
use crate::session::Session;
use crate::value::value_is_null;

use super::push::{
    column_value, has_pending_associations, identity_condition, reference_values, schemas_of,
    write_back,
};
use super::{run_write, StatementState};

/// Update one instance
///
/// Only modified properties are written unless the model's tracker asks for every
/// column (`ignore_modified_properties`, or `update_unmodified` with nothing modified).
/// Returns `false` when there was nothing to write.
#[derive(Debug, Clone)]
pub struct Update {
    instance: Instance,
    state: StatementState,
}

impl Update {
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

    pub fn execute(&mut self, session: &Session) -> MapperResult<bool> {
        self.state.ensure_executable("Update")?;
        let entity = self.instance.entity();

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("update", entity).entered();

        let (schema, parent) = schemas_of(session, entity)?;
        self.state = StatementState::SchemaResolved;

        let (modified, all, write_references, id) = {
            let model = self.instance.borrow();
            let tracker = model.tracker();
            let modified = tracker.modified().to_vec();
            let all = tracker.ignore_modified_properties
                || (tracker.update_unmodified && modified.is_empty());
            (modified, all, tracker.update_references, model.model_id())
        };
        let pending = write_references
            && has_pending_associations(&self.instance, &schema, parent.as_deref());
        if modified.is_empty() && !pending && !all {
            log::trace!("update {entity}: nothing modified");
            self.state = StatementState::Executed;
            return Ok(false);
        }
        if !id.is_complete() {
            return Err(MapperError::Statement(format!(
                "cannot update {entity} without a complete identifier ({id})"
            )));
        }

        let mut rows = Vec::new();
        {
            let model = self.instance.borrow();
            let selected = |property: &str| all || modified.iter().any(|m| m == property);
            for table in parent.iter().map(|p| &**p).chain(std::iter::once(&*schema)) {
                let sets = assignments(entity, table, &*model, session, &selected)?;
                if !sets.is_empty() {
                    rows.push((table, sets));
                }
            }
        }

        let parts = id.into_parts();
        for (table, sets) in rows {
            let mut update = Query::update();
            update.table(Name::new(&table.table_name));
            for (column, value) in sets {
                update.value(Name::new(column), Expr::val(value));
            }
            update.cond_where(identity_condition(table, &parts)?);
            let backend = session.database("Update")?.backend();
            let (sql, values) = build_with!(backend, update);
            run_write(session, "Update", &sql, &values)?;
        }
        self.state = StatementState::Executed;

        if write_references {
            write_back(session, &self.instance, &schema, parent.as_deref())?;
        }
        self.instance.borrow_mut().tracker_mut().clear_modified();
        log::debug!("updated {entity}");
        Ok(true)
    }
}

/// `SET` pairs of one table; every null is validated before anything is written
fn assignments(
    entity: &str,
    schema: &Schema,
    model: &dyn Model,
    session: &Session,
    selected: &dyn Fn(&str) -> bool,
) -> MapperResult<Vec<(String, Value)>> {
    let mut sets = Vec::new();
    for column in &schema.columns {
        if schema.is_uid(&column.property) || column.auto_increment || !selected(&column.property) {
            continue;
        }
        let value = model.get(&column.property).unwrap_or(Value::String(None));
        if value_is_null(&value) && !column.nullable {
            return Err(MapperError::coercion(
                entity,
                &column.property,
                format!("column \"{}\" is not nullable", column.name),
            ));
        }
        sets.push((column.name.clone(), column_value(entity, column, model)?));
    }
    for reference in schema.to_one_references() {
        if !selected(&reference.property) {
            continue;
        }
        sets.extend(reference_values(entity, reference, model, session.registry())?);
    }
    Ok(sets)
}
