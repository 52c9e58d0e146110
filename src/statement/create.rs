//! Create: insert a model, its super-type row and its associations

use sea_query::{Expr, Query, Value};

use crate::driver::build_with;
use crate::error::{MapperError, MapperResult};
use crate::identity::ModelId;
use crate::model::Instance;
use crate::query::Name;
use crate::schema::{Schema, DISCRIMINATOR_COLUMN};
use crate::session::Session;

use super::push::{column_value, reference_values, schemas_of, write_back};
use super::{run_write, StatementState};

/// Insert one instance
///
/// For a sub-type the super-type row goes first (carrying the discriminator) and its
/// generated identifier is reused for the sub-type row. Auto-increment identifiers are
/// written back to the model. Many-to-many collections are flushed afterwards and the
/// modified set is cleared.
#[derive(Debug, Clone)]
pub struct Create {
    instance: Instance,
    state: StatementState,
}

impl Create {
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

    /// Insert and return the identifier of the new row
    pub fn execute(&mut self, session: &Session) -> MapperResult<ModelId> {
        self.state.ensure_executable("Create")?;
        let entity = self.instance.entity();

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("create", entity).entered();

        let (schema, parent) = schemas_of(session, entity)?;
        self.state = StatementState::SchemaResolved;
        session.database("Create")?;

        if let Some(parent) = &parent {
            insert_row(session, &self.instance, parent, Some(entity))?;
        }
        insert_row(session, &self.instance, &schema, None)?;
        self.state = StatementState::Executed;

        write_back(session, &self.instance, &schema, parent.as_deref())?;
        let id = {
            let mut model = self.instance.borrow_mut();
            model.tracker_mut().clear_modified();
            model.model_id()
        };
        log::debug!("created {entity}({id})");
        Ok(id)
    }
}

fn insert_row(
    session: &Session,
    instance: &Instance,
    schema: &Schema,
    discriminator: Option<&str>,
) -> MapperResult<()> {
    let entity = instance.entity();
    let mut columns: Vec<Name> = Vec::new();
    let mut values: Vec<Expr> = Vec::new();
    {
        let model = instance.borrow();
        for column in schema.columns.iter().filter(|c| !c.auto_increment) {
            columns.push(Name::new(&column.name));
            values.push(Expr::val(column_value(entity, column, &*model)?));
        }
        for reference in schema.to_one_references() {
            for (column, value) in reference_values(entity, reference, &*model, session.registry())? {
                columns.push(Name::new(column));
                values.push(Expr::val(value));
            }
        }
    }
    if let Some(discriminator) = discriminator {
        columns.push(Name::new(DISCRIMINATOR_COLUMN));
        values.push(Expr::val(discriminator));
    }

    let mut insert = Query::insert();
    insert.into_table(Name::new(&schema.table_name));
    if columns.is_empty() {
        insert.or_default_values();
    } else {
        insert
            .columns(columns)
            .values(values)
            .map_err(|e| MapperError::Statement(e.to_string()))?;
    }
    let database = session.database("Create")?;
    let (sql, params) = build_with!(database.backend(), insert);
    run_write(session, "Create", &sql, &params)?;

    if let Some(column) = schema.uid_columns().into_iter().find(|c| c.auto_increment) {
        let id = database.last_insert_id()?;
        instance
            .borrow_mut()
            .set(&column.property, Value::BigInt(Some(id)))?;
    }
    Ok(())
}
