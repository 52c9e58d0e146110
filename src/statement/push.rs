//! Helpers shared by the push statements
//!
//! Column values are read from the model through [`Model::get`](crate::Model::get);
//! to-one references contribute their foreign key, taken from the loaded instance when
//! there is one and from the hydrated key otherwise.

use std::sync::Arc;

use chrono::Utc;
use sea_query::{Condition as SqlCondition, Expr, ExprTrait, Query, Value};

use crate::driver::build_with;
use crate::error::{MapperError, MapperResult};
use crate::model::{Instance, Model};
use crate::query::iden::split_columns;
use crate::query::{qualified, Name};
use crate::schema::{Cardinality, Column, Reference, Registry, Schema};
use crate::session::Session;
use crate::value::{storage_value, value_is_null, ValueType};

use super::{run_write, Update};

/// Value to store for a column, falling back to its default when null
pub(super) fn column_value(entity: &str, column: &Column, model: &dyn Model) -> MapperResult<Value> {
    let value = model.get(&column.property).unwrap_or(Value::String(None));
    if !value_is_null(&value) || column.nullable {
        return Ok(storage_value(value));
    }
    if let Some(default) = &column.default {
        return Ok(storage_value(default.to_value()));
    }
    let upper = column.column_type.to_ascii_uppercase();
    if upper.starts_with("DATETIME") || upper.starts_with("TIMESTAMP") {
        return Ok(Utc::now().naive_utc().into_value());
    }
    Err(MapperError::coercion(
        entity,
        &column.property,
        format!("column \"{}\" is not nullable and has no default", column.name),
    ))
}

/// Foreign key columns and values written for a to-one reference
pub(super) fn reference_values(
    entity: &str,
    reference: &Reference,
    model: &dyn Model,
    registry: &Registry,
) -> MapperResult<Vec<(String, Value)>> {
    let columns = split_columns(&reference.column_name);
    let parts: Vec<Value> = if registry.resolve(&reference.target)?.is_enum {
        model.get(&reference.property).into_iter().collect()
    } else {
        match model.related(&reference.property) {
            Some(slot) => match slot.peek() {
                Some(instance) => {
                    let id = instance.borrow().model_id();
                    if !id.is_assigned() {
                        return Err(MapperError::ReferenceResolution(format!(
                            "{entity}.{}: related {} has no identifier; create it first",
                            reference.property,
                            instance.entity()
                        )));
                    }
                    id.into_parts()
                }
                None => slot.key().map(|key| key.parts().to_vec()).unwrap_or_default(),
            },
            None => Vec::new(),
        }
    };
    let parts: Vec<Value> = parts.into_iter().filter(|v| !value_is_null(v)).collect();
    if parts.is_empty() {
        if !reference.nullable {
            return Err(MapperError::coercion(
                entity,
                &reference.property,
                format!("reference to {} is required", reference.target),
            ));
        }
        return Ok(columns.into_iter().map(|c| (c, Value::BigInt(None))).collect());
    }
    if parts.len() != columns.len() {
        return Err(MapperError::ReferenceResolution(format!(
            "{entity}.{}: {} key parts for columns {}",
            reference.property,
            parts.len(),
            reference.column_name
        )));
    }
    Ok(columns.into_iter().zip(parts.into_iter().map(storage_value)).collect())
}

/// `uid1 = ? AND uid2 = ?` on a table
pub(super) fn identity_condition(schema: &Schema, parts: &[Value]) -> MapperResult<SqlCondition> {
    let columns = schema.uid_column_names();
    if columns.len() != parts.len() {
        return Err(MapperError::Statement(format!(
            "{} identifier has {} parts, expected {}",
            schema.entity,
            parts.len(),
            columns.len()
        )));
    }
    Ok(columns
        .iter()
        .zip(parts)
        .fold(SqlCondition::all(), |cond, (column, value)| {
            cond.add(qualified(&schema.table_name, column).eq(value.clone()))
        }))
}

/// The schema of an instance together with its super-type schema
pub(super) fn schemas_of(session: &Session, entity: &str) -> MapperResult<(Arc<Schema>, Option<Arc<Schema>>)> {
    let schema = session.schema(entity)?;
    let parent = crate::query::bake::super_schema(&schema, session.registry())?;
    Ok((schema, parent))
}

/// Many-to-many references of a schema and of its super-type
fn association_references(schema: &Schema, parent: Option<&Schema>) -> Vec<Reference> {
    schema
        .many_to_many_references()
        .chain(parent.into_iter().flat_map(|p| p.many_to_many_references()))
        .cloned()
        .collect()
}

/// Whether any many-to-many collection of the instance has pending changes
pub(super) fn has_pending_associations(instance: &Instance, schema: &Schema, parent: Option<&Schema>) -> bool {
    let model = instance.borrow();
    association_references(schema, parent).iter().any(|reference| {
        model
            .collection(&reference.property)
            .is_some_and(|collection| collection.modified_count() > 0)
    })
}

/// Persist the pending changes of every many-to-many collection
///
/// Added members insert a join row, removed keys delete theirs and modified members
/// are updated in turn. Each collection's change sets are cleared afterwards.
pub(super) fn write_back(
    session: &Session,
    instance: &Instance,
    schema: &Schema,
    parent: Option<&Schema>,
) -> MapperResult<()> {
    for reference in association_references(schema, parent) {
        debug_assert_eq!(reference.cardinality, Cardinality::ManyToMany);
        let (added, removed, modified) = {
            let model = instance.borrow();
            let Some(collection) = model.collection(&reference.property) else {
                continue;
            };
            if collection.modified_count() == 0 {
                continue;
            }
            (
                collection.added_instances(),
                collection.removed_ids(),
                collection.modified_instances(),
            )
        };

        let owner = instance.borrow().model_id();
        let Some(owner) = owner.as_single().cloned() else {
            return Err(MapperError::ReferenceResolution(format!(
                "{}.{}: association write-back needs a single identifier, got ({owner})",
                schema.entity, reference.property
            )));
        };
        let (table, left, right) = crate::query::bake::join_table_columns(&reference)?;
        let backend = session.database("association write-back")?.backend();
        log::debug!(
            "write-back {}.{}: {} added, {} removed, {} modified",
            schema.entity,
            reference.property,
            added.len(),
            removed.len(),
            modified.len()
        );

        for member in &added {
            let id = member.borrow().model_id();
            let Some(id) = id.as_single().cloned().filter(|_| id.is_assigned()) else {
                return Err(MapperError::ReferenceResolution(format!(
                    "{}.{}: added {} has no identifier; create it first",
                    schema.entity,
                    reference.property,
                    member.entity()
                )));
            };
            let mut insert = Query::insert();
            insert
                .into_table(Name::new(&table))
                .columns([Name::new(&left), Name::new(&right)])
                .values([
                    Expr::val(storage_value(owner.clone())),
                    Expr::val(storage_value(id)),
                ])
                .map_err(|e| MapperError::Statement(e.to_string()))?;
            let (sql, values) = build_with!(backend, insert);
            run_write(session, "association insert", &sql, &values)?;
        }

        for id in &removed {
            let mut delete = Query::delete();
            delete.from_table(Name::new(&table)).cond_where(
                SqlCondition::all()
                    .add(Expr::col(Name::new(&left)).eq(storage_value(owner.clone())))
                    .add(Expr::col(Name::new(&right)).eq(storage_value(id.clone()))),
            );
            let (sql, values) = build_with!(backend, delete);
            run_write(session, "association delete", &sql, &values)?;
        }

        for member in &modified {
            Update::new(member).execute(session)?;
        }

        let mut model = instance.borrow_mut();
        if let Some(collection) = model.collection_mut(&reference.property) {
            collection.mark_flushed();
        }
    }
    Ok(())
}
