//! Shared state of the pull statements
//!
//! A [`Pull`] carries the entity, filter, traversals, ordering and paging of a
//! Search, Read or Count, and knows how to turn them into a `SELECT` skeleton:
//! sub-types join their super-type table on the identifier, traversals add the join
//! table, and every property resolves to a table-qualified column.

use std::sync::Arc;

use sea_query::{Expr, Order, Query, SelectStatement};

use crate::error::{MapperError, MapperResult};
use crate::model::Instance;
use crate::query::bake::{locate_column, super_schema};
use crate::query::{bake_traversal, Baked, BoolOperator, Comparator, Filter, Join, Name};
use crate::query::iden::split_columns;
use crate::schema::{Registry, Schema, DISCRIMINATOR_COLUMN};
use crate::session::Session;

use super::StatementState;

#[derive(Debug, Clone)]
struct Traversal {
    property: String,
    comparator: Comparator,
    instance: Instance,
}

#[derive(Debug, Clone)]
pub struct Pull {
    pub(crate) entity: String,
    filter: Option<Filter>,
    traversals: Vec<Traversal>,
    orders: Vec<(String, Order)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) state: StatementState,
}

impl Pull {
    pub fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            filter: None,
            traversals: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            state: StatementState::Uninitialized,
        }
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn has_traversals(&self) -> bool {
        !self.traversals.is_empty()
    }

    pub(crate) fn set_filter(&mut self, filter: Filter) {
        self.filter = Some(filter);
    }

    pub(crate) fn combine(&mut self, operator: BoolOperator, filter: Filter) {
        self.filter = Some(match self.filter.take() {
            None => filter,
            Some(current) => match operator {
                BoolOperator::And => current.and(filter),
                BoolOperator::Or => current.or(filter),
            },
        });
    }

    pub(crate) fn add_traversal(&mut self, property: &str, comparator: Comparator, instance: &Instance) {
        self.traversals.push(Traversal {
            property: property.to_string(),
            comparator,
            instance: instance.clone(),
        });
    }

    /// No explicit order other than ascending on the single identifier property
    pub(crate) fn ordered_by_identifier(&self, schema: &Schema) -> bool {
        self.orders.iter().all(|(property, order)| {
            schema.uid.len() == 1 && schema.is_uid(property) && matches!(order, Order::Asc)
        })
    }

    pub(crate) fn add_order(&mut self, property: &str, order: Order) {
        self.orders.push((property.to_string(), order));
    }

    /// Resolve the schema of the entity, advancing the state
    pub(crate) fn resolve(&mut self, session: &Session, statement: &str) -> MapperResult<Arc<Schema>> {
        self.state.ensure_executable(statement)?;
        let schema = session.schema(&self.entity)?;
        if schema.is_enum {
            return Err(MapperError::Statement(format!(
                "{statement} on enum {} has no table",
                self.entity
            )));
        }
        self.state = StatementState::SchemaResolved;
        Ok(schema)
    }

    /// Filter and traversals compiled and AND-ed together
    fn bake(&self, schema: &Schema, registry: &Registry) -> MapperResult<Option<Baked>> {
        let mut baked = match &self.filter {
            Some(filter) => Some(filter.bake(schema, registry)?),
            None => None,
        };
        for traversal in &self.traversals {
            let next = bake_traversal(
                schema,
                registry,
                &traversal.property,
                traversal.comparator,
                &traversal.instance,
            )?;
            baked = Some(match baked {
                None => next,
                Some(mut prev) => {
                    prev.condition = sea_query::Condition::all()
                        .add(prev.condition)
                        .add(next.condition);
                    prev.merge_joins(next.joins);
                    prev
                }
            });
        }
        Ok(baked)
    }

    /// `FROM`, super-type join, `WHERE` and traversal joins; no selected columns yet
    pub(crate) fn base_select(&self, schema: &Schema, registry: &Registry) -> MapperResult<SelectStatement> {
        let mut select = Query::select();
        select.from(Name::new(&schema.table_name));
        if let Some(parent) = super_schema(schema, registry)? {
            parent_join(schema, &parent).apply(&mut select);
        }
        if let Some(baked) = self.bake(schema, registry)? {
            for join in &baked.joins {
                join.apply(&mut select);
            }
            select.cond_where(baked.condition);
        }
        Ok(select)
    }

    /// Explicit orders, then the identifier so row order is stable
    pub(crate) fn apply_order(
        &self,
        select: &mut SelectStatement,
        schema: &Schema,
        registry: &Registry,
    ) -> MapperResult<()> {
        for (property, order) in &self.orders {
            let Some(found) = locate_column(schema, registry, property)? else {
                return Err(MapperError::ReferenceResolution(format!(
                    "cannot order {} by unknown property {property}",
                    schema.entity
                )));
            };
            select.order_by((Name::new(&found.table), Name::new(&found.item.name)), order.clone());
        }
        for property in &schema.uid {
            if self.orders.iter().any(|(p, _)| p == property) {
                continue;
            }
            if let Some(column) = schema.column(property) {
                select.order_by(
                    (Name::new(&schema.table_name), Name::new(&column.name)),
                    Order::Asc,
                );
            }
        }
        Ok(())
    }

    pub(crate) fn apply_paging(&self, select: &mut SelectStatement) {
        if let Some(limit) = self.limit {
            select.limit(limit);
        }
        if let Some(offset) = self.offset {
            select.offset(offset);
        }
    }
}

/// `JOIN super ON super.uid = sub.uid`
pub(crate) fn parent_join(schema: &Schema, parent: &Schema) -> Join {
    let own = schema.uid_column_names();
    parent
        .uid_column_names()
        .iter()
        .zip(own.iter())
        .fold(Join::new(&parent.table_name), |join, (parent_column, column)| {
            join.on(
                (&parent.table_name, parent_column),
                (&schema.table_name, column),
            )
        })
}

/// Columns a hydrating select reads, table-qualified and unique by column name
///
/// The schema's own columns and to-one reference columns, the discriminator of a
/// super-type, and for a sub-type the super-type's columns except the identifier.
pub(crate) fn selected_columns(schema: &Schema, parent: Option<&Schema>) -> Vec<(String, String)> {
    let mut selected: Vec<(String, String)> = Vec::new();
    let mut add = |table: &str, column: &str| {
        if !selected.iter().any(|(_, c)| c == column) {
            selected.push((table.to_string(), column.to_string()));
        }
    };
    for column in &schema.columns {
        add(&schema.table_name, &column.name);
    }
    for reference in schema.to_one_references() {
        for column in split_columns(&reference.column_name) {
            add(&schema.table_name, &column);
        }
    }
    if schema.is_super_type {
        add(&schema.table_name, DISCRIMINATOR_COLUMN);
    }
    if let Some(parent) = parent {
        for column in parent.columns.iter().filter(|c| !parent.is_uid(&c.property)) {
            add(&parent.table_name, &column.name);
        }
        for reference in parent.to_one_references() {
            for column in split_columns(&reference.column_name) {
                add(&parent.table_name, &column);
            }
        }
    }
    selected
}

pub(crate) fn select_columns(select: &mut SelectStatement, columns: &[(String, String)]) {
    for (table, column) in columns {
        select.expr_as(
            Expr::col((Name::new(table), Name::new(column))),
            Name::new(column),
        );
    }
}
