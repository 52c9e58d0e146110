//! Compilation of filters against a schema
//!
//! A property is looked up first as a column of the schema (or of its super-type), then
//! as a reference. Columns compare table-qualified; references dispatch on cardinality
//! and may contribute joins.

use std::sync::Arc;

use sea_query::{Condition as SqlCondition, Expr, ExprTrait, JoinType, SelectStatement, Value};

use crate::error::{MapperError, MapperResult};
use crate::model::Instance;
use crate::schema::{Cardinality, Column, Reference, Registry, Schema};
use crate::value::{key_text, storage_value, value_is_null};

use super::iden::{qualified, split_columns, Name};
use super::{BoolOperator, Comparator, Condition, ConditionGroup, Filter, Operand};

/// Inner join on pairs of `(table, column)` references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    pub on: Vec<((String, String), (String, String))>,
}

impl Join {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            on: Vec::new(),
        }
    }

    pub fn on(
        mut self,
        left: (impl AsRef<str>, impl AsRef<str>),
        right: (impl AsRef<str>, impl AsRef<str>),
    ) -> Self {
        self.on.push((
            (left.0.as_ref().to_string(), left.1.as_ref().to_string()),
            (right.0.as_ref().to_string(), right.1.as_ref().to_string()),
        ));
        self
    }

    pub fn apply(&self, select: &mut SelectStatement) {
        let on = self
            .on
            .iter()
            .fold(SqlCondition::all(), |cond, ((lt, lc), (rt, rc))| {
                cond.add(qualified(lt, lc).eq(qualified(rt, rc)))
            });
        select.join(JoinType::InnerJoin, Name::new(&self.table), on);
    }
}

/// A compiled filter: the WHERE tree plus the joins it needs
#[derive(Debug, Clone)]
pub struct Baked {
    pub condition: SqlCondition,
    pub joins: Vec<Join>,
}

impl Baked {
    fn leaf(expr: Expr) -> Self {
        Self {
            condition: SqlCondition::all().add(expr),
            joins: Vec::new(),
        }
    }

    fn with_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Append joins not already present
    pub fn merge_joins(&mut self, joins: Vec<Join>) {
        for join in joins {
            if !self.joins.contains(&join) {
                self.joins.push(join);
            }
        }
    }
}

impl Filter {
    pub fn bake(&self, schema: &Schema, registry: &Registry) -> MapperResult<Baked> {
        match self {
            Filter::Condition(condition) => condition.bake(schema, registry),
            Filter::Group(group) => group.bake(schema, registry),
        }
    }
}

impl ConditionGroup {
    pub fn bake(&self, schema: &Schema, registry: &Registry) -> MapperResult<Baked> {
        let mut acc: Option<Baked> = None;
        for (operator, filter) in self.items() {
            let next = filter.bake(schema, registry)?;
            acc = Some(match acc {
                None => next,
                Some(mut prev) => {
                    let combined = match operator {
                        BoolOperator::And => SqlCondition::all(),
                        BoolOperator::Or => SqlCondition::any(),
                    };
                    prev.condition = combined.add(prev.condition).add(next.condition);
                    prev.merge_joins(next.joins);
                    prev
                }
            });
        }
        acc.ok_or_else(|| MapperError::Statement("empty condition group".into()))
    }
}

/// Where a property was found: the schema that declares it and its table
pub(crate) struct Located<T> {
    pub table: String,
    pub item: T,
}

pub(crate) fn locate_column(
    schema: &Schema,
    registry: &Registry,
    property: &str,
) -> MapperResult<Option<Located<Column>>> {
    if let Some(column) = schema.column(property) {
        return Ok(Some(Located {
            table: schema.table_name.clone(),
            item: column.clone(),
        }));
    }
    if let Some(discriminator) = schema.discriminator.as_ref().filter(|d| d.property == property) {
        return Ok(Some(Located {
            table: schema.table_name.clone(),
            item: discriminator.clone(),
        }));
    }
    match super_schema(schema, registry)? {
        Some(parent) => Ok(parent.column(property).map(|column| Located {
            table: parent.table_name.clone(),
            item: column.clone(),
        })),
        None => Ok(None),
    }
}

pub(crate) fn locate_reference(
    schema: &Schema,
    registry: &Registry,
    property: &str,
) -> MapperResult<Option<Located<Reference>>> {
    if let Some(reference) = schema.reference(property) {
        return Ok(Some(Located {
            table: schema.table_name.clone(),
            item: reference.clone(),
        }));
    }
    match super_schema(schema, registry)? {
        Some(parent) => Ok(parent.reference(property).map(|reference| Located {
            table: parent.table_name.clone(),
            item: reference.clone(),
        })),
        None => Ok(None),
    }
}

pub(crate) fn super_schema(schema: &Schema, registry: &Registry) -> MapperResult<Option<Arc<Schema>>> {
    schema
        .super_type
        .as_deref()
        .map(|name| registry.resolve(name))
        .transpose()
}

/// The single identifier value of an instance
pub(crate) fn instance_id(instance: &Instance, property: &str) -> MapperResult<Value> {
    let id = instance.borrow().model_id();
    id.as_single().cloned().ok_or_else(|| {
        MapperError::ReferenceResolution(format!(
            "{property}: {} has a composite or missing identifier ({id})",
            instance.entity()
        ))
    })
}

fn compare(expr: Expr, comparator: Comparator, value: Value) -> Expr {
    let null = value_is_null(&value);
    match comparator {
        Comparator::Equal if null => expr.is_null(),
        Comparator::NotEqual if null => expr.is_not_null(),
        Comparator::Equal => expr.eq(value),
        Comparator::NotEqual => expr.ne(value),
        Comparator::Less => expr.lt(value),
        Comparator::LessOrEqual => expr.lte(value),
        Comparator::Greater => expr.gt(value),
        Comparator::GreaterOrEqual => expr.gte(value),
        Comparator::Like => expr.like(key_text(&value)),
        Comparator::NotLike => expr.not_like(key_text(&value)),
        Comparator::In => expr.is_in([value]),
        Comparator::NotIn => expr.is_not_in([value]),
    }
}

fn compare_list(expr: Expr, comparator: Comparator, values: Vec<Value>, property: &str) -> MapperResult<Expr> {
    match comparator {
        Comparator::In => Ok(expr.is_in(values)),
        Comparator::NotIn => Ok(expr.is_not_in(values)),
        other => Err(MapperError::ReferenceResolution(format!(
            "{property}: comparator {other} needs a single value, got a list"
        ))),
    }
}

impl Condition {
    pub fn bake(&self, schema: &Schema, registry: &Registry) -> MapperResult<Baked> {
        if let Some(found) = locate_column(schema, registry, &self.property)? {
            return self.bake_column(&found.table, &found.item);
        }
        if let Some(found) = locate_reference(schema, registry, &self.property)? {
            return self.bake_reference(schema, &found.table, &found.item, registry);
        }
        Err(MapperError::ReferenceResolution(format!(
            "property {} not found in schema {}",
            self.property, schema.table_name
        )))
    }

    fn bake_column(&self, table: &str, column: &Column) -> MapperResult<Baked> {
        let expr = qualified(table, &column.name);
        let expr = match &self.operand {
            Operand::Value(value) => compare(expr, self.comparator, storage_value(value.clone())),
            Operand::Model(instance) => {
                compare(expr, self.comparator, instance_id(instance, &self.property)?)
            }
            Operand::List(values) => compare_list(
                expr,
                self.comparator,
                values.iter().cloned().map(storage_value).collect(),
                &self.property,
            )?,
            Operand::Models(instances) => {
                let ids = instances
                    .iter()
                    .map(|i| instance_id(i, &self.property))
                    .collect::<MapperResult<Vec<_>>>()?;
                compare_list(expr, self.comparator, ids, &self.property)?
            }
        };
        Ok(Baked::leaf(expr))
    }

    fn bake_reference(
        &self,
        schema: &Schema,
        table: &str,
        reference: &Reference,
        registry: &Registry,
    ) -> MapperResult<Baked> {
        let column = qualified(table, &reference.column_name);
        match &self.operand {
            Operand::Models(instances) => self.bake_instance_set(column, reference, instances, registry),
            Operand::Model(instance) if self.comparator.is_set() => {
                self.bake_instance_set(column, reference, std::slice::from_ref(instance), registry)
            }
            Operand::Model(instance) => {
                check_target(instance, reference, registry, &self.property)?;
                let id = instance_id(instance, &self.property)?;
                match reference.cardinality {
                    Cardinality::OneToMany => Ok(Baked::leaf(compare(column, self.comparator, id))),
                    Cardinality::ManyToMany => {
                        let (join_table, left, right) = join_table_columns(reference)?;
                        let uid = schema.uid_column_names();
                        let owner_columns = split_columns(&reference.column_name);
                        let mut join = Join::new(&join_table);
                        for (i, left_column) in split_columns(&left).iter().enumerate() {
                            let owner = uid
                                .get(i)
                                .or_else(|| owner_columns.get(i))
                                .cloned()
                                .unwrap_or_else(|| "id".to_string());
                            join = join.on((&join_table, left_column), (table, &owner));
                        }
                        let predicate = compare(qualified(&join_table, &right), self.comparator, id);
                        Ok(Baked::leaf(predicate).with_join(join))
                    }
                    other => Err(MapperError::not_implemented(format!(
                        "{other} reference {} compared with {}",
                        self.property, self.comparator
                    ))),
                }
            }
            Operand::Value(value) if value_is_null(value) && reference.nullable => {
                Ok(Baked::leaf(compare(column, self.comparator, value.clone())))
            }
            Operand::Value(value @ Value::String(Some(_))) if is_enum_target(reference, registry)? => {
                Ok(Baked::leaf(compare(column, self.comparator, value.clone())))
            }
            _ => Err(MapperError::ReferenceResolution(format!(
                "can only reference {} with an instance",
                self.property
            ))),
        }
    }

    fn bake_instance_set(
        &self,
        column: Expr,
        reference: &Reference,
        instances: &[Instance],
        registry: &Registry,
    ) -> MapperResult<Baked> {
        if !self.comparator.is_set() {
            return Err(MapperError::ReferenceResolution(format!(
                "can only reference {} with a single instance when comparing with {}",
                self.property, self.comparator
            )));
        }
        if reference.cardinality != Cardinality::OneToMany {
            return Err(MapperError::not_implemented(format!(
                "{} reference {} with {}",
                reference.cardinality, self.property, self.comparator
            )));
        }
        if instances.is_empty() {
            return Err(MapperError::ReferenceResolution(format!(
                "{}: {} over an empty set of instances",
                self.property, self.comparator
            )));
        }
        let ids = instances
            .iter()
            .map(|instance| {
                check_target(instance, reference, registry, &self.property)?;
                instance_id(instance, &self.property)
            })
            .collect::<MapperResult<Vec<_>>>()?;
        Ok(Baked::leaf(compare_list(column, self.comparator, ids, &self.property)?))
    }
}

fn is_enum_target(reference: &Reference, registry: &Registry) -> MapperResult<bool> {
    Ok(registry.resolve(&reference.target)?.is_enum)
}

/// Reject instances that are neither the target entity nor one of its sub-types
fn check_target(
    instance: &Instance,
    reference: &Reference,
    registry: &Registry,
    property: &str,
) -> MapperResult<()> {
    if instance.entity() == reference.target {
        return Ok(());
    }
    let schema = registry.resolve(instance.entity())?;
    if schema.super_type.as_deref() == Some(reference.target.as_str()) {
        return Ok(());
    }
    Err(MapperError::ReferenceResolution(format!(
        "can only reference {property} with an instance of {}, got {}",
        reference.target,
        instance.entity()
    )))
}

/// `(join table, foreign column, foreign right column)` of a many-to-many reference
pub(crate) fn join_table_columns(reference: &Reference) -> MapperResult<(String, String, String)> {
    match (
        &reference.foreign_table,
        &reference.foreign_column,
        &reference.foreign_right_column,
    ) {
        (Some(table), Some(left), Some(right)) => Ok((table.clone(), left.clone(), right.clone())),
        _ => Err(MapperError::ReferenceResolution(format!(
            "{} has no join table",
            reference.property
        ))),
    }
}

/// Compile a many-to-many traversal from `instance` to rows of `schema`.
///
/// `property` is a many-to-many reference of the instance's schema whose target is
/// `schema`: the join table is joined on `foreign_right_column = schema.uid` and
/// filtered on `foreign_column <comparator> instance id`.
pub fn bake_traversal(
    schema: &Schema,
    registry: &Registry,
    property: &str,
    comparator: Comparator,
    instance: &Instance,
) -> MapperResult<Baked> {
    let source = registry.resolve(instance.entity())?;
    let Some(found) = locate_reference(&source, registry, property)? else {
        return Err(MapperError::ReferenceResolution(format!(
            "property {property} not found in schema {}",
            source.table_name
        )));
    };
    let reference = found.item;
    if reference.cardinality != Cardinality::ManyToMany {
        return Err(MapperError::not_implemented(format!(
            "traversal over {} reference {property}",
            reference.cardinality
        )));
    }
    let (join_table, left, right) = join_table_columns(&reference)?;
    let uid = schema.uid_column_names();
    let mut join = Join::new(&join_table);
    for (i, right_column) in split_columns(&right).iter().enumerate() {
        let Some(target_column) = uid.get(i) else {
            return Err(MapperError::ReferenceResolution(format!(
                "{property}: join column {right_column} has no identifier counterpart in {}",
                schema.table_name
            )));
        };
        join = join.on((&join_table, right_column), (&schema.table_name, target_column));
    }
    let id = instance_id(instance, property)?;
    let predicate = compare(qualified(&join_table, &left), comparator, id);
    Ok(Baked::leaf(predicate).with_join(join))
}
