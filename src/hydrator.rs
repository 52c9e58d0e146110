//! Row → model hydration
//!
//! The hydrator turns one result row into an [`Instance`]: it consults the identity
//! cache, dispatches super-type rows to their sub-type through a follow-up [`Read`],
//! assigns column values, and wires relationships. To-one references load eagerly
//! unless they are nullable, point at a super-type, or the caller asked for laziness;
//! to-many references become unexecuted collections.

use std::sync::Arc;

use sea_query::Value;

use crate::collection::ModelCollection;
use crate::driver::Row;
use crate::error::{MapperError, MapperResult};
use crate::identity::{canonical_key, ModelId};
use crate::metrics::STATS;
use crate::model::{Instance, Model};
use crate::query::bake::super_schema;
use crate::query::iden::split_columns;
use crate::query::{Comparator, Condition, ConditionGroup, Filter};
use crate::schema::{Cardinality, Reference, Schema, DISCRIMINATOR_COLUMN};
use crate::session::Session;
use crate::statement::{Read, Search};
use crate::value::{key_text, value_is_null};

/// Relationship value computed before it is assigned to the model
enum Wiring {
    Value(Value),
    Loaded(Option<Instance>),
    Deferred(Read, ModelId),
    Collection(ModelCollection),
}

pub struct Hydrator {
    schema: Arc<Schema>,
    parent: Option<Arc<Schema>>,
}

impl Hydrator {
    pub fn new(session: &Session, entity: &str) -> MapperResult<Self> {
        let schema = session.schema(entity)?;
        let parent = super_schema(&schema, session.registry())?;
        Ok(Self { schema, parent })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Canonical key of a row: its identifier columns joined with `", "`
    pub fn row_key(&self, row: &Row) -> MapperResult<String> {
        let mut parts = Vec::with_capacity(self.schema.uid.len());
        for column in self.schema.uid_columns() {
            let Some(value) = row.get(&column.name) else {
                return Err(MapperError::coercion(
                    &self.schema.entity,
                    &column.property,
                    format!("identifier column \"{}\" missing from row", column.name),
                ));
            };
            parts.push(value.clone());
        }
        Ok(canonical_key(&parts))
    }

    /// Hydrate a row into `(key, instance)`
    pub fn fetch(&self, row: &Row, session: &Session, lazy: bool) -> MapperResult<(String, Instance)> {
        let key = self.row_key(row)?;
        let schema = &*self.schema;

        if schema.is_super_type {
            let discriminator = row.get(DISCRIMINATOR_COLUMN).map(key_text).unwrap_or_default();
            if !discriminator.is_empty() && discriminator != schema.entity {
                return self.dispatch(row, session, &key, &discriminator, lazy);
            }
        }

        if let Some(found) = session.cached(&schema.entity, &key) {
            return Ok((key, found));
        }

        let instance = session.registry().blank(&schema.entity)?;
        {
            let mut model = instance.borrow_mut();
            self.assign_columns(&mut *model, row)?;
        }

        let references = self.references();
        if !references.is_empty() && !session.has_database() {
            return Err(MapperError::MissingDatabase(format!(
                "{} has relationships to hydrate",
                schema.entity
            )));
        }

        // Registered before wiring so reference cycles resolve to this instance
        let id = instance.borrow().model_id();
        let cached = id.is_cacheable();
        let instance = if cached {
            session.remember(&schema.entity, &key, instance)
        } else {
            instance
        };

        if let Err(err) = self.wire_all(&references, row, &instance, session, lazy) {
            if cached {
                session.forget(&schema.entity, &key);
            }
            log::debug!("hydrating {}({key}) failed: {err}", schema.entity);
            return Err(err);
        }

        STATS.record_hydration();
        log::trace!("hydrated {}({key})", schema.entity);
        Ok((key, instance))
    }

    fn wire_all(
        &self,
        references: &[Reference],
        row: &Row,
        instance: &Instance,
        session: &Session,
        lazy: bool,
    ) -> MapperResult<()> {
        let mut wiring = Vec::with_capacity(references.len());
        for reference in references {
            wiring.push((reference, self.wire(reference, row, instance, session, lazy)?));
        }
        let mut model = instance.borrow_mut();
        for (reference, wired) in wiring {
            assign_reference(&mut *model, reference, wired, session)?;
        }
        model.tracker_mut().clear_modified();
        Ok(())
    }

    fn dispatch(
        &self,
        row: &Row,
        session: &Session,
        key: &str,
        discriminator: &str,
        lazy: bool,
    ) -> MapperResult<(String, Instance)> {
        let schema = &*self.schema;
        let known = schema.sub_types.iter().any(|s| s == discriminator)
            && session.registry().is_registered(discriminator);
        if !known {
            return Err(MapperError::SubtypeDispatch {
                super_type: schema.entity.clone(),
                discriminator: discriminator.to_string(),
            });
        }
        if let Some(found) = session.cached(discriminator, key) {
            return Ok((key.to_string(), found));
        }

        let mut filter: Option<ConditionGroup> = None;
        for column in schema.uid_columns() {
            let value = row.get(&column.name).cloned().unwrap_or(Value::String(None));
            let condition = Condition::eq(&column.property, value);
            filter = Some(match filter {
                None => ConditionGroup::new(condition),
                Some(group) => group.and(condition),
            });
        }
        let mut read = Read::new(discriminator).lazy(lazy);
        if let Some(filter) = filter {
            read = read.filter(Filter::from(filter));
        }
        let Some(instance) = read.execute(session)? else {
            return Err(MapperError::SubtypeDispatch {
                super_type: schema.entity.clone(),
                discriminator: format!("{discriminator} (no row for {key})"),
            });
        };
        let id = instance.borrow().model_id();
        let instance = if id.is_cacheable() {
            session.remember(&schema.entity, key, instance)
        } else {
            instance
        };
        Ok((key.to_string(), instance))
    }

    fn assign_columns(&self, model: &mut dyn Model, row: &Row) -> MapperResult<()> {
        let entity = &self.schema.entity;
        let inherited = self
            .parent
            .iter()
            .flat_map(|p| p.columns.iter())
            .filter(|c| self.schema.column(&c.property).is_none());
        for column in self.schema.columns.iter().chain(inherited) {
            let Some(value) = row.get(&column.name) else {
                continue;
            };
            if value_is_null(value) && !column.nullable {
                return Err(MapperError::coercion(
                    entity,
                    &column.property,
                    format!("cannot take null value from column \"{}\"", column.name),
                ));
            }
            model.set(&column.property, value.clone()).map_err(|err| match err {
                MapperError::TypeCoercion { message, .. } => MapperError::coercion(
                    entity,
                    &column.property,
                    format!("column \"{}\": {message}", column.name),
                ),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Own references, then the super-type's
    fn references(&self) -> Vec<Reference> {
        let own = self.schema.references.iter();
        let inherited = self
            .parent
            .iter()
            .flat_map(|p| p.references.iter())
            .filter(|r| self.schema.reference(&r.property).is_none());
        own.chain(inherited).cloned().collect()
    }

    fn wire(
        &self,
        reference: &Reference,
        row: &Row,
        instance: &Instance,
        session: &Session,
        lazy: bool,
    ) -> MapperResult<Wiring> {
        let registry = session.registry();
        let target = registry.resolve(&reference.target)?;
        match reference.cardinality {
            Cardinality::OneToOne | Cardinality::OneToMany => {
                let parts: Vec<Value> = split_columns(&reference.column_name)
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or(Value::String(None)))
                    .collect();
                if target.is_enum {
                    return Ok(Wiring::Value(parts.into_iter().next().unwrap_or(Value::String(None))));
                }
                let key = ModelId::new(parts);
                if !key.is_complete() {
                    return Ok(Wiring::Loaded(None));
                }
                let read = self.target_read(reference, &target, &key, session, lazy)?;
                if reference.nullable || target.is_super_type || lazy {
                    Ok(Wiring::Deferred(read, key))
                } else {
                    let mut read = read;
                    Ok(Wiring::Loaded(read.execute(session)?))
                }
            }
            Cardinality::ManyToOne => {
                let mut search = Search::new(&reference.target)
                    .filter(Condition::eq(&reference.column_name, instance))
                    .lazy(lazy);
                Ok(Wiring::Collection(search.execute(session)?))
            }
            Cardinality::ManyToMany => {
                let mut search = Search::new(&reference.target)
                    .with(&reference.property, Comparator::Equal, instance)
                    .lazy(lazy);
                Ok(Wiring::Collection(search.execute(session)?))
            }
        }
    }

    /// `Read(target)` matching the foreign key on the referenced columns
    fn target_read(
        &self,
        reference: &Reference,
        target: &Schema,
        key: &ModelId,
        session: &Session,
        lazy: bool,
    ) -> MapperResult<Read> {
        let foreign = match &reference.foreign_column {
            Some(columns) => split_columns(columns),
            None => target.uid_column_names(),
        };
        let mut group: Option<ConditionGroup> = None;
        let parent = super_schema(target, session.registry())?;
        for (column, value) in foreign.iter().zip(key.parts()) {
            let property = target
                .columns
                .iter()
                .chain(parent.iter().flat_map(|p| p.columns.iter()))
                .find(|c| &c.name == column)
                .map(|c| c.property.clone())
                .ok_or_else(|| {
                    MapperError::ReferenceResolution(format!(
                        "{}.{}: column {column} not found in {}",
                        self.schema.entity, reference.property, target.entity
                    ))
                })?;
            let condition = Condition::eq(&property, value.clone());
            group = Some(match group {
                None => ConditionGroup::new(condition),
                Some(g) => g.and(condition),
            });
        }
        let mut read = Read::new(&target.entity).lazy(lazy);
        if let Some(group) = group {
            read = read.filter(group);
        }
        Ok(read)
    }
}

fn assign_reference(
    model: &mut dyn Model,
    reference: &Reference,
    wired: Wiring,
    session: &Session,
) -> MapperResult<()> {
    let entity = model.entity_name();
    match wired {
        Wiring::Value(value) => model.set(&reference.property, value),
        Wiring::Collection(collection) => match model.collection_mut(&reference.property) {
            Some(slot) => {
                *slot = collection;
                Ok(())
            }
            None => Err(MapperError::coercion(
                entity,
                &reference.property,
                "no collection field for a to-many reference",
            )),
        },
        Wiring::Loaded(instance) => match model.related_mut(&reference.property) {
            Some(slot) => slot.assign(instance),
            None => Err(MapperError::coercion(
                entity,
                &reference.property,
                "no related field for a to-one reference",
            )),
        },
        Wiring::Deferred(read, key) => match model.related_mut(&reference.property) {
            Some(slot) => {
                slot.defer(read, session.downgrade(), Some(key));
                Ok(())
            }
            None => Err(MapperError::coercion(
                entity,
                &reference.property,
                "no related field for a to-one reference",
            )),
        },
    }
}
