//! Schema resolver
//!
//! Types are registered explicitly (`register::<T>()`); resolution reads the declarative
//! metadata a type wrote into its [`TableDefinition`] and produces an immutable
//! [`Schema`], memoised for the life of the registry and optionally mirrored into an
//! external [`ObjectCache`].
//!
//! Self and mutually recursive references resolve through in-progress stubs: a schema
//! under construction is published to the current resolution once its table name and
//! identifier are known, before its references are walked.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::cache::{schema_key, ObjectCache};
use crate::config::MapperConfig;
use crate::error::{MapperError, MapperResult};
use crate::metrics::STATS;
use crate::model::{Entity, Instance, ModelEnum};

use super::column::enum_column_type;
use super::{
    infer_column_type, lcfirst, ucfirst, Cardinality, Column, Reference, Schema,
    TableDefinition, DISCRIMINATOR_COLUMN,
};

type DescribeFn = fn(&mut TableDefinition);
type BlankFn = fn() -> Instance;

/// External cache shared between threads
pub type SharedSchemaCache = Arc<dyn ObjectCache<Arc<Schema>> + Send + Sync>;

#[derive(Clone, Copy)]
enum Source {
    Entity { describe: DescribeFn, blank: BlankFn },
    Enum { variants: &'static [&'static str] },
}

#[derive(Clone, Copy)]
struct Entry {
    name: &'static str,
    source: Source,
    sub_type_of: Option<&'static str>,
}

/// Registered types and their resolved schemas
pub struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
    external: Option<SharedSchemaCache>,
    schema_ttl: Duration,
}

#[derive(Default)]
struct Resolution {
    visiting: HashSet<String>,
    stubs: HashMap<String, Arc<Schema>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn blank_instance<T: Entity>() -> Instance {
    Instance::new(T::blank())
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            schemas: RwLock::new(HashMap::new()),
            external: None,
            schema_ttl: MapperConfig::default().schema_ttl(),
        }
    }

    /// Mirror resolved schemas into an external cache
    pub fn with_object_cache(mut self, cache: SharedSchemaCache) -> Self {
        self.external = Some(cache);
        self
    }

    pub fn with_config(mut self, config: &MapperConfig) -> Self {
        self.schema_ttl = config.schema_ttl();
        self
    }

    /// Register an entity type.
    ///
    /// Registering a sub-type drops the cached schema of its super-type, so the
    /// discriminator picks the new sub-type up on the next resolution.
    pub fn register<T: Entity>(&self) -> &Self {
        let mut def = TableDefinition::new(T::NAME);
        T::describe(&mut def);
        let entry = Entry {
            name: T::NAME,
            source: Source::Entity {
                describe: T::describe,
                blank: blank_instance::<T>,
            },
            sub_type_of: def.sub_type_of,
        };
        write(&self.entries).insert(T::NAME.to_string(), entry);
        log::debug!("registered entity {}", T::NAME);
        if let Some(super_type) = def.sub_type_of {
            self.invalidate(super_type);
        }
        self.invalidate(T::NAME);
        self
    }

    pub fn register_enum<E: ModelEnum>(&self) -> &Self {
        let entry = Entry {
            name: E::NAME,
            source: Source::Enum {
                variants: E::VARIANTS,
            },
            sub_type_of: None,
        };
        write(&self.entries).insert(E::NAME.to_string(), entry);
        log::debug!("registered enum {}", E::NAME);
        self.invalidate(E::NAME);
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        read(&self.entries).contains_key(name)
    }

    /// Registered type names, sorted
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.entries).keys().cloned().collect();
        names.sort();
        names
    }

    /// Blank instance of an entity, as constructed by the hydrator
    pub fn blank(&self, name: &str) -> MapperResult<Instance> {
        match self.entry(name)?.source {
            Source::Entity { blank, .. } => Ok(blank()),
            Source::Enum { .. } => Err(MapperError::SchemaResolution(format!(
                "{name} is an enum and has no instances"
            ))),
        }
    }

    pub fn invalidate(&self, name: &str) {
        if write(&self.schemas).remove(name).is_some() {
            log::debug!("invalidated cached schema {name}");
        }
        if let Some(cache) = &self.external {
            cache.remove(&schema_key(name));
        }
    }

    /// Resolve the schema of a registered type
    pub fn resolve(&self, name: &str) -> MapperResult<Arc<Schema>> {
        if let Some(schema) = self.cached(name) {
            return Ok(schema);
        }
        let mut resolution = Resolution::default();
        self.build(name, &mut resolution)
    }

    fn cached(&self, name: &str) -> Option<Arc<Schema>> {
        if let Some(schema) = read(&self.schemas).get(name) {
            return Some(schema.clone());
        }
        let schema = self.external.as_ref()?.get(&schema_key(name))?;
        write(&self.schemas).insert(name.to_string(), schema.clone());
        Some(schema)
    }

    fn entry(&self, name: &str) -> MapperResult<Entry> {
        read(&self.entries).get(name).copied().ok_or_else(|| {
            MapperError::SchemaResolution(format!("type {name} is not registered"))
        })
    }

    fn target(&self, name: &str, resolution: &mut Resolution) -> MapperResult<Arc<Schema>> {
        if let Some(schema) = self.cached(name) {
            return Ok(schema);
        }
        if let Some(stub) = resolution.stubs.get(name) {
            return Ok(stub.clone());
        }
        if resolution.visiting.contains(name) {
            return Err(MapperError::SchemaResolution(format!(
                "circular resolution of {name} before its identifier is known"
            )));
        }
        self.build(name, resolution)
    }

    fn build(&self, name: &str, resolution: &mut Resolution) -> MapperResult<Arc<Schema>> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("resolve_schema", entity = name).entered();

        let entry = self.entry(name)?;
        resolution.visiting.insert(name.to_string());
        let mut schema = match entry.source {
            Source::Enum { variants } => build_enum(entry.name, variants),
            Source::Entity { describe, .. } => {
                let mut def = TableDefinition::new(entry.name);
                describe(&mut def);
                self.build_entity(def, resolution)?
            }
        };
        schema.complete = true;
        resolution.visiting.remove(name);
        resolution.stubs.remove(name);

        let schema = Arc::new(schema);
        write(&self.schemas).insert(name.to_string(), schema.clone());
        if let Some(cache) = &self.external {
            cache.set(&schema_key(name), schema.clone(), self.schema_ttl);
        }
        STATS.record_schema();
        log::debug!(
            "resolved schema {} (table {}, {} columns, {} references)",
            schema.entity,
            schema.table_name,
            schema.columns.len(),
            schema.references.len()
        );
        Ok(schema)
    }

    fn build_entity(
        &self,
        def: TableDefinition,
        resolution: &mut Resolution,
    ) -> MapperResult<Schema> {
        let entity = def.entity;
        let table_name = match (&def.table_name, def.use_declared_names) {
            (Some(table), _) => table.clone(),
            (None, true) => entity.to_string(),
            (None, false) => {
                return Err(MapperError::SchemaResolution(format!(
                    "no table name declared for {entity}"
                )))
            }
        };
        let inherit_columns = def.inherit_columns.unwrap_or(def.sub_type_of.is_none());
        let mut schema = Schema::new(entity, table_name);

        for column in &def.columns {
            schema.columns.push(Column {
                property: column.property.clone(),
                name: column.name.clone().unwrap_or_else(|| column.property.clone()),
                column_type: column
                    .column_type
                    .clone()
                    .unwrap_or_else(|| infer_column_type(column.kind, column.max_length)),
                nullable: column.nullable && !column.primary_key,
                unique: column.unique,
                auto_increment: column.auto_increment,
                default: column.default.clone(),
                extra: column.extra.clone(),
            });
            if column.primary_key {
                schema.uid.push(column.property.clone());
            }
        }

        if let Some(super_name) = def.sub_type_of {
            self.attach_super_type(&mut schema, super_name, inherit_columns, resolution)?;
        }

        if def.is_super_type {
            schema.is_super_type = true;
            let mut sub_types: Vec<String> = def.sub_types.iter().map(|s| s.to_string()).collect();
            let mut discovered: Vec<String> = read(&self.entries)
                .values()
                .filter(|e| e.sub_type_of == Some(entity))
                .map(|e| e.name.to_string())
                .collect();
            discovered.sort();
            for sub in discovered {
                if !sub_types.contains(&sub) {
                    sub_types.push(sub);
                }
            }
            schema.discriminator = Some(Column {
                property: DISCRIMINATOR_COLUMN.to_string(),
                name: DISCRIMINATOR_COLUMN.to_string(),
                column_type: enum_column_type(sub_types.iter().map(String::as_str)),
                nullable: false,
                unique: false,
                auto_increment: false,
                default: None,
                extra: None,
            });
            schema.sub_types = sub_types;
        }

        resolution
            .stubs
            .insert(entity.to_string(), Arc::new(schema.clone()));

        for reference in &def.references {
            let target = self.target(reference.target, resolution)?;
            if target.uid.is_empty() {
                return Err(MapperError::SchemaResolution(format!(
                    "{entity}.{} references {} which has no identifier",
                    reference.property, target.entity
                )));
            }
            let declared_column = schema
                .columns
                .iter()
                .position(|c| c.property == reference.property)
                .map(|i| schema.columns.remove(i));
            let target_uid = target.uid_column_names().join(", ");

            let column_name = match reference.cardinality {
                Cardinality::OneToOne | Cardinality::OneToMany => reference
                    .column
                    .clone()
                    .or_else(|| declared_column.as_ref().map(|c| c.name.clone()))
                    .unwrap_or_else(|| reference.property.clone()),
                Cardinality::ManyToOne => {
                    reference.column.clone().unwrap_or_else(|| lcfirst(entity))
                }
                Cardinality::ManyToMany => reference.column.clone().unwrap_or_else(|| {
                    let names = schema.uid_column_names();
                    if names.is_empty() {
                        "id".to_string()
                    } else {
                        names.join(", ")
                    }
                }),
            };

            let (foreign_table, foreign_column, foreign_right_column) = match reference.cardinality
            {
                Cardinality::OneToOne => (
                    Some(
                        reference
                            .foreign_table
                            .clone()
                            .unwrap_or_else(|| target.table_name.clone()),
                    ),
                    Some(reference.foreign_column.clone().unwrap_or(target_uid)),
                    None,
                ),
                Cardinality::OneToMany | Cardinality::ManyToOne => (
                    reference.foreign_table.clone(),
                    reference.foreign_column.clone(),
                    None,
                ),
                Cardinality::ManyToMany => {
                    let owner_table = lcfirst(&schema.table_name);
                    (
                        Some(reference.foreign_table.clone().unwrap_or_else(|| {
                            format!("{owner_table}Have{}", target.table_name)
                        })),
                        Some(reference.foreign_column.clone().unwrap_or_else(|| {
                            format!("{owner_table}{}", ucfirst(&column_name))
                        })),
                        Some(reference.foreign_right_column.clone().unwrap_or_else(|| {
                            format!("{}{}", lcfirst(&target.table_name), ucfirst(&target_uid))
                        })),
                    )
                }
            };

            let nullable = reference
                .nullable
                .or(declared_column.as_ref().map(|c| c.nullable))
                .unwrap_or(true);

            schema.references.push(Reference {
                property: reference.property.clone(),
                cardinality: reference.cardinality,
                target: target.entity.clone(),
                nullable,
                column_name,
                foreign_table,
                foreign_column,
                foreign_right_column,
            });
        }

        Ok(schema)
    }

    fn attach_super_type(
        &self,
        schema: &mut Schema,
        super_name: &str,
        inherit_columns: bool,
        resolution: &mut Resolution,
    ) -> MapperResult<()> {
        let parent = self.target(super_name, resolution).map_err(|e| match e {
            MapperError::SchemaResolution(msg) => MapperError::SchemaResolution(format!(
                "super-type of {}: {msg}",
                schema.entity
            )),
            other => other,
        })?;
        if !parent.is_super_type {
            return Err(MapperError::SchemaResolution(format!(
                "{} is declared a sub-type of {super_name}, which is not a super-type",
                schema.entity
            )));
        }
        if parent.uid.is_empty() {
            return Err(MapperError::SchemaResolution(format!(
                "super-type {super_name} has no identifier"
            )));
        }

        for uid_property in &parent.uid {
            let Some(parent_column) = parent.column(uid_property) else {
                continue;
            };
            match schema.columns.iter_mut().find(|c| &c.property == uid_property) {
                Some(column) => {
                    column.name = parent_column.name.clone();
                    column.column_type = parent_column.column_type.clone();
                    column.unique = parent_column.unique;
                    column.nullable = false;
                    column.auto_increment = false;
                }
                None => schema.columns.insert(
                    0,
                    Column {
                        nullable: false,
                        auto_increment: false,
                        ..parent_column.clone()
                    },
                ),
            }
            if !schema.is_uid(uid_property) {
                schema.uid.push(uid_property.clone());
            }
        }

        if !inherit_columns {
            let uid = schema.uid.clone();
            schema
                .columns
                .retain(|c| uid.contains(&c.property) || parent.column(&c.property).is_none());
        }

        let uid_columns = schema.uid_column_names().join(", ");
        schema.super_type = Some(parent.entity.clone());
        schema.parent = Some(Reference {
            property: lcfirst(&parent.entity),
            cardinality: Cardinality::OneToOne,
            target: parent.entity.clone(),
            nullable: false,
            column_name: uid_columns,
            foreign_table: Some(parent.table_name.clone()),
            foreign_column: Some(parent.uid_column_names().join(", ")),
            foreign_right_column: None,
        });
        Ok(())
    }
}

fn build_enum(name: &str, variants: &[&str]) -> Schema {
    let longest = variants.iter().map(|v| v.chars().count()).max().unwrap_or(1);
    let mut schema = Schema::new(name, name.to_string());
    schema.is_enum = true;
    schema.enum_variants = variants.iter().map(|v| v.to_string()).collect();
    schema.columns.push(Column {
        property: "id".to_string(),
        name: "id".to_string(),
        column_type: format!("VARCHAR({longest})"),
        nullable: false,
        unique: true,
        auto_increment: false,
        default: None,
        extra: None,
    });
    schema.uid.push("id".to_string());
    schema
}
