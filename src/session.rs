//! Per-request mapper context
//!
//! A [`Session`] bundles what statements, the hydrator and collections need: the shared
//! [`Registry`], the database handle, the identity map and the optional external model
//! cache. It is cheap to clone and confined to one thread. Lazy relationships and
//! collections keep a [`WeakSession`] so hydrated graphs do not keep the session alive.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::cache::{model_key, IdentityMap, ObjectCache};
use crate::config::MapperConfig;
use crate::driver::Database;
use crate::error::{MapperError, MapperResult};
use crate::metrics::STATS;
use crate::model::Instance;
use crate::schema::{Registry, Schema};

struct SessionInner {
    registry: Arc<Registry>,
    database: Option<Rc<dyn Database>>,
    identities: RefCell<IdentityMap>,
    object_cache: Option<Rc<dyn ObjectCache<Instance>>>,
    config: MapperConfig,
}

#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<SessionInner>,
}

pub struct SessionBuilder {
    registry: Arc<Registry>,
    database: Option<Rc<dyn Database>>,
    object_cache: Option<Rc<dyn ObjectCache<Instance>>>,
    config: MapperConfig,
}

impl SessionBuilder {
    pub fn database<D: Database + 'static>(mut self, database: Rc<D>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn object_cache<C: ObjectCache<Instance> + 'static>(mut self, cache: Rc<C>) -> Self {
        self.object_cache = Some(cache);
        self
    }

    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Session {
        Session {
            inner: Rc::new(SessionInner {
                registry: self.registry,
                database: self.database,
                identities: RefCell::new(IdentityMap::default()),
                object_cache: self.object_cache,
                config: self.config,
            }),
        }
    }
}

impl Session {
    pub fn builder(registry: Arc<Registry>) -> SessionBuilder {
        SessionBuilder {
            registry,
            database: None,
            object_cache: None,
            config: MapperConfig::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn config(&self) -> &MapperConfig {
        &self.inner.config
    }

    pub fn schema(&self, entity: &str) -> MapperResult<Arc<Schema>> {
        self.inner.registry.resolve(entity)
    }

    pub fn has_database(&self) -> bool {
        self.inner.database.is_some()
    }

    /// The database handle, or `MissingDatabase` naming what needed it
    pub fn database(&self, needed_by: &str) -> MapperResult<&Rc<dyn Database>> {
        self.inner
            .database
            .as_ref()
            .ok_or_else(|| MapperError::MissingDatabase(needed_by.to_string()))
    }

    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Cached instance of an entity by canonical identifier
    pub fn cached(&self, entity: &str, id: &str) -> Option<Instance> {
        let found = if self.inner.config.use_internal_cache {
            self.inner.identities.borrow().get(entity, id)
        } else {
            None
        };
        let found = found.or_else(|| {
            let instance = self.inner.object_cache.as_ref()?.get(&model_key(entity, id))?;
            if self.inner.config.use_internal_cache {
                self.inner
                    .identities
                    .borrow_mut()
                    .insert(entity, id, instance.clone());
            }
            Some(instance)
        });
        if found.is_some() {
            STATS.record_identity_hit();
            log::trace!("identity cache hit {entity}({id})");
        }
        found
    }

    /// Register an instance; returns the instance already cached under the key, if any
    pub fn remember(&self, entity: &str, id: &str, instance: Instance) -> Instance {
        let instance = if self.inner.config.use_internal_cache {
            self.inner
                .identities
                .borrow_mut()
                .insert(entity, id, instance)
        } else {
            instance
        };
        if let Some(cache) = &self.inner.object_cache {
            cache.set(&model_key(entity, id), instance.clone(), self.inner.config.model_ttl());
        }
        instance
    }

    pub fn forget(&self, entity: &str, id: &str) {
        self.inner.identities.borrow_mut().remove(entity, id);
        if let Some(cache) = &self.inner.object_cache {
            cache.remove(&model_key(entity, id));
        }
    }

    pub fn identity_count(&self) -> usize {
        self.inner.identities.borrow().len()
    }

    pub fn clear_identities(&self) {
        self.inner.identities.borrow_mut().clear();
    }
}

impl WeakSession {
    pub fn upgrade(&self) -> Option<Session> {
        self.inner.upgrade().map(|inner| Session { inner })
    }

    /// A handle that never upgrades, for detached collections
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }
}

impl Default for WeakSession {
    fn default() -> Self {
        Self::detached()
    }
}
