//! Object caches
//!
//! [`ObjectCache`] is the contract of an external key/value cache with TTL; it is used for
//! resolved schemas (`schema_<Entity>`) and hydrated models (`model_<Entity>_<id>`).
//! [`MemoryCache`] is an in-process implementation. [`IdentityMap`] is the per-session
//! identity cache.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::model::Instance;

pub trait ObjectCache<V> {
    fn get(&self, key: &str) -> Option<V>;

    fn set(&self, key: &str, value: V, ttl: Duration);

    fn has(&self, key: &str) -> bool;

    /// Drop an entry, e.g. a super-type schema after a new sub-type registered
    fn remove(&self, key: &str);
}

pub fn schema_key(entity: &str) -> String {
    format!("schema_{entity}")
}

pub fn model_key(entity: &str, id: &str) -> String {
    format!("model_{entity}_{id}")
}

/// Mutex-guarded map with per-entry expiry
pub struct MemoryCache<V> {
    entries: Mutex<HashMap<String, (V, Instant)>>,
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> MemoryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries().values().filter(|(_, expires)| *expires > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> MemoryCache<V> {
    /// The entry map; a lock poisoned by a panicking holder is recovered
    fn entries(&self) -> MutexGuard<'_, HashMap<String, (V, Instant)>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            log::warn!("object cache lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl<V: Clone> ObjectCache<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries();
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        self.entries()
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}

/// Per-entity map from canonical identifier to the one live instance
#[derive(Debug, Default)]
pub struct IdentityMap {
    entities: HashMap<String, HashMap<String, Instance>>,
}

impl IdentityMap {
    pub fn get(&self, entity: &str, id: &str) -> Option<Instance> {
        self.entities.get(entity).and_then(|m| m.get(id)).cloned()
    }

    /// Register an instance; an existing entry for the same key is kept
    pub fn insert(&mut self, entity: &str, id: &str, instance: Instance) -> Instance {
        self.entities
            .entry(entity.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert(instance)
            .clone()
    }

    pub fn remove(&mut self, entity: &str, id: &str) -> Option<Instance> {
        self.entities.get_mut(entity).and_then(|m| m.remove(id))
    }

    pub fn len(&self) -> usize {
        self.entities.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        cache.set("schema_User", 1u32, Duration::from_secs(60));
        cache.set("schema_Group", 2u32, Duration::ZERO);
        assert_eq!(cache.get("schema_User"), Some(1));
        assert!(!cache.has("schema_Group"));
        cache.remove("schema_User");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let cache = MemoryCache::new();
        cache.set("model_User_1", 1u32, Duration::from_secs(60));
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = cache.entries.lock().unwrap();
            panic!("holder panicked");
        }));
        assert!(cache.entries.is_poisoned());

        cache.set("model_User_2", 2u32, Duration::from_secs(60));
        assert_eq!(cache.get("model_User_2"), Some(2));
        cache.remove("model_User_1");
        assert!(!cache.has("model_User_1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_formats() {
        assert_eq!(schema_key("User"), "schema_User");
        assert_eq!(model_key("User", "3"), "model_User_3");
    }
}
