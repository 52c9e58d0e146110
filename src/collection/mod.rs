//! Lazy, keyed, diff-tracked collections
//!
//! A [`ModelCollection`] is what a Search returns and what to-many relationships hold.
//! It is a sparse view over a result set: rows are hydrated on demand and cached under
//! their canonical identifier, and local edits are recorded as added, modified and
//! removed keys until an Update writes them back.
//!
//! A collection created with `ModelCollection::default()` is detached: it has no query
//! and only holds what the application puts in it.

mod snapshot;

pub use snapshot::CollectionSnapshot;

use std::collections::HashMap;
use std::fmt;

use sea_query::Value;

use crate::driver::Cursor;
use crate::error::{MapperError, MapperResult};
use crate::hydrator::Hydrator;
use crate::model::Instance;
use crate::session::{Session, WeakSession};
use crate::statement::run;

pub struct ModelCollection {
    entity: String,
    session: WeakSession,
    query: Option<(String, Vec<Value>)>,
    cursor: Option<Box<dyn Cursor>>,
    lazy: bool,
    /// Rows arrive sorted by ascending identifier
    identifier_order: bool,
    limit: Option<u64>,
    offset: Option<u64>,
    /// Keep hydrated instances; without it every access re-reads the row
    pub cache: bool,
    /// Execute on first access instead of failing
    pub auto_execute: bool,
    /// Close the cursor once every row was read
    pub auto_close: bool,
    /// Jump to `key - 1` for numeric keys of whole-table lists
    pub fetch_absolute: bool,
    executed: bool,
    exhausted: bool,
    is_list: bool,
    count: usize,
    cursor_position: usize,
    rows: HashMap<usize, String>,
    scanned: usize,
    objects: HashMap<String, Instance>,
    appended: Vec<String>,
    added: Vec<String>,
    modified: Vec<String>,
    removed: Vec<String>,
    graveyard: HashMap<String, Instance>,
    provisional: usize,
}

impl Default for ModelCollection {
    fn default() -> Self {
        Self {
            entity: String::new(),
            session: WeakSession::detached(),
            query: None,
            cursor: None,
            lazy: false,
            identifier_order: true,
            limit: None,
            offset: None,
            cache: true,
            auto_execute: true,
            auto_close: true,
            fetch_absolute: false,
            executed: true,
            exhausted: true,
            is_list: true,
            count: 0,
            cursor_position: 0,
            rows: HashMap::new(),
            scanned: 0,
            objects: HashMap::new(),
            appended: Vec::new(),
            added: Vec::new(),
            modified: Vec::new(),
            removed: Vec::new(),
            graveyard: HashMap::new(),
            provisional: 0,
        }
    }
}

impl fmt::Debug for ModelCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCollection")
            .field("entity", &self.entity)
            .field("executed", &self.executed)
            .field("exhausted", &self.exhausted)
            .field("count", &self.count)
            .field("cached", &self.objects.len())
            .field("added", &self.added)
            .field("modified", &self.modified)
            .field("removed", &self.removed)
            .finish()
    }
}

impl ModelCollection {
    /// Collection over a compiled query, executed on first access
    pub(crate) fn deferred(
        entity: &str,
        sql: String,
        values: Vec<Value>,
        session: &Session,
        lazy: bool,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Self {
        let config = session.config();
        Self {
            entity: entity.to_string(),
            session: session.downgrade(),
            query: Some((sql, values)),
            lazy,
            limit,
            offset,
            cache: config.collection_cache,
            auto_close: config.auto_close,
            fetch_absolute: config.fetch_absolute,
            executed: false,
            exhausted: false,
            is_list: false,
            ..Self::default()
        }
    }

    /// Whether the query orders rows by identifier only; numeric keys of a list are then
    /// found at or before position `key - 1`
    pub(crate) fn with_identifier_order(mut self, identifier_order: bool) -> Self {
        self.identifier_order = identifier_order;
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn is_detached(&self) -> bool {
        self.query.is_none()
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether the result covers the whole table slice from the first row
    pub fn is_list(&self) -> bool {
        self.is_list
    }

    fn session(&self) -> MapperResult<Session> {
        self.session.upgrade().ok_or_else(|| {
            MapperError::MissingDatabase(format!(
                "collection of {} outlived its session",
                self.entity
            ))
        })
    }

    fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
    }

    fn ensure_executed(&mut self) -> MapperResult<()> {
        if self.executed {
            return Ok(());
        }
        if !self.auto_execute {
            return Err(MapperError::Statement(format!(
                "collection of {} has not been executed",
                self.entity
            )));
        }
        self.execute().map(|_| ())
    }

    /// Run the query, dropping cached rows; returns the number of rows
    pub fn execute(&mut self) -> MapperResult<usize> {
        let Some((sql, values)) = self.query.clone() else {
            return Ok(self.objects.len());
        };
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("collection_execute", entity = %self.entity).entered();

        self.close_cursor();
        self.rows.clear();
        self.scanned = 0;
        self.cursor_position = 0;
        self.exhausted = false;
        let pending = &self.added;
        self.appended.retain(|key| pending.contains(key));
        let appended = &self.appended;
        self.objects.retain(|key, _| appended.contains(key));

        let session = self.session()?;
        let mut cursor = run(&session, "collection", &sql, &values)?;
        let count = match cursor.row_count() {
            Some(count) => count,
            None => {
                log::warn!("driver cannot count rows of {}; scanning the result", self.entity);
                let mut count = 0;
                while cursor.fetch_next()?.is_some() {
                    count += 1;
                }
                cursor.execute(&values)?;
                count
            }
        };
        self.count = count;
        self.cursor = Some(cursor);
        self.executed = true;
        self.is_list = self.offset.unwrap_or(0) == 0 && self.limit.map_or(true, |limit| limit as usize >= count);
        log::debug!("collection of {}: {count} row(s)", self.entity);
        if count == 0 {
            self.mark_exhausted();
        }
        Ok(count)
    }

    /// Close the cursor and forget fetched rows; the next access executes again
    pub fn reset(&mut self, keep_objects: bool) {
        self.close_cursor();
        if self.query.is_none() {
            return;
        }
        self.executed = false;
        self.exhausted = false;
        self.rows.clear();
        self.scanned = 0;
        self.cursor_position = 0;
        if !keep_objects {
            let appended = &self.appended;
            self.objects.retain(|key, _| appended.contains(key));
        }
    }

    fn mark_exhausted(&mut self) {
        self.exhausted = true;
        if self.auto_close {
            self.close_cursor();
        }
    }

    fn cursor(&mut self) -> MapperResult<&mut Box<dyn Cursor>> {
        if self.cursor.is_none() {
            let Some((sql, values)) = &self.query else {
                return Err(MapperError::Statement("detached collection has no cursor".into()));
            };
            let session = self.session()?;
            self.cursor = Some(run(&session, "collection", sql, values)?);
            self.cursor_position = 0;
        }
        self.cursor
            .as_mut()
            .ok_or_else(|| MapperError::Statement("collection cursor unavailable".into()))
    }

    /// Row at a result position, from cache or cursor
    pub fn fetch(&mut self, index: usize) -> MapperResult<Option<(String, Instance)>> {
        if let Some(key) = self.rows.get(&index) {
            if let Some(instance) = self.objects.get(key).or_else(|| self.graveyard.get(key)) {
                return Ok(Some((key.clone(), instance.clone())));
            }
        }
        if self.query.is_none() {
            return Ok(None);
        }
        self.ensure_executed()?;
        if index >= self.count {
            self.mark_exhausted();
            return Ok(None);
        }

        let session = self.session()?;
        let hydrator = Hydrator::new(&session, &self.entity)?;
        let row = if session.database("collection")?.supports_absolute_fetch() {
            self.cursor()?.fetch(index)?
        } else {
            if index < self.cursor_position {
                log::trace!("collection of {}: rewinding to row {index}", self.entity);
                let values = self.query.as_ref().map(|(_, v)| v.clone()).unwrap_or_default();
                self.cursor()?.execute(&values)?;
                self.cursor_position = 0;
            }
            let mut found = None;
            while self.cursor_position <= index {
                let next = self.cursor()?.fetch_next()?;
                let position = self.cursor_position;
                self.cursor_position += 1;
                let Some(row) = next else {
                    break;
                };
                if position == index {
                    found = Some(row);
                } else if !self.rows.contains_key(&position) {
                    self.rows.insert(position, hydrator.row_key(&row)?);
                }
            }
            found
        };
        let Some(row) = row else {
            self.mark_exhausted();
            return Ok(None);
        };

        let (key, instance) = hydrator.fetch(&row, &session, self.lazy)?;
        self.rows.insert(index, key.clone());
        let instance = if self.cache {
            self.objects.entry(key.clone()).or_insert(instance).clone()
        } else {
            instance
        };
        while self.rows.contains_key(&self.scanned) {
            self.scanned += 1;
        }
        if self.scanned >= self.count {
            self.mark_exhausted();
        }
        Ok(Some((key, instance)))
    }

    fn row_index(&self, key: &str) -> Option<usize> {
        self.rows.iter().find(|(_, k)| k.as_str() == key).map(|(i, _)| *i)
    }

    fn is_row_key(&self, key: &str) -> bool {
        self.rows.values().any(|k| k == key)
    }

    /// Instance under a key
    pub fn get(&mut self, key: &str) -> MapperResult<Option<Instance>> {
        if self.removed.iter().any(|k| k == key) {
            return Ok(None);
        }
        if let Some(instance) = self.objects.get(key) {
            return Ok(Some(instance.clone()));
        }
        if self.query.is_none() {
            return Ok(None);
        }
        self.ensure_executed()?;
        if let Some(index) = self.row_index(key) {
            return Ok(self.fetch(index)?.map(|(_, instance)| instance));
        }

        let numeric = key
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0 && self.identifier_order);
        if let (true, true, Some(n)) = (self.fetch_absolute, self.is_list, numeric) {
            if self.session()?.database("collection")?.supports_absolute_fetch() {
                if let Some((found, instance)) = self.fetch(n - 1)? {
                    if found == key {
                        return Ok(Some(instance));
                    }
                }
            }
        }

        let bound = match numeric {
            Some(n) if self.is_list => n.min(self.count),
            _ => self.count,
        };
        let mut index = self.scanned;
        while index < bound {
            match self.fetch(index)? {
                Some((found, instance)) if found == key => return Ok(Some(instance)),
                Some(_) => index += 1,
                None => break,
            }
        }
        Ok(None)
    }

    /// Put an instance under a key: an existing key is replaced (and marked modified
    /// when the model has modifications), a new key is added
    pub fn insert(&mut self, key: &str, instance: Instance) -> MapperResult<()> {
        if self.added.iter().any(|k| k == key) {
            self.objects.insert(key.to_string(), instance);
            return Ok(());
        }
        if let Some(position) = self.removed.iter().position(|k| k == key) {
            self.removed.remove(position);
            self.graveyard.remove(key);
            if !self.is_row_key(key) {
                self.appended.push(key.to_string());
            }
            self.objects.insert(key.to_string(), instance);
            return Ok(());
        }

        let exists = self.get(key)?.is_some();
        let modified = instance.borrow().tracker().has_modifications();
        self.objects.insert(key.to_string(), instance);
        if exists {
            if modified && !self.modified.iter().any(|k| k == key) {
                self.modified.push(key.to_string());
            }
        } else {
            self.appended.push(key.to_string());
            self.added.push(key.to_string());
        }
        Ok(())
    }

    /// Insert under the instance's identifier (or a provisional key); returns the key
    pub fn push(&mut self, instance: Instance) -> MapperResult<String> {
        let id = instance.borrow().model_id();
        let key = if id.is_assigned() {
            id.canonical()
        } else {
            self.provisional += 1;
            format!("new:{}", self.provisional)
        };
        self.insert(&key, instance)?;
        Ok(key)
    }

    /// Remove a key; returns the instance that was under it
    pub fn remove(&mut self, key: &str) -> MapperResult<Option<Instance>> {
        if let Some(position) = self.added.iter().position(|k| k == key) {
            self.added.remove(position);
            self.appended.retain(|k| k != key);
            self.modified.retain(|k| k != key);
            return Ok(self.objects.remove(key));
        }
        let Some(instance) = self.get(key)? else {
            return Ok(None);
        };
        self.appended.retain(|k| k != key);
        self.modified.retain(|k| k != key);
        self.objects.remove(key);
        self.graveyard.insert(key.to_string(), instance.clone());
        self.removed.push(key.to_string());
        Ok(Some(instance))
    }

    /// Read every remaining row
    fn materialise(&mut self) -> MapperResult<()> {
        let mut index = 0;
        while self.fetch(index)?.is_some() {
            index += 1;
        }
        Ok(())
    }

    /// Mark every known persisted key removed and drop pending additions
    pub fn unset_all(&mut self, keep_objects: bool) -> MapperResult<usize> {
        self.materialise()?;
        let mut persisted: Vec<(usize, String)> = self
            .rows
            .iter()
            .map(|(index, key)| (*index, key.clone()))
            .collect();
        persisted.sort();
        let mut keys: Vec<String> = persisted.into_iter().map(|(_, key)| key).collect();
        keys.extend(self.appended.iter().filter(|k| !self.added.contains(k)).cloned());
        keys.retain(|k| !self.removed.contains(k));

        let affected = keys.len() + self.added.len();
        for key in keys {
            if let Some(instance) = self.objects.get(&key) {
                self.graveyard.insert(key.clone(), instance.clone());
            }
            self.removed.push(key);
        }
        for key in self.added.drain(..) {
            self.objects.remove(&key);
        }
        self.modified.clear();
        self.appended.clear();
        if !keep_objects {
            self.objects.clear();
        }
        log::debug!("collection of {}: unset {affected} key(s)", self.entity);
        Ok(affected)
    }

    pub fn added_keys(&self) -> &[String] {
        &self.added
    }

    pub fn modified_keys(&self) -> &[String] {
        &self.modified
    }

    pub fn removed_keys(&self) -> &[String] {
        &self.removed
    }

    /// Number of pending changes across the three sets
    pub fn modified_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    pub(crate) fn added_instances(&self) -> Vec<Instance> {
        self.added.iter().filter_map(|k| self.objects.get(k).cloned()).collect()
    }

    pub(crate) fn modified_instances(&self) -> Vec<Instance> {
        self.modified.iter().filter_map(|k| self.objects.get(k).cloned()).collect()
    }

    /// Identifier values of the removed keys
    pub(crate) fn removed_ids(&self) -> Vec<Value> {
        self.removed
            .iter()
            .map(|key| {
                let from_instance = self
                    .graveyard
                    .get(key)
                    .and_then(|instance| instance.borrow().model_id().as_single().cloned());
                from_instance.unwrap_or_else(|| match key.parse::<i64>() {
                    Ok(id) => Value::BigInt(Some(id)),
                    Err(_) => Value::String(Some(key.clone())),
                })
            })
            .collect()
    }

    /// Forget the pending change sets without touching membership
    pub fn clear_changes(&mut self) {
        self.added.clear();
        self.modified.clear();
        self.removed.clear();
        self.graveyard.clear();
    }

    /// Changes were written: a query-backed collection re-reads its rows on next access
    ///
    /// Removed rows and locally appended keys are now part of the stored result, so the
    /// cursor positions no longer match; a detached collection keeps its members.
    pub(crate) fn mark_flushed(&mut self) {
        self.clear_changes();
        if self.query.is_some() {
            self.appended.clear();
            self.reset(false);
        }
    }

    /// Whether the instance is a member, by identifier or by identity
    pub fn has(&mut self, instance: &Instance) -> MapperResult<bool> {
        let id = instance.borrow().model_id();
        if id.is_assigned() {
            return Ok(self.get(&id.canonical())?.is_some());
        }
        Ok(self.objects.values().any(|member| member.ptr_eq(instance)))
    }

    /// Number of members
    pub fn len(&mut self) -> MapperResult<usize> {
        self.ensure_executed()?;
        let removed_rows = self.removed.iter().filter(|k| self.is_row_key(k)).count();
        Ok(self.count.saturating_sub(removed_rows) + self.appended.len())
    }

    pub fn is_empty(&mut self) -> MapperResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn iter(&mut self) -> Iter<'_> {
        Iter {
            collection: self,
            index: 0,
            appended: 0,
            rows_done: false,
        }
    }

    /// Member keys in order
    pub fn keys(&mut self) -> MapperResult<Vec<String>> {
        self.iter().map(|entry| entry.map(|(key, _)| key)).collect()
    }

    /// Every member, in order
    pub fn as_array(&mut self) -> MapperResult<Vec<Instance>> {
        self.iter().map(|entry| entry.map(|(_, instance)| instance)).collect()
    }

    /// Members as a JSON array of their column values
    pub fn to_json(&mut self) -> MapperResult<serde_json::Value> {
        let members = self.as_array()?;
        Ok(serde_json::Value::Array(
            members.iter().map(|member| member.borrow().to_json()).collect(),
        ))
    }

    /// Serializable copy of the fully materialised collection
    pub fn snapshot(&mut self) -> MapperResult<CollectionSnapshot> {
        let mut keys = Vec::new();
        let mut objects = Vec::new();
        for entry in self.iter() {
            let (key, instance) = entry?;
            objects.push(instance.borrow().to_json());
            keys.push(key);
        }
        Ok(CollectionSnapshot {
            entity: self.entity.clone(),
            count: keys.len(),
            keys,
            objects,
            added: self.added.clone(),
            modified: self.modified.clone(),
            removed: self.removed.clone(),
            is_list: self.is_list,
        })
    }
}

/// Ordered iteration: result rows first, then keys inserted locally
pub struct Iter<'a> {
    collection: &'a mut ModelCollection,
    index: usize,
    appended: usize,
    rows_done: bool,
}

impl Iterator for Iter<'_> {
    type Item = MapperResult<(String, Instance)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rows_done {
            match self.collection.fetch(self.index) {
                Err(err) => {
                    self.rows_done = true;
                    self.appended = usize::MAX;
                    return Some(Err(err));
                }
                Ok(None) => self.rows_done = true,
                Ok(Some((key, instance))) => {
                    self.index += 1;
                    if self.collection.removed.contains(&key) || self.collection.appended.contains(&key) {
                        continue;
                    }
                    return Some(Ok((key, instance)));
                }
            }
        }
        while self.appended < self.collection.appended.len() {
            let key = self.collection.appended[self.appended].clone();
            self.appended += 1;
            if let Some(instance) = self.collection.objects.get(&key) {
                return Some(Ok((key, instance.clone())));
            }
        }
        None
    }
}
