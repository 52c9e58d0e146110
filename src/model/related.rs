//! Deferred to-one relationships
//!
//! A [`Related<T>`] is either loaded (holding the related instance, or nothing) or
//! unloaded, holding the `Read` that loads it. The first access runs the read exactly
//! once and keeps the result.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::error::{MapperError, MapperResult};
use crate::identity::ModelId;
use crate::session::WeakSession;
use crate::statement::Read;

use super::{Entity, Instance};

/// Object-safe view of a [`Related<T>`] used by the hydrator and statements
pub trait RelatedSlot {
    /// Entity the slot points at
    fn target(&self) -> &'static str;

    /// Stored foreign key, known from the hydrated row before loading
    fn key(&self) -> Option<&ModelId>;

    /// Install an unexecuted read, replacing any loaded value
    fn defer(&mut self, read: Read, session: WeakSession, key: Option<ModelId>);

    /// Assign a loaded value
    fn assign(&mut self, instance: Option<Instance>) -> MapperResult<()>;

    /// Load if needed and return the related instance
    fn instance(&self) -> MapperResult<Option<Instance>>;

    /// The loaded instance, without triggering a load
    fn peek(&self) -> Option<Instance>;

    fn is_loaded(&self) -> bool;
}

struct PendingRead {
    read: Read,
    session: WeakSession,
}

pub struct Related<T> {
    key: Option<ModelId>,
    pending: RefCell<Option<PendingRead>>,
    cell: OnceCell<Option<Instance>>,
    _entity: PhantomData<T>,
}

impl<T> Default for Related<T> {
    fn default() -> Self {
        Self {
            key: None,
            pending: RefCell::new(None),
            cell: OnceCell::new(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Related<T> {
    /// Loaded slot holding `value`
    pub fn loaded(value: Option<Rc<RefCell<T>>>) -> Self {
        let mut related = Self::default();
        related.set(value);
        related
    }

    /// Replace the related model; the foreign key follows the new value
    pub fn set(&mut self, value: Option<Rc<RefCell<T>>>) {
        self.set_instance(value.map(Instance::from_rc));
    }

    fn set_instance(&mut self, value: Option<Instance>) {
        self.pending = RefCell::new(None);
        self.key = None;
        self.cell = OnceCell::new();
        let _ = self.cell.set(value);
    }

    /// The related model as `T`
    ///
    /// Loads on first access. A related instance of another entity (a sub-type of `T`)
    /// yields `None` here; use [`RelatedSlot::instance`] to reach it.
    pub fn get(&self) -> MapperResult<Option<Rc<RefCell<T>>>> {
        Ok(self.load()?.as_ref().and_then(|i| i.downcast::<T>()))
    }

    fn load(&self) -> MapperResult<&Option<Instance>> {
        self.cell.get_or_try_init(|| {
            let pending = self.pending.borrow_mut().take();
            let Some(PendingRead { mut read, session }) = pending else {
                return Ok(None);
            };
            let result = match session.upgrade() {
                Some(session) => read.execute(&session),
                None => Err(MapperError::MissingDatabase(format!(
                    "session closed before {} could be loaded",
                    T::NAME
                ))),
            };
            if result.is_err() {
                read.reset();
                *self.pending.borrow_mut() = Some(PendingRead { read, session });
            }
            result
        })
    }
}

impl<T: Entity> RelatedSlot for Related<T> {
    fn target(&self) -> &'static str {
        T::NAME
    }

    fn key(&self) -> Option<&ModelId> {
        self.key.as_ref()
    }

    fn defer(&mut self, read: Read, session: WeakSession, key: Option<ModelId>) {
        self.cell = OnceCell::new();
        self.pending = RefCell::new(Some(PendingRead { read, session }));
        self.key = key;
    }

    fn assign(&mut self, instance: Option<Instance>) -> MapperResult<()> {
        self.set_instance(instance);
        Ok(())
    }

    fn instance(&self) -> MapperResult<Option<Instance>> {
        Ok(self.load()?.clone())
    }

    fn peek(&self) -> Option<Instance> {
        self.cell.get().cloned().flatten()
    }

    fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> fmt::Debug for Related<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(Some(instance)) => write!(f, "Related(Loaded({instance:?}))"),
            Some(None) => write!(f, "Related(Loaded(None))"),
            None => match &self.key {
                Some(key) => write!(f, "Related(Unloaded({key}))"),
                None => write!(f, "Related(Unloaded)"),
            },
        }
    }
}
