//! Type-erased, shared model handle

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::{Entity, Model};

/// Shared handle to a model of any registered entity
///
/// The same allocation is reachable both as `dyn Model` (for the mapper) and as
/// `dyn Any` (for typed access), so a `Read` of a super-type can hand back a sub-type
/// instance that the caller downcasts.
#[derive(Clone)]
pub struct Instance {
    entity: &'static str,
    any: Rc<dyn Any>,
    model: Rc<RefCell<dyn Model>>,
}

impl Instance {
    pub fn new<T: Model>(model: T) -> Self {
        Self::from_rc(Rc::new(RefCell::new(model)))
    }

    pub fn from_rc<T: Model>(rc: Rc<RefCell<T>>) -> Self {
        let entity = rc.borrow().entity_name();
        let any: Rc<dyn Any> = rc.clone();
        let model: Rc<RefCell<dyn Model>> = rc;
        Self { entity, any, model }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn is<T: Entity>(&self) -> bool {
        self.any.is::<RefCell<T>>()
    }

    /// Typed handle, `None` when the instance is of another entity
    pub fn downcast<T: Entity>(&self) -> Option<Rc<RefCell<T>>> {
        self.any.clone().downcast::<RefCell<T>>().ok()
    }

    pub fn borrow(&self) -> Ref<'_, dyn Model> {
        self.model.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, dyn Model> {
        self.model.borrow_mut()
    }

    /// Same underlying allocation
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.any, &other.any)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.model.try_borrow() {
            Ok(model) => write!(f, "Instance({} {})", self.entity, model.model_id()),
            Err(_) => write!(f, "Instance({} <borrowed>)", self.entity),
        }
    }
}

impl<T: Entity> From<Rc<RefCell<T>>> for Instance {
    fn from(rc: Rc<RefCell<T>>) -> Self {
        Instance::from_rc(rc)
    }
}
