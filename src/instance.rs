//! Parsed object instances and their shared handles
//!
//! An [`Instance`] pairs the bookkeeping the language needs (type name,
//! optional instance name, clone flag, definition site) with the consumer's
//! own data, stored type-erased and reached through the registered field
//! specs or through [`view`]/[`view_mut`].
//!
//! Instances are shared through [`InstanceRef`]; identity is the allocation,
//! never the field contents.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::error::SourceLocation;

pub type InstanceRef = Rc<RefCell<Instance>>;

pub struct Instance {
    type_name: String,
    name: Option<String>,
    is_clone: bool,
    location: Option<SourceLocation>,
    data: Box<dyn Any>,
}

impl Instance {
    pub fn new(type_name: impl Into<String>, data: Box<dyn Any>) -> Self {
        Self {
            type_name: type_name.into(),
            name: None,
            is_clone: false,
            location: None,
            data,
        }
    }

    pub fn into_ref(self) -> InstanceRef {
        Rc::new(RefCell::new(self))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the instance name; an empty name leaves the instance unnamed.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
    }

    pub fn is_clone(&self) -> bool {
        self.is_clone
    }

    pub(crate) fn mark_clone(&mut self) {
        self.is_clone = true;
    }

    /// Where the instance was defined, for instances built by the parser
    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub(crate) fn set_location(&mut self, location: SourceLocation) {
        self.location = Some(location);
    }

    pub fn data<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn data_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut::<T>()
    }

    pub(crate) fn data_any(&self) -> &dyn Any {
        self.data.as_ref()
    }

    pub(crate) fn data_any_mut(&mut self) -> &mut dyn Any {
        self.data.as_mut()
    }

    /// `Type "Name"` or just `Type`, for messages and logs
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} \"{}\"", self.type_name, name),
            None => self.type_name.clone(),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("is_clone", &self.is_clone)
            .finish_non_exhaustive()
    }
}

/// Pointer identity of two handles
pub fn same_instance(a: &InstanceRef, b: &InstanceRef) -> bool {
    Rc::ptr_eq(a, b)
}

/// Stable identity key for visited-sets and clone maps
pub fn instance_id(instance: &InstanceRef) -> usize {
    Rc::as_ptr(instance) as *const () as usize
}

/// Borrows the consumer data of an instance as `T`.
pub fn view<T: 'static>(instance: &InstanceRef) -> Option<Ref<'_, T>> {
    Ref::filter_map(instance.borrow(), |inst| inst.data::<T>()).ok()
}

pub fn view_mut<T: 'static>(instance: &InstanceRef) -> Option<RefMut<'_, T>> {
    RefMut::filter_map(instance.borrow_mut(), |inst| inst.data_mut::<T>()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Point {
        x: i32,
    }

    #[test]
    fn test_identity_is_not_structural() {
        let a = Instance::new("Point", Box::new(Point { x: 1 })).into_ref();
        let b = Instance::new("Point", Box::new(Point { x: 1 })).into_ref();
        let a2 = Rc::clone(&a);
        assert!(same_instance(&a, &a2));
        assert!(!same_instance(&a, &b));
        assert_eq!(instance_id(&a), instance_id(&a2));
        assert_ne!(instance_id(&a), instance_id(&b));
    }

    #[test]
    fn test_typed_views() {
        let inst = Instance::new("Point", Box::new(Point::default())).into_ref();
        view_mut::<Point>(&inst).unwrap().x = 7;
        assert_eq!(view::<Point>(&inst).unwrap().x, 7);
        assert!(view::<String>(&inst).is_none());
    }

    #[test]
    fn test_names() {
        let mut inst = Instance::new("Point", Box::new(Point::default()));
        assert_eq!(inst.describe(), "Point");
        inst.set_name("Origin");
        assert_eq!(inst.describe(), "Point \"Origin\"");
        inst.set_name("");
        assert_eq!(inst.name(), None);
    }
}
