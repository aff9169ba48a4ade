//! Pool of reusable instances cloned from per-type originals

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::error::{ErrorKind, ParseError, Result};
use crate::instance::InstanceRef;
use crate::registry::Registry;

struct Original {
    instance: InstanceRef,
    created: usize,
}

/// Hands out deep clones of one original per type, reusing released ones
///
/// Originals are never handed out themselves. Fresh clones are named
/// `<Type>_<n>`, counting from 0 per type.
#[derive(Default)]
pub struct InstanceStore {
    originals: HashMap<String, Original>,
    available: HashMap<String, Vec<InstanceRef>>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every original and every available instance.
    pub fn reset(&mut self) {
        self.originals.clear();
        self.available.clear();
    }

    /// Stores the original for its type, replacing any previous one.
    pub fn add_original(&mut self, original: &InstanceRef) {
        let type_name = original.borrow().type_name().to_string();
        self.originals.insert(
            type_name,
            Original {
                instance: Rc::clone(original),
                created: 0,
            },
        );
    }

    pub fn has_original(&self, type_name: &str) -> bool {
        self.originals.contains_key(type_name)
    }

    /// Returns a released instance of `type_name`, or a new clone of its
    /// original.
    pub fn acquire(&mut self, type_name: &str, registry: &Registry) -> Result<InstanceRef> {
        if let Some(instance) = self.available.get_mut(type_name).and_then(Vec::pop) {
            trace!(type_name, "reusing released instance");
            return Ok(instance);
        }
        let original = self.originals.get_mut(type_name).ok_or_else(|| {
            ParseError::new(
                ErrorKind::UnknownType,
                format!("No original instance stored for type '{type_name}'"),
            )
        })?;
        let instance = registry.clone_instance(&original.instance, true)?;
        instance
            .borrow_mut()
            .set_name(format!("{type_name}_{}", original.created));
        original.created += 1;
        Ok(instance)
    }

    /// Makes `instance` available to a later `acquire` of its type.
    pub fn release(&mut self, instance: InstanceRef) {
        let type_name = instance.borrow().type_name().to_string();
        self.available.entry(type_name).or_default().push(instance);
    }
}
