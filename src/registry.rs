//! Type registry: type name to factory and ordered field specs
//!
//! A process-wide registry is available through [`global`] and is meant to
//! be filled once at startup, before any parse. Parsers only ever borrow a
//! `&Registry`, so a program (or a test) may equally own private registries.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{ErrorKind, ParseError, Result};
use crate::instance::{instance_id, InstanceRef};
use crate::spec::ObjectSpec;
use crate::value::Value;

static GLOBAL: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::new()));

/// The process-wide registry
///
/// Startup code takes the write lock to add types; parsers take the read
/// lock and pass `&Registry` down.
pub fn global() -> &'static RwLock<Registry> {
    &GLOBAL
}

#[derive(Debug, Default)]
pub struct Registry {
    specs: HashMap<String, ObjectSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type; fails if the name is taken or the fields are invalid.
    pub fn add_type(&mut self, spec: ObjectSpec) -> Result<()> {
        if self.specs.contains_key(spec.type_name()) {
            return Err(ParseError::new(
                ErrorKind::DuplicateType,
                format!(
                    "Object type registered more than once: '{}'",
                    spec.type_name()
                ),
            ));
        }
        spec.validate()?;
        if let Some(base) = spec.base_type() {
            if !self.specs.contains_key(base) {
                debug!(
                    "type '{}' registered before its base type '{}'",
                    spec.type_name(),
                    base
                );
            }
        }
        debug!(
            type_name = spec.type_name(),
            fields = spec.fields().len(),
            "registered object type"
        );
        self.specs.insert(spec.type_name().to_string(), spec);
        Ok(())
    }

    pub fn lookup(&self, type_name: &str) -> Result<&ObjectSpec> {
        self.specs.get(type_name).ok_or_else(|| {
            ParseError::new(
                ErrorKind::UnknownType,
                format!("Unknown object type '{type_name}'"),
            )
        })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.specs.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Removes every registered type.
    pub fn clear(&mut self) {
        self.specs.clear();
    }

    /// True if `type_name` is `base` or reaches it through base types.
    pub fn is_derived_from(&self, type_name: &str, base: &str) -> bool {
        let mut current = Some(type_name);
        while let Some(name) = current {
            if name == base {
                return true;
            }
            current = self.specs.get(name).and_then(|spec| spec.base_type());
        }
        false
    }

    /// Default-constructs a registered, concrete type.
    pub fn create(&self, type_name: &str) -> Result<InstanceRef> {
        let spec = self.lookup(type_name)?;
        if spec.is_abstract() {
            return Err(ParseError::new(
                ErrorKind::UnknownType,
                format!("Cannot create instance of abstract type '{type_name}'"),
            ));
        }
        Ok(spec.create().into_ref())
    }

    /// Copies an instance through its field specs.
    ///
    /// The copy is default-constructed and then receives every field that
    /// was set on `source`, keeping its name. With `deep`, nested objects
    /// are copied as well; an object reached twice inside `source` is copied
    /// once and shared the same way in the result.
    pub fn clone_instance(&self, source: &InstanceRef, deep: bool) -> Result<InstanceRef> {
        let mut cloned = HashMap::new();
        self.clone_into(source, deep, &mut cloned)
    }

    fn clone_into(
        &self,
        source: &InstanceRef,
        deep: bool,
        cloned: &mut HashMap<usize, InstanceRef>,
    ) -> Result<InstanceRef> {
        if let Some(copy) = cloned.get(&instance_id(source)) {
            return Ok(Rc::clone(copy));
        }

        let src = source.borrow();
        let spec = self.lookup(src.type_name())?;
        let copy = spec.create().into_ref();
        {
            let mut c = copy.borrow_mut();
            if let Some(name) = src.name() {
                c.set_name(name);
            }
            if let Some(location) = src.location() {
                c.set_location(location.clone());
            }
            c.mark_clone();
        }
        cloned.insert(instance_id(source), Rc::clone(&copy));

        for field in spec.fields() {
            let Some(values) = field.fetch(&src) else {
                continue;
            };
            let values = if deep {
                values
                    .into_iter()
                    .map(|value| self.clone_value(value, cloned))
                    .collect::<Result<Vec<_>>>()?
            } else {
                values
            };
            field.store(&mut copy.borrow_mut(), values)?;
        }
        Ok(copy)
    }

    fn clone_value(&self, value: Value, cloned: &mut HashMap<usize, InstanceRef>) -> Result<Value> {
        Ok(match value {
            Value::Object(obj) => Value::Object(self.clone_into(&obj, true, cloned)?),
            Value::ObjectList(list) => Value::ObjectList(
                list.iter()
                    .map(|obj| self.clone_into(obj, true, cloned))
                    .collect::<Result<Vec<_>>>()?,
            ),
            scalar => scalar,
        })
    }
}
