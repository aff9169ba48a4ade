//! Lexical scopes for constants, named instances and templates
//!
//! Every object body opens a scope. Lookups walk from the innermost scope
//! outward; instance names additionally fall back to a document-wide table
//! holding every instance named so far, latest definition first.

use std::collections::HashMap;
use std::rc::Rc;

use crate::instance::InstanceRef;

#[derive(Default)]
struct Scope {
    constants: HashMap<String, String>,
    names: HashMap<String, InstanceRef>,
    templates: HashMap<String, InstanceRef>,
}

pub(crate) struct Scopes {
    stack: Vec<Scope>,
    document: HashMap<String, InstanceRef>,
}

impl Scopes {
    /// Starts with the document-level scope in place.
    pub(crate) fn new() -> Self {
        Self {
            stack: vec![Scope::default()],
            document: HashMap::new(),
        }
    }

    pub(crate) fn push(&mut self) {
        self.stack.push(Scope::default());
    }

    /// Closes the innermost body scope; the document scope is never popped.
    pub(crate) fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn innermost(&mut self) -> &mut Scope {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub(crate) fn define_constant(&mut self, name: String, value: String) {
        self.innermost().constants.insert(name, value);
    }

    pub(crate) fn constant(&self, name: &str) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .find_map(|scope| scope.constants.get(name))
            .map(String::as_str)
    }

    pub(crate) fn define(&mut self, name: &str, instance: &InstanceRef) {
        self.innermost()
            .names
            .insert(name.to_string(), Rc::clone(instance));
        self.document.insert(name.to_string(), Rc::clone(instance));
    }

    pub(crate) fn define_template(&mut self, name: &str, instance: &InstanceRef) {
        self.innermost()
            .templates
            .insert(name.to_string(), Rc::clone(instance));
    }

    /// Template lookup for CLONE; every template table is searched before
    /// any instance name, so a named instance never hides a template.
    pub(crate) fn template(&self, name: &str) -> Option<InstanceRef> {
        self.stack
            .iter()
            .rev()
            .find_map(|scope| scope.templates.get(name))
            .map(Rc::clone)
            .or_else(|| self.resolve(name))
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<InstanceRef> {
        self.stack
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(name).or_else(|| scope.templates.get(name)))
            .or_else(|| self.document.get(name))
            .map(Rc::clone)
    }
}
