//! Writer: serializes an instance graph back to the text format
//!
//! Output re-parses to an isomorphic graph. Only fields that were set and
//! are not hidden are written, in registration order. An instance reached
//! more than once is written in full at its first occurrence and as
//! `USE "Name"` afterwards; shared instances without a usable name get a
//! generated one.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::coder;
use crate::error::{ErrorKind, ParseError};
use crate::instance::{instance_id, Instance, InstanceRef};
use crate::registry::Registry;
use crate::spec::FieldSpec;
use crate::value::Value;

const INDENT: usize = 2;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Registry(#[from] ParseError),
}

pub type WriteResult<T> = std::result::Result<T, WriteError>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Appends `# <address>` after every object header, for debugging
    pub address_flag: bool,
}

/// Called with `enter = true` before an object is written; returning false
/// skips it (and the field holding it). Called again with `enter = false`
/// once a written object is finished.
pub type WriteFilter = Box<dyn FnMut(&Instance, bool) -> bool>;

pub struct Writer<W: Write> {
    out: W,
    options: WriteOptions,
    filter: Option<WriteFilter>,
    depth: usize,
}

/// Per-graph bookkeeping for one `write_object` call
#[derive(Default)]
struct GraphNames {
    names: HashMap<usize, String>,
    written: HashSet<usize>,
}

impl GraphNames {
    /// Walks the graphs below `roots` once to find shared instances and pick
    /// the name each instance is written with.
    fn survey(roots: &[InstanceRef], registry: &Registry) -> WriteResult<Self> {
        let mut visits: HashMap<usize, usize> = HashMap::new();
        let mut order: Vec<InstanceRef> = Vec::new();
        let mut pending: Vec<InstanceRef> = roots.iter().rev().map(Rc::clone).collect();
        while let Some(inst) = pending.pop() {
            let count = visits.entry(instance_id(&inst)).or_insert(0);
            *count += 1;
            if *count > 1 {
                continue;
            }
            let obj = inst.borrow();
            let spec = registry.lookup(obj.type_name())?;
            let mut children = Vec::new();
            for field in spec.fields().iter().filter(|f| !f.is_hidden()) {
                for value in field.fetch(&obj).unwrap_or_default() {
                    match value {
                        Value::Object(child) => children.push(child),
                        Value::ObjectList(list) => children.extend(list),
                        _ => {}
                    }
                }
            }
            // Depth-first, in field order
            pending.extend(children.into_iter().rev());
            drop(obj);
            order.push(inst);
        }

        let mut owners: HashMap<String, HashSet<usize>> = HashMap::new();
        for inst in &order {
            if let Some(name) = inst.borrow().name() {
                owners
                    .entry(name.to_string())
                    .or_default()
                    .insert(instance_id(inst));
            }
        }
        let mut taken: HashSet<String> = owners.keys().cloned().collect();

        let mut names = HashMap::new();
        for inst in &order {
            let id = instance_id(inst);
            let obj = inst.borrow();
            let shared = visits.get(&id).copied().unwrap_or(0) > 1;
            let unique = obj
                .name()
                .is_some_and(|name| owners.get(name).map_or(0, HashSet::len) == 1);
            let chosen = match obj.name() {
                Some(name) if unique || !shared => Some(name.to_string()),
                _ if !shared => None,
                name => Some(generate_name(name.unwrap_or(obj.type_name()), &mut taken)),
            };
            if let Some(chosen) = chosen {
                names.insert(id, chosen);
            }
        }

        debug!(
            instances = order.len(),
            shared = visits.values().filter(|&&n| n > 1).count(),
            "surveyed graph for writing"
        );
        Ok(Self {
            names,
            written: HashSet::new(),
        })
    }
}

fn generate_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{base}_{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::Bool(v) => coder::encode_bool(*v),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => coder::encode_float(*v),
        Value::String(v) => coder::encode_string(v),
        Value::Object(_) | Value::ObjectList(_) => String::new(),
    }
}

impl<W: Write> Writer<W> {
    pub fn new(out: W) -> Self {
        Self::with_options(out, WriteOptions::default())
    }

    pub fn with_options(out: W, options: WriteOptions) -> Self {
        Self {
            out,
            options,
            filter: None,
            depth: 0,
        }
    }

    pub fn set_filter(&mut self, filter: impl FnMut(&Instance, bool) -> bool + 'static) {
        self.filter = Some(Box::new(filter));
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes `text` as `#` comment lines.
    pub fn write_comment(&mut self, text: &str) -> WriteResult<()> {
        for line in text.lines() {
            writeln!(self.out, "# {line}")?;
        }
        Ok(())
    }

    /// Writes `root` and everything reachable from it, followed by a newline.
    pub fn write_object(&mut self, root: &InstanceRef, registry: &Registry) -> WriteResult<()> {
        if !self.enter(root) {
            return Ok(());
        }
        let mut names = GraphNames::survey(std::slice::from_ref(root), registry)?;
        self.depth = 0;
        self.write_instance(root, registry, &mut names)?;
        self.exit(root);
        writeln!(self.out)?;
        Ok(())
    }

    /// Writes one field as `name: value`, if it was set. Returns whether
    /// anything was written.
    pub fn write_field(
        &mut self,
        instance: &InstanceRef,
        field_name: &str,
        registry: &Registry,
    ) -> WriteResult<bool> {
        let obj = instance.borrow();
        let spec = registry.lookup(obj.type_name())?;
        let field = spec.find_field(field_name).ok_or_else(|| {
            ParseError::new(
                ErrorKind::UnknownField,
                format!(
                    "Unknown field '{field_name}' in object of type '{}'",
                    obj.type_name()
                ),
            )
        })?;
        let Some(values) = field.fetch(&obj) else {
            return Ok(false);
        };
        drop(obj);
        if let [Value::Object(child)] = values.as_slice() {
            if !self.enter(child) {
                return Ok(false);
            }
        }
        let children: Vec<InstanceRef> = match values.as_slice() {
            [Value::Object(child)] => vec![Rc::clone(child)],
            [Value::ObjectList(list)] => list.clone(),
            _ => Vec::new(),
        };
        let mut names = GraphNames::survey(&children, registry)?;
        write!(self.out, "{}: ", field.name())?;
        self.write_value(field, values, registry, &mut names)?;
        Ok(true)
    }

    fn indent(&mut self) -> io::Result<()> {
        write!(self.out, "{:width$}", "", width = self.depth * INDENT)
    }

    fn enter(&mut self, inst: &InstanceRef) -> bool {
        match self.filter.as_mut() {
            Some(filter) => filter(&inst.borrow(), true),
            None => true,
        }
    }

    fn exit(&mut self, inst: &InstanceRef) {
        if let Some(filter) = self.filter.as_mut() {
            filter(&inst.borrow(), false);
        }
    }

    fn write_instance(
        &mut self,
        inst: &InstanceRef,
        registry: &Registry,
        names: &mut GraphNames,
    ) -> WriteResult<()> {
        let id = instance_id(inst);
        let name = names.names.get(&id).cloned();
        if let Some(name) = name.as_deref().filter(|_| names.written.contains(&id)) {
            write!(self.out, "USE {}", coder::encode_string(name))?;
            return Ok(());
        }
        names.written.insert(id);

        let obj = inst.borrow();
        let spec = registry.lookup(obj.type_name())?;
        write!(self.out, "{}", obj.type_name())?;
        if let Some(name) = &name {
            write!(self.out, " {}", coder::encode_string(name))?;
        }

        let fields: Vec<(&FieldSpec, Vec<Value>)> = spec
            .fields()
            .iter()
            .filter(|f| !f.is_hidden())
            .filter_map(|f| f.fetch(&obj).map(|values| (f, values)))
            .collect();
        drop(obj);

        if fields.is_empty() {
            write!(self.out, " {{}}")?;
            self.write_address(inst)?;
            return Ok(());
        }

        write!(self.out, " {{")?;
        self.write_address(inst)?;
        writeln!(self.out)?;
        self.depth += 1;
        for (field, values) in fields {
            if let [Value::Object(child)] = values.as_slice() {
                if !self.enter(child) {
                    continue;
                }
            }
            self.indent()?;
            write!(self.out, "{}: ", field.name())?;
            self.write_value(field, values, registry, names)?;
            writeln!(self.out, ",")?;
        }
        self.depth -= 1;
        self.indent()?;
        write!(self.out, "}}")?;
        Ok(())
    }

    fn write_address(&mut self, inst: &InstanceRef) -> io::Result<()> {
        if self.options.address_flag {
            write!(self.out, " # {:p}", Rc::as_ptr(inst))?;
        }
        Ok(())
    }

    fn write_value(
        &mut self,
        field: &FieldSpec,
        values: Vec<Value>,
        registry: &Registry,
        names: &mut GraphNames,
    ) -> WriteResult<()> {
        match values.as_slice() {
            [Value::Object(child)] => {
                self.write_instance(child, registry, names)?;
                self.exit(child);
            }
            [Value::ObjectList(list)] => self.write_object_list(list, registry, names)?,
            scalars if field.is_list() => {
                let items: Vec<String> = scalars.iter().map(format_scalar).collect();
                write!(self.out, "[{}]", items.join(", "))?;
            }
            scalars => {
                let items: Vec<String> = scalars.iter().map(format_scalar).collect();
                write!(self.out, "{}", items.join(" "))?;
            }
        }
        Ok(())
    }

    fn write_object_list(
        &mut self,
        list: &[InstanceRef],
        registry: &Registry,
        names: &mut GraphNames,
    ) -> WriteResult<()> {
        let mut opened = false;
        for obj in list {
            if !self.enter(obj) {
                continue;
            }
            if !opened {
                writeln!(self.out, "[")?;
                self.depth += 1;
                opened = true;
            }
            self.indent()?;
            self.write_instance(obj, registry, names)?;
            self.exit(obj);
            writeln!(self.out, ",")?;
        }
        if !opened {
            write!(self.out, "[]")?;
            return Ok(());
        }
        self.depth -= 1;
        self.indent()?;
        write!(self.out, "]")?;
        Ok(())
    }
}
