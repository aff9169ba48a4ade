//! Shared fixtures for the integration tests
//!
//! `Simple` carries one field of every scalar kind, `Derived` extends it
//! with object fields and a hidden field, and `Other` is an unrelated type
//! for type-mismatch checks.

#![allow(dead_code)]

use std::io::Write as _;

use bitflags::bitflags;
use objgraph::{
    field, view, Field, InstanceRef, ObjectSpec, Parser, Registry, SpecBuilder, Writer,
};
use strum::{AsRefStr, EnumString};
use tempfile::NamedTempFile;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, AsRefStr)]
pub enum SimpleEnum {
    #[default]
    E1,
    E2,
    E3,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FlagEnum: u32 {
        const F1 = 0x1;
        const F2 = 0x2;
        const F3 = 0x4;
    }
}

#[derive(Default)]
pub struct Simple {
    pub bool_val: Field<bool>,
    pub int_val: Field<i32>,
    pub uint_val: Field<u32>,
    pub float_val: Field<f32>,
    pub str_val: Field<String>,
    pub enum_val: Field<SimpleEnum>,
    pub flag_val: Field<FlagEnum>,
    pub vec3f_val: Field<[f32; 3]>,
    pub color_val: Field<[f32; 4]>,
    pub ints_val: Field<Vec<i32>>,
    pub strs_val: Field<Vec<String>>,
}

pub struct Derived {
    pub base: Simple,
    pub simple: Field<Option<InstanceRef>>,
    pub simple_list: Field<Vec<InstanceRef>>,
    pub hidden_int: Field<i32>,
}

impl Default for Derived {
    fn default() -> Self {
        Self {
            base: Simple::default(),
            simple: Field::default(),
            simple_list: Field::default(),
            hidden_int: Field::with_default(12),
        }
    }
}

#[derive(Default)]
pub struct Other;

pub fn simple_spec() -> ObjectSpec {
    SpecBuilder::<Simple>::new()
        .add_bool("bool_val", field!(Simple, bool_val))
        .add_int("int_val", field!(Simple, int_val))
        .add_uint("uint_val", field!(Simple, uint_val))
        .add_float("float_val", field!(Simple, float_val))
        .add_string("str_val", field!(Simple, str_val))
        .add_enum("enum_val", field!(Simple, enum_val))
        .add_flags("flag_val", field!(Simple, flag_val))
        .add_array("vec3f_val", field!(Simple, vec3f_val))
        .add_array("color_val", field!(Simple, color_val))
        .add_list("ints_val", field!(Simple, ints_val))
        .add_list("strs_val", field!(Simple, strs_val))
        .build("Simple")
}

pub fn derived_spec() -> ObjectSpec {
    SpecBuilder::<Derived>::derived_from(&simple_spec(), field!(Derived, base))
        .add_object("simple", Some("Simple"), field!(Derived, simple))
        .add_object_list("simple_list", Some("Simple"), field!(Derived, simple_list))
        .add_int("hidden_int", field!(Derived, hidden_int))
        .hidden()
        .build("Derived")
}

pub fn other_spec() -> ObjectSpec {
    SpecBuilder::<Other>::new().build("Other")
}

/// Registry holding `Simple`, `Derived` and `Other`
pub fn registry() -> Registry {
    init_tracing();
    let mut registry = Registry::new();
    registry.add_type(simple_spec()).expect("register Simple");
    registry.add_type(derived_spec()).expect("register Derived");
    registry.add_type(other_spec()).expect("register Other");
    registry
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("objgraph=debug")
        .with_test_writer()
        .try_init();
}

/// Input setting every field of `Simple`
pub fn full_simple_input() -> &'static str {
    r#"# Full-line comment
Simple "TestObj" {
  bool_val:  True,
  int_val:   -13,
  uint_val:  67,   # In-line comment
  float_val: 3.4,
  str_val:   "A quoted string",
  enum_val:  "E2",
  flag_val:  "F1| F3",
  vec3f_val: 2 3 4.5,
  color_val: .2 .3 .4 1,
  ints_val:  [6, 5, -2],
  strs_val:  ["A", "B"],
}
"#
}

pub fn parse(registry: &Registry, input: &str) -> InstanceRef {
    Parser::new(registry)
        .parse_str(input)
        .unwrap_or_else(|e| panic!("parse failed: {e}"))
        .root
}

/// Parses and returns the error message, panicking if parsing succeeds.
pub fn parse_err(registry: &Registry, input: &str) -> String {
    match Parser::new(registry).parse_str(input) {
        Ok(_) => panic!("expected a parse error for {input:?}"),
        Err(e) => e.to_string(),
    }
}

pub fn write(registry: &Registry, root: &InstanceRef) -> String {
    let mut writer = Writer::new(Vec::new());
    writer.write_object(root, registry).expect("write graph");
    String::from_utf8(writer.into_inner()).expect("utf8 output")
}

pub fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

pub fn int_val(instance: &InstanceRef) -> i32 {
    if let Some(simple) = view::<Simple>(instance) {
        return *simple.int_val;
    }
    *view::<Derived>(instance).expect("Simple or Derived").base.int_val
}
