//! Typed values flowing between the parser, the field specs and the writer

use std::ops::Deref;

use crate::instance::InstanceRef;

/// Closed set of scalar and object value types a field can declare
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum ValueType {
    #[strum(to_string = "bool")]
    Bool,
    #[strum(to_string = "int")]
    Int,
    #[strum(to_string = "uint")]
    UInt,
    #[strum(to_string = "float")]
    Float,
    #[strum(to_string = "string")]
    String,
    #[strum(to_string = "object")]
    Object,
    #[strum(to_string = "object list")]
    ObjectList,
}

/// One decoded value; object variants hold handles, never source text
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    String(String),
    Object(InstanceRef),
    ObjectList(Vec<InstanceRef>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::UInt(_) => ValueType::UInt,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Object(_) => ValueType::Object,
            Value::ObjectList(_) => ValueType::ObjectList,
        }
    }
}

/// Scalar types that map one-to-one onto a [`Value`] variant
pub trait Scalar: Clone + Default + 'static {
    const VALUE_TYPE: ValueType;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_scalar {
    ($ty:ty, $variant:ident) => {
        impl Scalar for $ty {
            const VALUE_TYPE: ValueType = ValueType::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_scalar!(bool, Bool);
impl_scalar!(i32, Int);
impl_scalar!(u32, UInt);
impl_scalar!(f32, Float);
impl_scalar!(String, String);

/// Storage for one field of a registered type
///
/// Remembers whether the value was ever set, by the parser or by code, so
/// that the writer emits only fields that carry information.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Field<T> {
    value: T,
    was_set: bool,
}

impl<T> Field<T> {
    /// A field holding `value` that is not yet marked as set
    pub fn with_default(value: T) -> Self {
        Self {
            value,
            was_set: false,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        self.was_set = true;
    }

    pub fn was_set(&self) -> bool {
        self.was_set
    }

    /// Mutable access; marks the field as set.
    pub fn get_mut(&mut self) -> &mut T {
        self.was_set = true;
        &mut self.value
    }
}

impl<T> Deref for Field<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self {
            value,
            was_set: true,
        }
    }
}
