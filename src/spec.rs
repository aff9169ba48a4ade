//! Field and object specs: explicit, registration-time reflection
//!
//! Each registered type describes its fields once, through a [`SpecBuilder`]
//! that captures typed accessors into type-erased store/fetch closures. A
//! derived type's builder starts from its base type's finished field list
//! (projected through the derived-to-base accessor) and appends its own
//! entries, giving one flat ordered list per concrete type.
//!
//! ```ignore
//! let simple = SpecBuilder::<Simple>::new()
//!     .add_int("int_val", field!(Simple, int_val))
//!     .add_string("str_val", field!(Simple, str_val))
//!     .build("Simple");
//! ```

use std::any::{type_name, Any};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::Flags;

use crate::coder;
use crate::error::{ParseError, Result};
use crate::instance::{Instance, InstanceRef};
use crate::value::{Field, Scalar, Value, ValueType};

pub type Factory = Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>;
pub type StoreFn = Arc<dyn Fn(&mut dyn Any, Vec<Value>) -> Result<()> + Send + Sync>;
/// Returns the current values of a field, or `None` when it was never set
pub type FetchFn = Arc<dyn Fn(&dyn Any) -> Option<Vec<Value>> + Send + Sync>;

/// Typed access from a struct to one of its members
///
/// Usually built with the [`field!`](crate::field) macro.
pub struct Accessor<T, F> {
    pub get: fn(&T) -> &F,
    pub get_mut: fn(&mut T) -> &mut F,
}

impl<T, F> Accessor<T, F> {
    pub fn new(get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self {
        Self { get, get_mut }
    }
}

impl<T, F> Clone for Accessor<T, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, F> Copy for Accessor<T, F> {}

/// Builds an [`Accessor`] for a named member: `field!(Simple, int_val)`.
#[macro_export]
macro_rules! field {
    ($ty:ty, $member:ident) => {
        $crate::spec::Accessor::<$ty, _>::new(|o: &$ty| &o.$member, |o: &mut $ty| &mut o.$member)
    };
}

fn downcast_mut<T: 'static>(data: &mut dyn Any) -> Result<&mut T> {
    data.downcast_mut::<T>().ok_or_else(|| {
        ParseError::invalid_spec(format!("Field storage is not a {}", type_name::<T>()))
    })
}

fn scalars<V: Scalar>(field: &str, values: Vec<Value>) -> Result<Vec<V>> {
    values
        .iter()
        .map(|value| {
            V::from_value(value).ok_or_else(|| {
                ParseError::conversion(format!(
                    "Expected {} value for field '{}', got {}",
                    V::VALUE_TYPE,
                    field,
                    value.value_type()
                ))
            })
        })
        .collect()
}

fn single<V: Scalar>(field: &str, values: Vec<Value>) -> Result<V> {
    let count = values.len();
    scalars::<V>(field, values)?.pop().filter(|_| count == 1).ok_or_else(|| {
        ParseError::conversion(format!(
            "Expected 1 value for field '{field}', got {count}"
        ))
    })
}

// ============================================================================
// FieldSpec
// ============================================================================

/// Name, value type, arity and store/fetch behavior for one field
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    value_type: ValueType,
    arity: usize,
    is_list: bool,
    object_type: Option<String>,
    hidden: bool,
    store: StoreFn,
    fetch: FetchFn,
}

impl FieldSpec {
    pub fn new(
        name: impl Into<String>,
        value_type: ValueType,
        arity: usize,
        store: StoreFn,
        fetch: FetchFn,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            arity,
            is_list: false,
            object_type: None,
            hidden: false,
            store,
            fetch,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Number of scalar tokens per value (1 for plain fields and objects)
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// True for bracketed, variable-length scalar lists
    pub fn is_list(&self) -> bool {
        self.is_list
    }

    /// Type every stored object must be, or derive from
    pub fn object_type(&self) -> Option<&str> {
        self.object_type.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn store(&self, instance: &mut Instance, values: Vec<Value>) -> Result<()> {
        (self.store)(instance.data_any_mut(), values)
    }

    pub fn fetch(&self, instance: &Instance) -> Option<Vec<Value>> {
        (self.fetch)(instance.data_any())
    }

    /// Re-targets this spec through a derived-to-base accessor.
    fn project<T: 'static, B: 'static>(&self, to_base: Accessor<T, B>) -> FieldSpec {
        let inner_store = Arc::clone(&self.store);
        let inner_fetch = Arc::clone(&self.fetch);
        FieldSpec {
            store: Arc::new(move |data: &mut dyn Any, values: Vec<Value>| {
                let derived = downcast_mut::<T>(data)?;
                inner_store((to_base.get_mut)(derived) as &mut dyn Any, values)
            }),
            fetch: Arc::new(move |data: &dyn Any| {
                let derived = data.downcast_ref::<T>()?;
                inner_fetch((to_base.get)(derived) as &dyn Any)
            }),
            ..self.clone()
        }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("arity", &self.arity)
            .field("is_list", &self.is_list)
            .field("object_type", &self.object_type)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ObjectSpec
// ============================================================================

/// Registered description of a type: factory plus ordered field list
#[derive(Clone)]
pub struct ObjectSpec {
    type_name: String,
    base_type: Option<String>,
    is_abstract: bool,
    factory: Factory,
    fields: Vec<FieldSpec>,
}

impl ObjectSpec {
    pub fn new(type_name: impl Into<String>, factory: Factory, fields: Vec<FieldSpec>) -> Self {
        Self {
            type_name: type_name.into(),
            base_type: None,
            is_abstract: false,
            factory,
            fields,
        }
    }

    /// Marks the type as abstract: usable as a base, never instantiated.
    pub fn into_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn with_base(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn base_type(&self) -> Option<&str> {
        self.base_type.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Default-constructed instance of this type, ignoring `is_abstract`.
    pub fn create(&self) -> Instance {
        Instance::new(self.type_name.clone(), (self.factory)())
    }

    /// Checks the field list invariants enforced at registration.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ParseError::invalid_spec(format!(
                    "Duplicate field '{}' in type '{}'",
                    field.name, self.type_name
                )));
            }
            if field.arity == 0 {
                return Err(ParseError::invalid_spec(format!(
                    "Field '{}' in type '{}' has a count of 0",
                    field.name, self.type_name
                )));
            }
            let is_object = matches!(field.value_type, ValueType::Object | ValueType::ObjectList);
            if is_object && (field.arity != 1 || field.is_list) {
                return Err(ParseError::invalid_spec(format!(
                    "Object field '{}' in type '{}' must have a count of 1",
                    field.name, self.type_name
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSpec")
            .field("type_name", &self.type_name)
            .field("base_type", &self.base_type)
            .field("is_abstract", &self.is_abstract)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SpecBuilder
// ============================================================================

/// Accumulates the field list for consumer type `T`
pub struct SpecBuilder<T> {
    fields: Vec<FieldSpec>,
    base_type: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Default for SpecBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> SpecBuilder<T> {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            base_type: None,
            _marker: PhantomData,
        }
    }

    /// Seeds the builder with every field of `base`, reached through the
    /// member of `T` that holds the base data.
    pub fn derived_from<B: 'static>(base: &ObjectSpec, to_base: Accessor<T, B>) -> Self {
        Self {
            fields: base.fields.iter().map(|f| f.project(to_base)).collect(),
            base_type: Some(base.type_name.clone()),
            _marker: PhantomData,
        }
    }

    pub fn add(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Hides the most recently added field from the writer.
    pub fn hidden(mut self) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.hidden = true;
        }
        self
    }

    pub fn add_scalar<V: Scalar>(self, name: &str, acc: Accessor<T, Field<V>>) -> Self {
        let field = name.to_string();
        let store: StoreFn = Arc::new(move |data: &mut dyn Any, values: Vec<Value>| {
            let value = single::<V>(&field, values)?;
            (acc.get_mut)(downcast_mut::<T>(data)?).set(value);
            Ok(())
        });
        let fetch: FetchFn = Arc::new(move |data: &dyn Any| {
            let f = (acc.get)(data.downcast_ref::<T>()?);
            f.was_set().then(|| vec![f.get().clone().into_value()])
        });
        self.add(FieldSpec::new(name, V::VALUE_TYPE, 1, store, fetch))
    }

    pub fn add_bool(self, name: &str, acc: Accessor<T, Field<bool>>) -> Self {
        self.add_scalar(name, acc)
    }

    pub fn add_int(self, name: &str, acc: Accessor<T, Field<i32>>) -> Self {
        self.add_scalar(name, acc)
    }

    pub fn add_uint(self, name: &str, acc: Accessor<T, Field<u32>>) -> Self {
        self.add_scalar(name, acc)
    }

    pub fn add_float(self, name: &str, acc: Accessor<T, Field<f32>>) -> Self {
        self.add_scalar(name, acc)
    }

    pub fn add_string(self, name: &str, acc: Accessor<T, Field<String>>) -> Self {
        self.add_scalar(name, acc)
    }

    /// Fixed-count array written as `N` space-separated scalars.
    pub fn add_array<V: Scalar, const N: usize>(
        self,
        name: &str,
        acc: Accessor<T, Field<[V; N]>>,
    ) -> Self {
        let field = name.to_string();
        let store: StoreFn = Arc::new(move |data: &mut dyn Any, values: Vec<Value>| {
            let got = values.len();
            let array = <[V; N]>::try_from(scalars::<V>(&field, values)?).map_err(|_| {
                ParseError::conversion(format!(
                    "Expected {N} values for field '{field}', got {got}"
                ))
            })?;
            (acc.get_mut)(downcast_mut::<T>(data)?).set(array);
            Ok(())
        });
        let fetch: FetchFn = Arc::new(move |data: &dyn Any| {
            let f = (acc.get)(data.downcast_ref::<T>()?);
            f.was_set()
                .then(|| f.get().iter().cloned().map(Scalar::into_value).collect())
        });
        self.add(FieldSpec::new(name, V::VALUE_TYPE, N, store, fetch))
    }

    /// Variable-length scalar list written as `[a, b, c]`.
    pub fn add_list<V: Scalar>(self, name: &str, acc: Accessor<T, Field<Vec<V>>>) -> Self {
        let field = name.to_string();
        let store: StoreFn = Arc::new(move |data: &mut dyn Any, values: Vec<Value>| {
            let list = scalars::<V>(&field, values)?;
            (acc.get_mut)(downcast_mut::<T>(data)?).set(list);
            Ok(())
        });
        let fetch: FetchFn = Arc::new(move |data: &dyn Any| {
            let f = (acc.get)(data.downcast_ref::<T>()?);
            f.was_set()
                .then(|| f.get().iter().cloned().map(Scalar::into_value).collect())
        });
        let mut spec = FieldSpec::new(name, V::VALUE_TYPE, 1, store, fetch);
        spec.is_list = true;
        self.add(spec)
    }

    /// String-backed enum, looked up by variant name.
    pub fn add_enum<E>(self, name: &str, acc: Accessor<T, Field<E>>) -> Self
    where
        E: FromStr + AsRef<str> + 'static,
    {
        let field = name.to_string();
        let store: StoreFn = Arc::new(move |data: &mut dyn Any, values: Vec<Value>| {
            let text = single::<String>(&field, values)?;
            let value = coder::decode_enum::<E>(&text)?;
            (acc.get_mut)(downcast_mut::<T>(data)?).set(value);
            Ok(())
        });
        let fetch: FetchFn = Arc::new(move |data: &dyn Any| {
            let f = (acc.get)(data.downcast_ref::<T>()?);
            f.was_set()
                .then(|| vec![Value::String(f.get().as_ref().to_string())])
        });
        self.add(FieldSpec::new(name, ValueType::String, 1, store, fetch))
    }

    /// String-backed bitset: flag names joined with `|`.
    pub fn add_flags<F: Flags + 'static>(self, name: &str, acc: Accessor<T, Field<F>>) -> Self {
        let field = name.to_string();
        let store: StoreFn = Arc::new(move |data: &mut dyn Any, values: Vec<Value>| {
            let text = single::<String>(&field, values)?;
            let value = coder::decode_flags::<F>(&text)?;
            (acc.get_mut)(downcast_mut::<T>(data)?).set(value);
            Ok(())
        });
        let fetch: FetchFn = Arc::new(move |data: &dyn Any| {
            let f = (acc.get)(data.downcast_ref::<T>()?);
            f.was_set()
                .then(|| vec![Value::String(coder::encode_flags(f.get()))])
        });
        self.add(FieldSpec::new(name, ValueType::String, 1, store, fetch))
    }

    /// Single nested object, optionally restricted to `object_type` and
    /// the types derived from it.
    pub fn add_object(
        self,
        name: &str,
        object_type: Option<&str>,
        acc: Accessor<T, Field<Option<InstanceRef>>>,
    ) -> Self {
        let field = name.to_string();
        let store: StoreFn = Arc::new(move |data: &mut dyn Any, values: Vec<Value>| {
            let mut values = values.into_iter();
            match (values.next(), values.next()) {
                (Some(Value::Object(obj)), None) => {
                    (acc.get_mut)(downcast_mut::<T>(data)?).set(Some(obj));
                    Ok(())
                }
                _ => Err(ParseError::conversion(format!(
                    "Expected one object for field '{field}'"
                ))),
            }
        });
        let fetch: FetchFn = Arc::new(move |data: &dyn Any| {
            let f = (acc.get)(data.downcast_ref::<T>()?);
            match f.get() {
                Some(obj) if f.was_set() => Some(vec![Value::Object(obj.clone())]),
                _ => None,
            }
        });
        let mut spec = FieldSpec::new(name, ValueType::Object, 1, store, fetch);
        spec.object_type = object_type.map(str::to_string);
        self.add(spec)
    }

    pub fn add_object_list(
        self,
        name: &str,
        object_type: Option<&str>,
        acc: Accessor<T, Field<Vec<InstanceRef>>>,
    ) -> Self {
        let field = name.to_string();
        let store: StoreFn = Arc::new(move |data: &mut dyn Any, values: Vec<Value>| {
            let mut values = values.into_iter();
            match (values.next(), values.next()) {
                (Some(Value::ObjectList(list)), None) => {
                    (acc.get_mut)(downcast_mut::<T>(data)?).set(list);
                    Ok(())
                }
                _ => Err(ParseError::conversion(format!(
                    "Expected an object list for field '{field}'"
                ))),
            }
        });
        let fetch: FetchFn = Arc::new(move |data: &dyn Any| {
            let f = (acc.get)(data.downcast_ref::<T>()?);
            f.was_set().then(|| vec![Value::ObjectList(f.get().clone())])
        });
        let mut spec = FieldSpec::new(name, ValueType::ObjectList, 1, store, fetch);
        spec.object_type = object_type.map(str::to_string);
        self.add(spec)
    }

    pub fn build_fields(self) -> Vec<FieldSpec> {
        self.fields
    }
}

impl<T: Default + 'static> SpecBuilder<T> {
    /// Finishes the spec with a factory producing `T::default()`.
    pub fn build(self, type_name: &str) -> ObjectSpec {
        let factory: Factory = Arc::new(|| Box::new(T::default()) as Box<dyn Any>);
        let mut spec = ObjectSpec::new(type_name, factory, self.fields);
        spec.base_type = self.base_type;
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use strum::{AsRefStr, EnumString};

    #[derive(Clone, Copy, Debug, Default, PartialEq, EnumString, AsRefStr)]
    enum Shade {
        #[default]
        Light,
        Dark,
    }

    #[derive(Default)]
    struct Base {
        count: Field<i32>,
        shade: Field<Shade>,
    }

    #[derive(Default)]
    struct Wide {
        base: Base,
        size: Field<[f32; 2]>,
        tags: Field<Vec<String>>,
    }

    fn base_spec() -> ObjectSpec {
        SpecBuilder::<Base>::new()
            .add_int("count", field!(Base, count))
            .add_enum("shade", field!(Base, shade))
            .build("Base")
    }

    fn wide_spec() -> ObjectSpec {
        SpecBuilder::<Wide>::derived_from(&base_spec(), field!(Wide, base))
            .add_array("size", field!(Wide, size))
            .add_list("tags", field!(Wide, tags))
            .hidden()
            .build("Wide")
    }

    #[test]
    fn test_field_order_is_base_first() {
        let spec = wide_spec();
        let names: Vec<&str> = spec.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["count", "shade", "size", "tags"]);
        assert_eq!(spec.base_type(), Some("Base"));
        assert!(spec.find_field("tags").unwrap().is_hidden());
        assert!(spec.find_field("tags").unwrap().is_list());
        assert_eq!(spec.find_field("size").unwrap().arity(), 2);
    }

    #[test]
    fn test_store_through_base_projection() {
        let spec = wide_spec();
        let mut inst = spec.create();
        let count = spec.find_field("count").unwrap();
        assert!(count.fetch(&inst).is_none());
        count.store(&mut inst, vec![Value::Int(5)]).unwrap();
        spec.find_field("shade")
            .unwrap()
            .store(&mut inst, vec![Value::String("Dark".into())])
            .unwrap();

        let wide = inst.data::<Wide>().unwrap();
        assert_eq!(*wide.base.count, 5);
        assert_eq!(*wide.base.shade, Shade::Dark);
        assert!(!wide.size.was_set());

        let fetched = count.fetch(&inst).unwrap();
        assert!(matches!(fetched.as_slice(), [Value::Int(5)]));
    }

    #[test]
    fn test_array_count_mismatch() {
        let spec = wide_spec();
        let mut inst = spec.create();
        let err = spec
            .find_field("size")
            .unwrap()
            .store(&mut inst, vec![Value::Float(1.0)])
            .unwrap_err();
        assert!(err.is(ErrorKind::ValueConversion));
        assert!(err.message.contains("Expected 2 values"));
    }

    #[test]
    fn test_bad_enum_value() {
        let spec = base_spec();
        let mut inst = spec.create();
        let err = spec
            .find_field("shade")
            .unwrap()
            .store(&mut inst, vec![Value::String("glorp".into())])
            .unwrap_err();
        assert!(err.message.contains("Invalid value for enum"));
    }

    #[test]
    fn test_validate_rejects_duplicate_field() {
        let fields = SpecBuilder::<Base>::new()
            .add_int("count", field!(Base, count))
            .add_int("count", field!(Base, count))
            .build_fields();
        let factory: Factory = Arc::new(|| Box::new(Base::default()) as Box<dyn Any>);
        let spec = ObjectSpec::new("Dup", factory, fields);
        let err = spec.validate().unwrap_err();
        assert!(err.is(ErrorKind::InvalidSpec));
        assert!(err.message.contains("Duplicate field"));
    }
}
