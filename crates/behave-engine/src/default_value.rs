//! Default argument values
//!
//! A [`DefaultValue`] is an immutable, shared box around one value of a
//! registration-time type. Cloning a `DefaultValue` shares the box, so one
//! default can back several method registrations.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use behave_sdk::{IntoValue, Parameter, TypeKey, Value};

struct DefaultValueInner {
    parameter: Parameter,
    value: Box<dyn Any>,
    make_cell: fn(&dyn Any) -> Value,
}

/// Shared default for one optional argument
#[derive(Clone)]
pub struct DefaultValue(Rc<DefaultValueInner>);

fn make_cell<T: IntoValue + Clone>(value: &dyn Any) -> Value {
    match value.downcast_ref::<T>() {
        Some(value) => Value::new(value.clone()),
        None => Value::empty(),
    }
}

impl DefaultValue {
    /// Box a default value
    pub fn new<T: IntoValue + Clone>(value: T) -> Self {
        DefaultValue(Rc::new(DefaultValueInner {
            parameter: T::parameter(),
            value: Box::new(value),
            make_cell: make_cell::<T>,
        }))
    }

    /// Shape of the stored value
    pub fn parameter(&self) -> &Parameter {
        &self.0.parameter
    }

    /// Type of the stored value
    pub fn type_key(&self) -> TypeKey {
        self.0.parameter.type_key
    }

    /// Borrow the stored value
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.value.downcast_ref::<T>()
    }

    /// Fresh argument cell holding a copy of the value
    pub fn to_value(&self) -> Value {
        (self.0.make_cell)(&*self.0.value)
    }

    /// Number of registrations sharing this default
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Check if both handles share the same box
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultValue")
            .field("type_key", &self.type_key())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Ordered defaults for the trailing optional arguments of a method.
///
/// Index 0 is the first optional argument; the set always lines up with the
/// end of the argument list.
#[derive(Debug, Clone, Default)]
pub struct DefaultValueSet {
    values: Vec<DefaultValue>,
}

impl DefaultValueSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append
    pub fn with<T: IntoValue + Clone>(mut self, value: T) -> Self {
        self.values.push(DefaultValue::new(value));
        self
    }

    /// Builder-style append of an existing (shared) default
    pub fn with_shared(mut self, value: DefaultValue) -> Self {
        self.values.push(value);
        self
    }

    /// Default for the `index`-th optional argument, `None` past the end
    pub fn get_default(&self, index: usize) -> Option<&DefaultValue> {
        self.values.get(index)
    }

    /// Number of optional arguments covered
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in argument order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &DefaultValue> + ExactSizeIterator {
        self.values.iter()
    }
}

impl From<Vec<DefaultValue>> for DefaultValueSet {
    fn from(values: Vec<DefaultValue>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_value_copies() {
        let default = DefaultValue::new(10i32);
        let mut cell = default.to_value();
        assert_eq!(cell.extract::<i32>(), Ok(10));

        assert!(cell.store_result(3i32));
        assert_eq!(default.get::<i32>(), Some(&10));
        assert_eq!(default.to_value().extract::<i32>(), Ok(10));
    }

    #[test]
    fn test_shared_between_registrations() {
        let default = DefaultValue::new(String::from("none"));
        let a = DefaultValueSet::new().with_shared(default.clone());
        let b = DefaultValueSet::new().with_shared(default.clone());
        assert_eq!(default.ref_count(), 3);
        assert!(a.get_default(0).unwrap().ptr_eq(b.get_default(0).unwrap()));
    }

    #[test]
    fn test_get_default_out_of_range() {
        let set = DefaultValueSet::new().with(1u8).with(2.5f32);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_default(1).unwrap().type_key(), TypeKey::of::<f32>());
        assert!(set.get_default(2).is_none());
    }
}
