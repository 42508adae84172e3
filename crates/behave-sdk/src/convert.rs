//! Traits for moving Rust values in and out of [`Value`] cells.
//!
//! Every type that crosses a reflected call boundary implements [`Typed`]
//! (its parameter shape), [`FromValue`] (argument extraction) and
//! [`IntoValue`] (result storage). The shape decides how the cell behaves:
//!
//! | Rust type   | Shape      | Extraction                    |
//! |-------------|------------|-------------------------------|
//! | `T`         | value      | cloned out of the cell        |
//! | `Option<T>` | pointer    | `None` for a null cell        |
//! | `Shared<T>` | reference  | aliases the caller's storage  |
//! | `()`        | void       | -                             |
//!
//! Plain value types opt in through [`reflect_value!`](crate::reflect_value).
//!
//! # Example
//!
//! ```ignore
//! #[derive(Clone)]
//! struct Vector3 { x: f32, y: f32, z: f32 }
//!
//! behave_sdk::reflect_value!(Vector3);
//!
//! let cell = Value::new(Vector3 { x: 1.0, y: 2.0, z: 3.0 });
//! ```

use std::any::Any;

use crate::error::AccessError;
use crate::types::{Parameter, Traits};
use crate::value::{Shared, Value};

/// Types with a known parameter shape
pub trait Typed: 'static {
    /// Shape of a parameter of this type
    fn parameter() -> Parameter;
}

/// Extract an argument from a cell
pub trait FromValue: Typed + Sized {
    /// Read the cell's payload (after any conversion the cell went through)
    fn from_value(value: &Value) -> Result<Self, AccessError>;
}

/// Store a result into a cell
pub trait IntoValue: Typed {
    /// Store `self` following the cell's shape. Returns false on mismatch.
    fn into_value(self, slot: &mut Value) -> bool;
}

impl Value {
    /// Cell holding `value`, shaped after `T`
    pub fn new<T: IntoValue>(value: T) -> Self {
        let mut cell = Value::for_parameter(&T::parameter());
        // A fresh cell of the same shape always accepts the value.
        let stored = value.into_value(&mut cell);
        debug_assert!(stored);
        cell
    }

    /// Extract the payload as `T`
    pub fn extract<T: FromValue>(&self) -> Result<T, AccessError> {
        T::from_value(self)
    }
}

/// Clone a `T` out of a cell
pub fn clone_from_value<T: Any + Clone>(value: &Value) -> Result<T, AccessError> {
    value
        .try_with_ref(|any| any.downcast_ref::<T>().cloned())?
        .ok_or(AccessError::TypeMismatch)
}

/// Implement [`Typed`], [`FromValue`] and [`IntoValue`] for value types.
///
/// Types must be `Clone + 'static`. Prefix the list with `@rtti` for types
/// that implement [`Rtti`](crate::Rtti) so their cells can be upcast.
///
/// ```ignore
/// reflect_value!(Vector3, Color);
/// reflect_value!(@rtti Player);
/// ```
#[macro_export]
macro_rules! reflect_value {
    (@impl $ty:ty, $param:expr) => {
        impl $crate::Typed for $ty {
            fn parameter() -> $crate::Parameter {
                $param
            }
        }

        impl $crate::FromValue for $ty {
            fn from_value(value: &$crate::Value) -> ::std::result::Result<Self, $crate::AccessError> {
                $crate::convert::clone_from_value::<$ty>(value)
            }
        }

        impl $crate::IntoValue for $ty {
            fn into_value(self, slot: &mut $crate::Value) -> bool {
                slot.store_result(self)
            }
        }
    };
    (@rtti $($ty:ty),+ $(,)?) => {
        $(
            $crate::reflect_value!(@impl $ty,
                $crate::Parameter::of::<$ty>().with_rtti(<$ty as $crate::Rtti>::rtti()));
        )+
    };
    ($($ty:ty),+ $(,)?) => {
        $(
            $crate::reflect_value!(@impl $ty, $crate::Parameter::of::<$ty>());
        )+
    };
}

reflect_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, char);

impl Typed for String {
    fn parameter() -> Parameter {
        Parameter::of::<String>().with_traits(Traits::STRING)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, AccessError> {
        clone_from_value::<String>(value)
    }
}

impl IntoValue for String {
    fn into_value(self, slot: &mut Value) -> bool {
        slot.store_result(self)
    }
}

impl Typed for () {
    fn parameter() -> Parameter {
        Parameter::void()
    }
}

impl FromValue for () {
    fn from_value(_value: &Value) -> Result<Self, AccessError> {
        Ok(())
    }
}

impl IntoValue for () {
    fn into_value(self, _slot: &mut Value) -> bool {
        true
    }
}

// Pointer shape

impl<T: Typed> Typed for Option<T> {
    fn parameter() -> Parameter {
        T::parameter().with_traits(Traits::POINTER)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, AccessError> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self, slot: &mut Value) -> bool {
        match self {
            Some(value) => value.into_value(slot),
            None => slot.store_null(),
        }
    }
}

// Reference shape

impl<T: Typed> Typed for Shared<T> {
    fn parameter() -> Parameter {
        T::parameter().with_traits(Traits::REFERENCE)
    }
}

impl<T: Typed> FromValue for Shared<T> {
    fn from_value(value: &Value) -> Result<Self, AccessError> {
        if value.is_null() {
            return Err(AccessError::Null);
        }
        value.as_shared::<T>().ok_or(AccessError::TypeMismatch)
    }
}

impl<T: Typed> IntoValue for Shared<T> {
    fn into_value(self, slot: &mut Value) -> bool {
        if !slot.store_shared(self) {
            return false;
        }
        slot.attach_rtti_of::<T>();
        true
    }
}
