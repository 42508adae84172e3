//! Type identity, trait bits and parameter shapes
//!
//! A [`Parameter`] describes one slot of a reflected signature: the return
//! value, the receiver, or a positional argument. It never holds a value;
//! live values travel in [`crate::Value`] cells.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::rtti::RttiHelper;

// ============================================================================
// TypeKey
// ============================================================================

/// Stable identifier of a native type.
///
/// Equality and hashing only consider the underlying [`TypeId`]; the name is
/// kept for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of `T`
    #[inline]
    pub fn of<T: ?Sized + Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The void / unresolved type
    #[inline]
    pub fn void() -> Self {
        Self::of::<()>()
    }

    /// Check if this is the void type
    #[inline]
    pub fn is_void(&self) -> bool {
        self.id == TypeId::of::<()>()
    }

    /// Underlying Rust type id
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full Rust type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module path (`glam::Vec3` -> `Vec3`)
    pub fn short_name(&self) -> &'static str {
        // Generic arguments may contain paths too; only strip the outer one.
        let outer = self.name.split('<').next().unwrap_or(self.name);
        match outer.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Default for TypeKey {
    fn default() -> Self {
        Self::void()
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// Traits
// ============================================================================

bitflags::bitflags! {
    /// Indirection shape and semantic role of a value slot
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Traits: u32 {
        /// Slot holds a nullable pointer to the value
        const POINTER = 1 << 0;
        /// Value must not be modified through this slot
        const CONST = 1 << 1;
        /// Slot aliases caller storage
        const REFERENCE = 1 << 2;
        /// Slot is the receiver of a member call
        const THIS_PTR = 1 << 3;
        /// Value is a string
        const STRING = 1 << 4;
        /// Slot marks the beginning of an array range
        const ARRAY_BEGIN = 1 << 5;
        /// Slot marks the end of an array range
        const ARRAY_END = 1 << 6;
        /// Slot carries an array size
        const ARRAY_SIZE = 1 << 7;
        /// Slot is an index into a collection
        const COLLECTION_INDEX = 1 << 8;
    }
}

impl Default for Traits {
    fn default() -> Self {
        Traits::empty()
    }
}

impl Traits {
    /// Check if the slot does not own a value of its own
    #[inline]
    pub fn is_indirect(&self) -> bool {
        self.intersects(Traits::POINTER | Traits::REFERENCE)
    }
}

// ============================================================================
// Parameter
// ============================================================================

/// Shape of one signature slot
#[derive(Clone, Default)]
pub struct Parameter {
    /// Diagnostic name
    pub name: String,
    /// Optional tooltip for tools
    pub tooltip: Option<String>,
    /// Type of the slot
    pub type_key: TypeKey,
    /// Shape bits
    pub traits: Traits,
    /// Cast capability for the slot type
    pub rtti: Option<RttiHelper>,
}

impl Parameter {
    /// Value-shaped parameter of type `T`
    pub fn of<T: ?Sized + Any>() -> Self {
        Self {
            name: String::new(),
            tooltip: None,
            type_key: TypeKey::of::<T>(),
            traits: Traits::empty(),
            rtti: None,
        }
    }

    /// The void return slot
    pub fn void() -> Self {
        Self::of::<()>()
    }

    /// Builder-style name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder-style extra traits
    pub fn with_traits(mut self, traits: Traits) -> Self {
        self.traits |= traits;
        self
    }

    /// Builder-style RTTI helper
    pub fn with_rtti(mut self, rtti: RttiHelper) -> Self {
        self.rtti = Some(rtti);
        self
    }

    /// Check if this slot is void
    pub fn is_void(&self) -> bool {
        self.type_key.is_void() && !self.traits.is_indirect()
    }

    /// Check if this slot is a receiver
    pub fn is_this(&self) -> bool {
        self.traits.contains(Traits::THIS_PTR)
    }

    /// Check if this slot is pointer-shaped
    pub fn is_pointer(&self) -> bool {
        self.traits.contains(Traits::POINTER)
    }

    /// Check if this slot is reference-shaped
    pub fn is_reference(&self) -> bool {
        self.traits.contains(Traits::REFERENCE)
    }

    /// Human readable signature fragment, e.g. `amount: i32`
    pub fn describe(&self) -> String {
        let mut ty = String::new();
        if self.is_reference() {
            ty.push('&');
        }
        ty.push_str(self.type_key.short_name());
        if self.is_pointer() {
            ty = format!("Option<{}>", ty);
        }
        if self.name.is_empty() {
            ty
        } else {
            format!("{}: {}", self.name, ty)
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("type_key", &self.type_key)
            .field("traits", &self.traits)
            .field("rtti", &self.rtti.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn test_type_key_identity() {
        assert_eq!(TypeKey::of::<i32>(), TypeKey::of::<i32>());
        assert_ne!(TypeKey::of::<i32>(), TypeKey::of::<i64>());
        assert!(TypeKey::void().is_void());
        assert!(!TypeKey::of::<Marker>().is_void());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeKey::of::<Marker>().short_name(), "Marker");
        assert_eq!(TypeKey::of::<i32>().short_name(), "i32");
    }

    #[test]
    fn test_parameter_describe() {
        let p = Parameter::of::<i32>().named("amount");
        assert_eq!(p.describe(), "amount: i32");

        let p = Parameter::of::<i32>().with_traits(Traits::POINTER);
        assert_eq!(p.describe(), "Option<i32>");
        assert!(p.is_pointer());
        assert!(!p.is_void());
    }
}
