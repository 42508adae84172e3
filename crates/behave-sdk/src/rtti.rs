//! Polymorphic cast capability
//!
//! Rust has no inheritance, so an "is-a" relation between two reflected
//! types is expressed as a projection from the derived value to the part of
//! it that acts as the base (an embedded field, a `Deref` target, ...).
//! An [`RttiHelper`] collects these projections for one concrete type.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::types::TypeKey;

/// Type-erased projection from one type to another
pub trait Cast {
    /// Type produced by the projection
    fn target(&self) -> TypeKey;

    /// Project a shared view
    fn cast<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any>;

    /// Project an exclusive view
    fn cast_mut<'a>(&self, value: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

/// Projection built from a pair of accessor functions
struct FieldCast<D, B> {
    get: fn(&D) -> &B,
    get_mut: fn(&mut D) -> &mut B,
}

impl<D: Any, B: Any> Cast for FieldCast<D, B> {
    fn target(&self) -> TypeKey {
        TypeKey::of::<B>()
    }

    fn cast<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        let derived = value.downcast_ref::<D>()?;
        Some((self.get)(derived) as &dyn Any)
    }

    fn cast_mut<'a>(&self, value: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let derived = value.downcast_mut::<D>()?;
        Some((self.get_mut)(derived) as &mut dyn Any)
    }
}

/// Shared handle to a projection
#[derive(Clone)]
pub struct Projection(Rc<dyn Cast>);

impl Projection {
    /// Projection from `D` to `B` through accessor functions
    pub fn new<D: Any, B: Any>(get: fn(&D) -> &B, get_mut: fn(&mut D) -> &mut B) -> Self {
        Projection(Rc::new(FieldCast { get, get_mut }))
    }

    /// Projection from a custom [`Cast`] implementation
    pub fn from_cast(cast: Rc<dyn Cast>) -> Self {
        Projection(cast)
    }

    /// Target type
    pub fn target(&self) -> TypeKey {
        self.0.target()
    }

    /// Apply to a shared view
    pub fn apply<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        self.0.cast(value)
    }

    /// Apply to an exclusive view
    pub fn apply_mut<'a>(&self, value: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.0.cast_mut(value)
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Projection(-> {})", self.target())
    }
}

struct RttiTable {
    type_key: TypeKey,
    /// Ordered ancestors, nearest first
    upcasts: Vec<Projection>,
}

/// Cast table of one concrete type
#[derive(Clone)]
pub struct RttiHelper(Rc<RttiTable>);

impl RttiHelper {
    /// Start building the table of `T`
    pub fn builder<T: Any>() -> RttiBuilder<T> {
        RttiBuilder {
            upcasts: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Table of a type with no ancestors
    pub fn leaf<T: Any>() -> Self {
        Self::builder::<T>().build()
    }

    /// Concrete type described by this table
    pub fn type_key(&self) -> TypeKey {
        self.0.type_key
    }

    /// Ancestor types, nearest first (excluding the type itself)
    pub fn ancestors(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.0.upcasts.iter().map(|p| p.target())
    }

    /// Check whether the concrete type is, or derives from, `target`
    pub fn is_type_of(&self, target: TypeKey) -> bool {
        self.0.type_key == target || self.ancestors().any(|a| a == target)
    }

    /// Projection from the concrete type to `target`, if one is registered
    pub fn upcast_to(&self, target: TypeKey) -> Option<&Projection> {
        self.0.upcasts.iter().find(|p| p.target() == target)
    }
}

impl fmt::Debug for RttiHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RttiHelper")
            .field("type_key", &self.0.type_key)
            .field("ancestors", &self.ancestors().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`RttiHelper`]
pub struct RttiBuilder<T> {
    upcasts: Vec<Projection>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any> RttiBuilder<T> {
    /// Declare `B` as an ancestor reachable through the given accessors
    pub fn base<B: Any>(mut self, get: fn(&T) -> &B, get_mut: fn(&mut T) -> &mut B) -> Self {
        self.upcasts.push(Projection::new(get, get_mut));
        self
    }

    /// Finish the table
    pub fn build(self) -> RttiHelper {
        RttiHelper(Rc::new(RttiTable {
            type_key: TypeKey::of::<T>(),
            upcasts: self.upcasts,
        }))
    }
}

/// Types that describe their own ancestry
pub trait Rtti: Any {
    /// Cast table of this type
    fn rtti() -> RttiHelper;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base {
        hp: i32,
    }

    struct Derived {
        base: Base,
        #[allow(dead_code)]
        extra: u8,
    }

    fn derived_rtti() -> RttiHelper {
        RttiHelper::builder::<Derived>()
            .base::<Base>(|d| &d.base, |d| &mut d.base)
            .build()
    }

    #[test]
    fn test_ancestors() {
        let rtti = derived_rtti();
        assert_eq!(rtti.type_key(), TypeKey::of::<Derived>());
        assert_eq!(rtti.ancestors().collect::<Vec<_>>(), vec![TypeKey::of::<Base>()]);
        assert!(rtti.is_type_of(TypeKey::of::<Base>()));
        assert!(rtti.is_type_of(TypeKey::of::<Derived>()));
        assert!(!rtti.is_type_of(TypeKey::of::<i32>()));
    }

    #[test]
    fn test_upcast_projection() {
        let rtti = derived_rtti();
        let mut d = Derived {
            base: Base { hp: 7 },
            extra: 1,
        };
        let cast = rtti.upcast_to(TypeKey::of::<Base>()).unwrap();

        let base = cast.apply(&d).unwrap().downcast_ref::<Base>().unwrap();
        assert_eq!(base.hp, 7);

        let base = cast.apply_mut(&mut d).unwrap().downcast_mut::<Base>().unwrap();
        base.hp = 9;
        assert_eq!(d.base.hp, 9);

        // Projections only accept their source type
        assert!(cast.apply(&5i32).is_none());
    }
}
