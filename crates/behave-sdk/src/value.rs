//! Value: the type-erased argument / result cell
//!
//! A `Value` carries one call-site argument or result. It is tagged with a
//! [`TypeKey`] and [`Traits`] bits, may carry an [`RttiHelper`] for upcasts,
//! and stores its payload in one of three ways:
//!
//! ```text
//! Empty   no payload (null pointer / unresolved result)
//! Inline  the cell owns the value (scratch storage)
//! Bound   the cell aliases caller storage (`Shared<T>`)
//! ```
//!
//! Conversions never touch the payload: an upcast records a [`Projection`]
//! in the cell's own view chain, so the caller's storage is left as it was.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::convert::Typed;
use crate::error::AccessError;
use crate::rtti::{Projection, RttiHelper};
use crate::types::{Parameter, TypeKey, Traits};

// ============================================================================
// Shared
// ============================================================================

/// Shared, interior-mutable storage that cells can alias.
pub struct Shared<T: ?Sized>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    /// Wrap a value
    pub fn new(value: T) -> Self {
        Shared(Rc::new(RefCell::new(value)))
    }
}

impl<T: ?Sized> Shared<T> {
    /// Wrap an existing cell
    pub fn from_rc(rc: Rc<RefCell<T>>) -> Self {
        Shared(rc)
    }

    /// Immutable borrow
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutable borrow
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Underlying cell
    pub fn as_rc(&self) -> &Rc<RefCell<T>> {
        &self.0
    }

    /// Check if both handles alias the same storage
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> Shared<T> {
    /// Clone the stored value out
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Rc::clone(&self.0))
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(v) => f.debug_tuple("Shared").field(&&*v).finish(),
            Err(_) => f.write_str("Shared(<borrowed>)"),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Type-erased view of a `RefCell<T>`
trait Slot: Any {
    fn try_borrow_any(&self) -> Option<Ref<'_, dyn Any>>;
    fn try_borrow_any_mut(&self) -> Option<RefMut<'_, dyn Any>>;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> Slot for RefCell<T> {
    fn try_borrow_any(&self) -> Option<Ref<'_, dyn Any>> {
        let r = self.try_borrow().ok()?;
        Some(Ref::map(r, |v| v as &dyn Any))
    }

    fn try_borrow_any_mut(&self) -> Option<RefMut<'_, dyn Any>> {
        let r = self.try_borrow_mut().ok()?;
        Some(RefMut::map(r, |v| v as &mut dyn Any))
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[derive(Clone)]
struct Handle(Rc<dyn Slot>);

impl Handle {
    fn new<T: Any>(value: T) -> Self {
        Handle(Rc::new(RefCell::new(value)))
    }

    fn from_shared<T: Any>(shared: &Shared<T>) -> Self {
        let rc: Rc<RefCell<T>> = Rc::clone(&shared.0);
        Handle(rc)
    }
}

enum Storage {
    Empty,
    Inline(Box<dyn Any>),
    Bound(Handle),
}

fn project<'a>(view: &[Projection], mut value: &'a dyn Any) -> Option<&'a dyn Any> {
    for step in view {
        value = step.apply(value)?;
    }
    Some(value)
}

fn project_mut<'a>(view: &[Projection], mut value: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
    for step in view {
        value = step.apply_mut(value)?;
    }
    Some(value)
}

/// Callback fired after a result was stored into a cell
pub type OnAssigned = Rc<dyn Fn(&mut Value)>;

// ============================================================================
// Value
// ============================================================================

/// A live argument or result cell.
///
/// Cells are created per call and never outlive it; parameter shapes live in
/// [`Parameter`].
pub struct Value {
    name: Option<String>,
    type_key: TypeKey,
    traits: Traits,
    rtti: Option<RttiHelper>,
    storage: Storage,
    view: Vec<Projection>,
    on_assigned: Option<OnAssigned>,
}

impl Default for Value {
    fn default() -> Self {
        Self::empty()
    }
}

impl Value {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Untyped empty cell (void result slot)
    pub fn empty() -> Self {
        Value {
            name: None,
            type_key: TypeKey::void(),
            traits: Traits::empty(),
            rtti: None,
            storage: Storage::Empty,
            view: Vec::new(),
            on_assigned: None,
        }
    }

    /// Empty cell shaped like `parameter` (a result slot for that type)
    pub fn for_parameter(parameter: &Parameter) -> Self {
        Value {
            name: None,
            type_key: parameter.type_key,
            traits: parameter.traits & (Traits::POINTER | Traits::REFERENCE | Traits::CONST | Traits::STRING),
            rtti: parameter.rtti.clone(),
            storage: Storage::Empty,
            view: Vec::new(),
            on_assigned: None,
        }
    }

    /// Cell owning `value`
    pub fn boxed<T: Any>(value: T) -> Self {
        Value {
            type_key: TypeKey::of::<T>(),
            storage: Storage::Inline(Box::new(value)),
            ..Self::empty()
        }
    }

    /// Typed empty result slot, value-shaped
    pub fn result<T: Any>() -> Self {
        Value {
            type_key: TypeKey::of::<T>(),
            ..Self::empty()
        }
    }

    /// Value-shaped cell bound to caller storage; results are copied into it.
    ///
    /// No cast table is attached; use [`Value::bind_typed`] for types that
    /// declare one.
    pub fn bind<T: Any>(shared: &Shared<T>) -> Self {
        let mut value = Self::empty();
        value.set_from(shared);
        value
    }

    /// Like [`Value::bind`], carrying the cast table of `T`
    pub fn bind_typed<T: Typed>(shared: &Shared<T>) -> Self {
        Self::bind(shared).adopt_rtti::<T>()
    }

    /// Reference-shaped cell aliasing caller storage
    pub fn reference<T: Typed>(shared: &Shared<T>) -> Self {
        Self::bind_typed(shared).with_traits(Traits::REFERENCE)
    }

    /// Pointer-shaped cell; `None` is a null pointer of type `T`
    pub fn pointer<T: Typed>(shared: Option<&Shared<T>>) -> Self {
        let value = match shared {
            Some(shared) => Self::bind(shared),
            None => Self::result::<T>(),
        };
        value.adopt_rtti::<T>().with_traits(Traits::POINTER)
    }

    /// Attach a diagnostic name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add trait bits
    pub fn with_traits(mut self, traits: Traits) -> Self {
        self.traits |= traits;
        self
    }

    /// Attach a cast table describing the stored type
    pub fn with_rtti(mut self, rtti: RttiHelper) -> Self {
        self.rtti = Some(rtti);
        self
    }

    fn adopt_rtti<T: Typed>(mut self) -> Self {
        self.attach_rtti_of::<T>();
        self
    }

    /// Attach the cast table of `T` unless the cell already has one
    pub(crate) fn attach_rtti_of<T: Typed>(&mut self) {
        if self.rtti.is_none() && self.type_key == TypeKey::of::<T>() {
            self.rtti = T::parameter().rtti;
        }
    }

    /// Register a callback fired after every successful store
    pub fn on_assigned(mut self, callback: impl Fn(&mut Value) + 'static) -> Self {
        self.on_assigned = Some(Rc::new(callback));
        self
    }

    /// Bind to external storage without copying; ownership stays with the caller
    pub fn set_from<T: Any>(&mut self, shared: &Shared<T>) {
        self.type_key = TypeKey::of::<T>();
        self.storage = Storage::Bound(Handle::from_shared(shared));
        self.view.clear();
        if self.rtti.as_ref().is_some_and(|r| r.type_key() != self.type_key) {
            self.rtti = None;
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Diagnostic name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current type
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Shape bits
    pub fn traits(&self) -> Traits {
        self.traits
    }

    /// Cast table, if any
    pub fn rtti(&self) -> Option<&RttiHelper> {
        self.rtti.as_ref()
    }

    /// Check if the cell holds no payload
    pub fn is_null(&self) -> bool {
        matches!(self.storage, Storage::Empty)
    }

    /// Check if the cell aliases caller storage
    pub fn is_bound(&self) -> bool {
        matches!(self.storage, Storage::Bound(_))
    }

    /// Check if a conversion left a projection in the cell
    pub fn is_projected(&self) -> bool {
        !self.view.is_empty()
    }

    /// Run `f` on a shared view of the payload
    pub fn try_with_ref<R>(&self, f: impl FnOnce(&dyn Any) -> R) -> Result<R, AccessError> {
        match &self.storage {
            Storage::Empty => Err(AccessError::Null),
            Storage::Inline(value) => {
                let target = project(&self.view, &**value).ok_or(AccessError::Projection)?;
                Ok(f(target))
            }
            Storage::Bound(handle) => {
                let guard = handle.0.try_borrow_any().ok_or(AccessError::Borrowed)?;
                let target = project(&self.view, &*guard).ok_or(AccessError::Projection)?;
                Ok(f(target))
            }
        }
    }

    /// Run `f` on an exclusive view of the payload
    pub fn try_with_mut<R>(&mut self, f: impl FnOnce(&mut dyn Any) -> R) -> Result<R, AccessError> {
        if self.traits.contains(Traits::CONST) {
            return Err(AccessError::Const);
        }
        let Value { storage, view, .. } = self;
        match storage {
            Storage::Empty => Err(AccessError::Null),
            Storage::Inline(value) => {
                let target = project_mut(view, &mut **value).ok_or(AccessError::Projection)?;
                Ok(f(target))
            }
            Storage::Bound(handle) => {
                let mut guard = handle.0.try_borrow_any_mut().ok_or(AccessError::Borrowed)?;
                let target = project_mut(view, &mut *guard).ok_or(AccessError::Projection)?;
                Ok(f(target))
            }
        }
    }

    /// Shared view, `None` on any access failure
    pub fn with_ref<R>(&self, f: impl FnOnce(&dyn Any) -> R) -> Option<R> {
        self.try_with_ref(f).ok()
    }

    /// Exclusive view, `None` on any access failure
    pub fn with_mut<R>(&mut self, f: impl FnOnce(&mut dyn Any) -> R) -> Option<R> {
        self.try_with_mut(f).ok()
    }

    /// Clone the payload out as `T`
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.with_ref(|v| v.downcast_ref::<T>().cloned()).flatten()
    }

    /// Recover the caller's `Shared<T>` if this cell aliases one directly
    pub fn as_shared<T: Any>(&self) -> Option<Shared<T>> {
        match &self.storage {
            Storage::Bound(handle) if self.view.is_empty() => {
                let any = Rc::clone(&handle.0).into_any();
                any.downcast::<RefCell<T>>().ok().map(Shared)
            }
            _ => None,
        }
    }

    /// Move an owned payload out of the cell
    pub fn take<T: Any>(&mut self) -> Option<T> {
        if !self.view.is_empty() {
            return None;
        }
        match std::mem::replace(&mut self.storage, Storage::Empty) {
            Storage::Inline(value) => match value.downcast::<T>() {
                Ok(value) => Some(*value),
                Err(value) => {
                    self.storage = Storage::Inline(value);
                    None
                }
            },
            other => {
                self.storage = other;
                None
            }
        }
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Make the cell present itself as `target`.
    ///
    /// Matching types succeed without touching the cell. Otherwise the RTTI
    /// helper is asked for an upcast; the projection is recorded in the
    /// cell's view and the payload stays where it is. A null pointer-shaped
    /// cell converts to any type.
    pub fn convert_to(&mut self, target: TypeKey) -> bool {
        if self.type_key == target {
            return true;
        }
        if self.is_null() && self.traits.contains(Traits::POINTER) {
            self.type_key = target;
            return true;
        }
        let Some(rtti) = &self.rtti else {
            return false;
        };
        if rtti.type_key() == target {
            self.view.clear();
            self.type_key = target;
            return true;
        }
        let Some(cast) = rtti.upcast_to(target).cloned() else {
            return false;
        };
        self.view.clear();
        self.view.push(cast);
        self.type_key = target;
        true
    }

    /// Append a projection (used for unwrapping proxy types)
    pub fn push_projection(&mut self, projection: Projection) {
        self.type_key = projection.target();
        self.view.push(projection);
        self.rtti = None;
    }

    // ========================================================================
    // Results
    // ========================================================================

    /// Store a produced value according to the cell's shape.
    ///
    /// - pointer / reference shaped: rebind the cell to the value, no copy
    /// - value shaped: copy-assign into the backing storage
    /// - untyped: adopt the incoming type and take ownership of the value
    ///
    /// Returns false if the cell is typed and the types differ.
    pub fn store_result<T: Any>(&mut self, value: T) -> bool {
        let incoming = TypeKey::of::<T>();
        if self.type_key.is_void() {
            self.type_key = incoming;
            self.view.clear();
            self.rtti = None;
            self.storage = if self.traits.is_indirect() {
                Storage::Bound(Handle::new(value))
            } else {
                Storage::Inline(Box::new(value))
            };
            self.notify_assigned();
            return true;
        }
        if self.type_key != incoming {
            return false;
        }

        if self.traits.is_indirect() {
            self.storage = Storage::Bound(Handle::new(value));
            self.view.clear();
        } else if self.is_null() {
            self.storage = Storage::Inline(Box::new(value));
        } else {
            let mut value = Some(value);
            let stored = self
                .try_with_mut(|slot| match (slot.downcast_mut::<T>(), value.take()) {
                    (Some(slot), Some(value)) => {
                        *slot = value;
                        true
                    }
                    _ => false,
                })
                .unwrap_or(false);
            if !stored {
                return false;
            }
        }
        self.notify_assigned();
        true
    }

    /// Rebind the cell to caller storage produced by a call
    pub fn store_shared<T: Any>(&mut self, shared: Shared<T>) -> bool {
        let incoming = TypeKey::of::<T>();
        if !self.type_key.is_void() && self.type_key != incoming {
            return false;
        }
        self.set_from(&shared);
        self.traits |= Traits::REFERENCE;
        self.notify_assigned();
        true
    }

    /// Store a null pointer
    pub fn store_null(&mut self) -> bool {
        if !self.type_key.is_void() && !self.traits.contains(Traits::POINTER) {
            return false;
        }
        self.traits |= Traits::POINTER;
        self.storage = Storage::Empty;
        self.view.clear();
        self.notify_assigned();
        true
    }

    fn notify_assigned(&mut self) {
        if let Some(callback) = self.on_assigned.clone() {
            callback(self);
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = match &self.storage {
            Storage::Empty => "empty",
            Storage::Inline(_) => "inline",
            Storage::Bound(_) => "bound",
        };
        f.debug_struct("Value")
            .field("name", &self.name)
            .field("type_key", &self.type_key)
            .field("traits", &self.traits)
            .field("storage", &storage)
            .field("projected", &!self.view.is_empty())
            .finish()
    }
}
