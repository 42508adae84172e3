//! Class Registry
//!
//! A [`BehaviorClass`] describes one native type: its lifecycle hooks, its
//! ancestors (captured once from the type's RTTI table), constructors,
//! methods and properties. Unsupported lifecycle operations are reported,
//! never attempted.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};

use behave_sdk::{Attributes, CallError, Parameter, Projection, RttiHelper, Traits, TypeKey, Value};
use rustc_hash::{FxHashMap, FxHasher};

use crate::method::BehaviorMethod;
use crate::property::{BehaviorProperty, PropertyOwner};

/// Writes a new object into the target cell
pub type ConstructHook = fn(&mut Value) -> bool;
/// Writes a copy of the source into the target cell
pub type CloneHook = fn(&Value, &mut Value) -> bool;
/// Transfers the source's payload into the target cell
pub type MoveHook = fn(&mut Value, &mut Value) -> bool;
/// Compares two objects
pub type EqualityHook = fn(&Value, &Value) -> bool;
/// Hashes an object
pub type HashHook = fn(&Value) -> Option<u64>;

/// Lifecycle hooks of a class; unset hooks mean unsupported
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassHooks {
    /// Default construction
    pub default_construct: Option<ConstructHook>,
    /// Copy construction
    pub clone: Option<CloneHook>,
    /// Move construction
    pub move_construct: Option<MoveHook>,
    /// `==`
    pub equality: Option<EqualityHook>,
    /// Hash of the value
    pub hash: Option<HashHook>,
}

pub(crate) fn construct_default<T: Default + Any>(target: &mut Value) -> bool {
    target.store_result(T::default())
}

pub(crate) fn clone_into<T: Clone + Any>(source: &Value, target: &mut Value) -> bool {
    match source.get::<T>() {
        Some(copy) => target.store_result(copy),
        None => false,
    }
}

pub(crate) fn move_into<T: Any>(source: &mut Value, target: &mut Value) -> bool {
    if let Some(value) = source.take::<T>() {
        return target.store_result(value);
    }
    match source.as_shared::<T>() {
        Some(shared) => {
            *source = Value::empty();
            target.store_shared(shared)
        }
        None => false,
    }
}

pub(crate) fn equals<T: PartialEq + Any>(lhs: &Value, rhs: &Value) -> bool {
    lhs.with_ref(|lhs| {
        rhs.with_ref(|rhs| match (lhs.downcast_ref::<T>(), rhs.downcast_ref::<T>()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => false,
        })
    })
    .flatten()
    .unwrap_or(false)
}

pub(crate) fn hash_of<T: Hash + Any>(value: &Value) -> Option<u64> {
    value
        .with_ref(|value| {
            value.downcast_ref::<T>().map(|value| {
                let mut hasher = FxHasher::default();
                value.hash(&mut hasher);
                hasher.finish()
            })
        })
        .flatten()
}

// ============================================================================
// Objects
// ============================================================================

/// A live instance of a reflected class, or the invalid object
#[derive(Debug, Default)]
pub struct BehaviorObject {
    value: Value,
}

impl BehaviorObject {
    /// Null address, null type
    pub fn invalid() -> Self {
        BehaviorObject { value: Value::empty() }
    }

    /// Wrap a cell
    pub fn from_value(value: Value) -> Self {
        BehaviorObject { value }
    }

    /// Check if the object holds an instance
    pub fn is_valid(&self) -> bool {
        !self.value.is_null()
    }

    /// Type of the instance, void when invalid
    pub fn type_key(&self) -> TypeKey {
        if self.is_valid() {
            self.value.type_key()
        } else {
            TypeKey::void()
        }
    }

    /// Cell of the instance
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Mutable cell of the instance, e.g. as a receiver
    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Unwrap the cell
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Copy of the instance as `T`
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.value.get::<T>()
    }
}

// ============================================================================
// Class
// ============================================================================

/// A reflected native type
pub struct BehaviorClass {
    name: String,
    type_key: TypeKey,
    size: usize,
    align: usize,
    /// Lifecycle hooks
    pub hooks: ClassHooks,
    bases: Vec<TypeKey>,
    rtti: Option<RttiHelper>,
    /// Constructors, argument 0 is the cell to construct into
    pub constructors: Vec<BehaviorMethod>,
    /// Methods by name
    pub methods: FxHashMap<String, BehaviorMethod>,
    /// Properties by name
    pub properties: FxHashMap<String, BehaviorProperty>,
    wrapped: Option<Projection>,
    /// Class attributes
    pub attributes: Attributes,
}

impl BehaviorClass {
    /// Describe `T` with no hooks, members or ancestors
    pub fn new<T: Any>(name: impl Into<String>) -> Self {
        BehaviorClass {
            name: name.into(),
            type_key: TypeKey::of::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            hooks: ClassHooks::default(),
            bases: Vec::new(),
            rtti: None,
            constructors: Vec::new(),
            methods: FxHashMap::default(),
            properties: FxHashMap::default(),
            wrapped: None,
            attributes: Attributes::new(),
        }
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reflected type
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// `size_of` the type
    pub fn size(&self) -> usize {
        self.size
    }

    /// `align_of` the type
    pub fn align(&self) -> usize {
        self.align
    }

    /// Ancestor types, nearest first
    pub fn bases(&self) -> &[TypeKey] {
        &self.bases
    }

    /// Cast table of the type
    pub fn rtti(&self) -> Option<&RttiHelper> {
        self.rtti.as_ref()
    }

    /// Attach the cast table and capture the ancestor list
    pub fn set_rtti(&mut self, rtti: RttiHelper) {
        debug_assert_eq!(rtti.type_key(), self.type_key, "cast table of another type");
        self.bases = rtti.ancestors().collect();
        self.rtti = Some(rtti);
    }

    /// Type wrapped by this one (smart pointers, handles)
    pub fn wrapped_type(&self) -> Option<TypeKey> {
        self.wrapped.as_ref().map(Projection::target)
    }

    /// Declare this type a wrapper reaching its payload through `projection`
    pub fn set_wrapped(&mut self, projection: Projection) {
        self.wrapped = Some(projection);
    }

    /// Owner description for property validation
    pub fn property_owner(&self) -> PropertyOwner<'_> {
        PropertyOwner {
            type_key: self.type_key,
            rtti: self.rtti.as_ref(),
        }
    }

    /// Check if the class is, or derives from, `type_key`
    pub fn is_a(&self, type_key: TypeKey) -> bool {
        self.type_key == type_key || self.bases.contains(&type_key)
    }

    /// Look up a method
    pub fn find_method(&self, name: &str) -> Option<&BehaviorMethod> {
        self.methods.get(name)
    }

    /// Look up a property
    pub fn find_property(&self, name: &str) -> Option<&BehaviorProperty> {
        self.properties.get(name)
    }

    /// Every method owned by the class, properties included
    pub(crate) fn methods_mut(&mut self) -> impl Iterator<Item = &mut BehaviorMethod> {
        self.constructors
            .iter_mut()
            .chain(self.methods.values_mut())
            .chain(self.properties.values_mut().flat_map(|property| property.methods_mut()))
    }

    fn object_cell(&self) -> Value {
        let mut parameter = Parameter {
            type_key: self.type_key,
            traits: Traits::REFERENCE,
            ..Parameter::default()
        };
        parameter.rtti = self.rtti.clone();
        Value::for_parameter(&parameter)
    }

    fn unsupported(&self, operation: &str) {
        log::warn!("{} is not supported for class '{}'", operation, self.name);
    }

    fn owns(&self, object: &BehaviorObject) -> bool {
        object.is_valid() && self.is_a(object.type_key())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Default-construct an instance; invalid if unsupported
    pub fn create(&self) -> BehaviorObject {
        let Some(construct) = self.hooks.default_construct else {
            self.unsupported("default construction");
            return BehaviorObject::invalid();
        };
        let mut cell = self.object_cell();
        if construct(&mut cell) {
            BehaviorObject::from_value(cell)
        } else {
            BehaviorObject::invalid()
        }
    }

    /// Default-construct into a caller supplied cell
    pub fn create_in(&self, target: &mut Value) -> bool {
        match self.hooks.default_construct {
            Some(construct) => construct(target),
            None => {
                self.unsupported("default construction");
                false
            }
        }
    }

    /// Construct through constructor `index`; `args` exclude the target
    pub fn create_with(&self, index: usize, args: &mut [Value]) -> Result<BehaviorObject, CallError> {
        let constructor = self
            .constructors
            .get(index)
            .ok_or_else(|| CallError::Unsupported(format!("constructor #{} of '{}'", index, self.name)))?;
        let mut cells = Vec::with_capacity(args.len() + 1);
        cells.push(self.object_cell());
        cells.extend(args.iter_mut().map(std::mem::take));
        let outcome = constructor.invoke(&mut cells, None);
        let mut cells = cells.into_iter();
        let target = cells.next().unwrap_or_default();
        for (slot, cell) in args.iter_mut().zip(cells) {
            *slot = cell;
        }
        outcome.map(|()| BehaviorObject::from_value(target))
    }

    /// Copy an instance
    pub fn clone_object(&self, source: &BehaviorObject) -> BehaviorObject {
        let Some(clone) = self.hooks.clone else {
            self.unsupported("copy construction");
            return BehaviorObject::invalid();
        };
        if !self.owns(source) {
            return BehaviorObject::invalid();
        }
        let mut cell = self.object_cell();
        if clone(source.value(), &mut cell) {
            BehaviorObject::from_value(cell)
        } else {
            BehaviorObject::invalid()
        }
    }

    /// Move an instance out of `source`, leaving it invalid
    pub fn move_object(&self, source: &mut BehaviorObject) -> BehaviorObject {
        let Some(move_construct) = self.hooks.move_construct else {
            self.unsupported("move construction");
            return BehaviorObject::invalid();
        };
        if !self.owns(source) {
            return BehaviorObject::invalid();
        }
        let mut cell = self.object_cell();
        if move_construct(source.value_mut(), &mut cell) {
            *source = BehaviorObject::invalid();
            BehaviorObject::from_value(cell)
        } else {
            BehaviorObject::invalid()
        }
    }

    /// Drop an instance; false if it is not one of ours
    pub fn destroy(&self, object: BehaviorObject) -> bool {
        if !self.owns(&object) {
            log::warn!("class '{}' cannot destroy an object of type {}", self.name, object.type_key());
            return false;
        }
        drop(object);
        true
    }

    /// Compare two instances; `None` if unsupported
    pub fn equals(&self, lhs: &BehaviorObject, rhs: &BehaviorObject) -> Option<bool> {
        let Some(equality) = self.hooks.equality else {
            self.unsupported("equality");
            return None;
        };
        Some(equality(lhs.value(), rhs.value()))
    }

    /// Hash an instance; `None` if unsupported
    pub fn hash_object(&self, object: &BehaviorObject) -> Option<u64> {
        let Some(hash) = self.hooks.hash else {
            self.unsupported("hashing");
            return None;
        };
        hash(object.value())
    }

    /// Make a cell holding this wrapper type present its wrapped payload
    pub fn unwrap(&self, value: &mut Value) -> bool {
        match &self.wrapped {
            Some(projection) if value.type_key() == self.type_key => {
                value.push_projection(projection.clone());
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for BehaviorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorClass")
            .field("name", &self.name)
            .field("type_key", &self.type_key)
            .field("bases", &self.bases)
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use behave_sdk::Shared;

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
    struct Tag {
        id: u32,
    }

    fn tag_class() -> BehaviorClass {
        let mut class = BehaviorClass::new::<Tag>("Tag");
        class.hooks = ClassHooks {
            default_construct: Some(construct_default::<Tag>),
            clone: Some(clone_into::<Tag>),
            move_construct: Some(move_into::<Tag>),
            equality: Some(equals::<Tag>),
            hash: Some(hash_of::<Tag>),
        };
        class
    }

    #[test]
    fn test_create_without_hook_is_invalid() {
        let class = BehaviorClass::new::<Tag>("Tag");
        let object = class.create();
        assert!(!object.is_valid());
        assert!(object.type_key().is_void());
        assert!(class.equals(&object, &object).is_none());
    }

    #[test]
    fn test_lifecycle_hooks() {
        let class = tag_class();
        let object = class.create();
        assert!(object.is_valid());
        assert_eq!(object.type_key(), TypeKey::of::<Tag>());
        assert_eq!(object.get::<Tag>(), Some(Tag::default()));

        let copy = class.clone_object(&object);
        assert_eq!(class.equals(&object, &copy), Some(true));
        assert_eq!(class.hash_object(&object), class.hash_object(&copy));

        let mut source = copy;
        let moved = class.move_object(&mut source);
        assert!(!source.is_valid());
        assert_eq!(moved.get::<Tag>(), Some(Tag::default()));
        assert!(class.destroy(moved));
        assert!(!class.destroy(BehaviorObject::invalid()));
    }

    #[test]
    fn test_created_object_is_receiver() {
        let mut class = tag_class();
        class
            .methods
            .insert("SetId".into(), BehaviorMethod::from_member("SetId", |tag: &mut Tag, id: u32| tag.id = id));
        let mut object = class.create();
        let method = class.find_method("SetId").unwrap();
        let mut args = [std::mem::take(object.value_mut()), Value::new(9u32)];
        assert!(method.call(&mut args, None));
        assert_eq!(args[0].get::<Tag>(), Some(Tag { id: 9 }));
    }

    #[test]
    fn test_unwrap_projection() {
        struct Handle {
            inner: Tag,
        }

        fn inner(handle: &Handle) -> &Tag {
            &handle.inner
        }

        fn inner_mut(handle: &mut Handle) -> &mut Tag {
            &mut handle.inner
        }

        let mut class = BehaviorClass::new::<Handle>("Handle");
        class.set_wrapped(Projection::new(inner, inner_mut));
        assert_eq!(class.wrapped_type(), Some(TypeKey::of::<Tag>()));

        let shared = Shared::new(Handle { inner: Tag { id: 4 } });
        let mut cell = Value::bind(&shared);
        assert!(class.unwrap(&mut cell));
        assert_eq!(cell.type_key(), TypeKey::of::<Tag>());
        assert_eq!(cell.get::<Tag>(), Some(Tag { id: 4 }));
    }
}
