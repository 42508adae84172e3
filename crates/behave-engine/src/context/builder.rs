//! Registration DSL
//!
//! Builders collect one entry (method, property, class or bus) and hand it
//! to the context in `finish()`. Item steps such as `.attribute()`,
//! `.defaults()` and `.parameter_names()` apply to the most recently
//! declared item.
//!
//! A builder is a no-op when:
//! - the context is in remove mode (the entry was removed when the builder
//!   was created; `finish()` succeeds)
//! - the entry cannot be added at all (duplicate name or type; `finish()`
//!   returns the error)
//!
//! A failing item step (a property whose getter and setter disagree, a
//! default value of the wrong type) is logged and skipped; the rest of the
//! entry still registers.

use std::any::Any;
use std::cell::RefCell;
use std::hash::Hash;
use std::marker::PhantomData;
use std::rc::Rc;

use behave_sdk::{IntoValue, Projection, RegistrationError, RttiHelper, TypeKey};

use super::BehaviorContext;
use crate::class::{clone_into, construct_default, equals, hash_of, move_into, BehaviorClass};
use crate::config::ResultPolicy;
use crate::default_value::{DefaultValue, DefaultValueSet};
use crate::ebus::{
    BehaviorEBus, BehaviorEBusEventSender, BusForwarder, BusTraits, EventBus, HandlerEvent,
};
use crate::method::{BehaviorMethod, BusEventFn, FunctionFn, MemberFn};
use crate::property::BehaviorProperty;

enum Entry<T> {
    Building(T),
    Removing,
    Disabled(RegistrationError),
}

impl<T> Entry<T> {
    fn building(&mut self) -> Option<&mut T> {
        match self {
            Entry::Building(item) => Some(item),
            _ => None,
        }
    }

    fn finish(self, add: impl FnOnce(T) -> Result<(), RegistrationError>) -> Result<(), RegistrationError> {
        match self {
            Entry::Building(item) => add(item),
            Entry::Removing => Ok(()),
            Entry::Disabled(err) => Err(err),
        }
    }
}

fn disabled<T>(kind: &str, err: RegistrationError) -> Entry<T> {
    log::warn!("{} registration failed: {}", kind, err);
    Entry::Disabled(err)
}

fn removed<T>(kind: &str, outcome: Result<(), RegistrationError>) -> Entry<T> {
    if let Err(err) = outcome {
        log::debug!("{} removal skipped: {}", kind, err);
    }
    Entry::Removing
}

fn warn_step(owner: &str, outcome: Result<(), RegistrationError>) {
    if let Err(err) = outcome {
        log::warn!("'{}': {}", owner, err);
    }
}

fn apply_default(method: &mut BehaviorMethod, index: usize, value: DefaultValue) {
    let outcome = method.set_default_value(index, value);
    warn_step(method.name(), outcome);
}

fn apply_defaults(method: &mut BehaviorMethod, set: &DefaultValueSet) {
    let outcome = method.set_default_values(set);
    warn_step(method.name(), outcome);
}

// ============================================================================
// Methods
// ============================================================================

/// Builds a global method
pub struct MethodBuilder<'c> {
    context: &'c mut BehaviorContext,
    entry: Entry<BehaviorMethod>,
}

impl BehaviorContext {
    /// Reflect a free function as a global method
    pub fn method<M: 'static, F: FunctionFn<M>>(&mut self, name: &str, function: F) -> MethodBuilder<'_> {
        let entry = if self.removing {
            removed("method", self.remove_method(name))
        } else {
            match self.check_method_name(name) {
                Ok(()) => Entry::Building(BehaviorMethod::from_fn(name, function)),
                Err(err) => disabled("method", err),
            }
        };
        MethodBuilder { context: self, entry }
    }
}

impl<'c> MethodBuilder<'c> {
    /// Also register under an old name
    pub fn deprecated_name(mut self, name: &str) -> Self {
        if let Some(method) = self.entry.building() {
            method.set_deprecated_name(name);
        }
        self
    }

    /// Attach an attribute
    pub fn attribute<V: Any>(mut self, key: &str, value: V) -> Self {
        if let Some(method) = self.entry.building() {
            method.attributes_mut().insert(key, value);
        }
        self
    }

    /// Default for argument `index`
    pub fn default_value<T: IntoValue + Clone>(mut self, index: usize, value: T) -> Self {
        if let Some(method) = self.entry.building() {
            apply_default(method, index, DefaultValue::new(value));
        }
        self
    }

    /// Defaults for the trailing arguments
    pub fn defaults(mut self, set: DefaultValueSet) -> Self {
        if let Some(method) = self.entry.building() {
            apply_defaults(method, &set);
        }
        self
    }

    /// Names for the trailing arguments
    pub fn parameter_names(mut self, names: &[&str]) -> Self {
        if let Some(method) = self.entry.building() {
            method.set_parameter_names(names);
        }
        self
    }

    /// Tooltip for argument `index`
    pub fn tooltip(mut self, index: usize, text: &str) -> Self {
        if let Some(method) = self.entry.building() {
            method.set_argument_tooltip(index, text);
        }
        self
    }

    /// Add the method to the context
    pub fn finish(self) -> Result<(), RegistrationError> {
        let context = self.context;
        self.entry.finish(|method| context.add_method(method).map(|_| ()))
    }
}

// ============================================================================
// Global properties
// ============================================================================

/// Builds a global property
pub struct PropertyBuilder<'c> {
    context: &'c mut BehaviorContext,
    entry: Entry<BehaviorProperty>,
}

impl BehaviorContext {
    fn property_entry(
        &mut self,
        name: &str,
        getter: Option<BehaviorMethod>,
        setter: Option<BehaviorMethod>,
    ) -> PropertyBuilder<'_> {
        let entry = if self.removing {
            removed("property", self.remove_property(name))
        } else {
            match self
                .check_property_name(name)
                .and_then(|()| BehaviorProperty::new(name, getter, setter, None))
            {
                Ok(property) => Entry::Building(property),
                Err(err) => disabled("property", err),
            }
        };
        PropertyBuilder { context: self, entry }
    }

    /// Reflect a global read/write property
    pub fn property<MG, MS, G, S>(&mut self, name: &str, getter: G, setter: S) -> PropertyBuilder<'_>
    where
        MG: 'static,
        MS: 'static,
        G: FunctionFn<MG>,
        S: FunctionFn<MS>,
    {
        let getter = BehaviorMethod::from_fn(format!("{}::Getter", name), getter);
        let setter = BehaviorMethod::from_fn(format!("{}::Setter", name), setter);
        self.property_entry(name, Some(getter), Some(setter))
    }

    /// Reflect a global read-only property
    pub fn property_read_only<M: 'static, G: FunctionFn<M>>(&mut self, name: &str, getter: G) -> PropertyBuilder<'_> {
        let getter = BehaviorMethod::from_fn(format!("{}::Getter", name), getter);
        self.property_entry(name, Some(getter), None)
    }

    /// Reflect a global constant
    pub fn constant<T: IntoValue + Clone>(&mut self, name: &str, value: T) -> PropertyBuilder<'_> {
        self.property_read_only(name, move || value.clone())
    }
}

impl<'c> PropertyBuilder<'c> {
    /// Attach an attribute
    pub fn attribute<V: Any>(mut self, key: &str, value: V) -> Self {
        if let Some(property) = self.entry.building() {
            property.attributes.insert(key, value);
        }
        self
    }

    /// Add the property to the context
    pub fn finish(self) -> Result<(), RegistrationError> {
        let context = self.context;
        self.entry.finish(|property| context.add_property(property).map(|_| ()))
    }
}

// ============================================================================
// Classes
// ============================================================================

enum ClassItem {
    Class,
    Constructor(usize),
    Method(String),
    Property(String),
    /// Last item failed; item steps are dropped
    Skipped,
}

/// Builds a class reflecting `T`
pub struct ClassBuilder<'c, T: Any> {
    context: &'c mut BehaviorContext,
    entry: Entry<BehaviorClass>,
    current: ClassItem,
    _marker: PhantomData<fn() -> T>,
}

impl BehaviorContext {
    /// Reflect `T` as a class
    pub fn class<T: Any>(&mut self, name: &str) -> ClassBuilder<'_, T> {
        let entry = if self.removing {
            removed("class", self.remove_class(name))
        } else {
            match self.check_class(name, TypeKey::of::<T>()) {
                Ok(()) => Entry::Building(BehaviorClass::new::<T>(name)),
                Err(err) => disabled("class", err),
            }
        };
        ClassBuilder {
            context: self,
            entry,
            current: ClassItem::Class,
            _marker: PhantomData,
        }
    }
}

impl<'c, T: Any> ClassBuilder<'c, T> {
    fn current_method(&mut self) -> Option<&mut BehaviorMethod> {
        let class = self.entry.building()?;
        match &self.current {
            ClassItem::Constructor(index) => class.constructors.get_mut(*index),
            ClassItem::Method(name) => class.methods.get_mut(name),
            _ => None,
        }
    }

    fn with_current_method(mut self, step: &str, f: impl FnOnce(&mut BehaviorMethod)) -> Self {
        match self.current_method() {
            Some(method) => f(method),
            None => {
                if matches!(self.entry, Entry::Building(_)) && !matches!(self.current, ClassItem::Skipped) {
                    log::warn!("{} applies to methods and constructors only", step);
                }
            }
        }
        self
    }

    /// Attach the cast table of `T`, capturing its ancestors
    pub fn rtti(mut self, rtti: RttiHelper) -> Self {
        if let Some(class) = self.entry.building() {
            class.set_rtti(rtti);
        }
        self
    }

    /// Enable `create`
    pub fn default_constructible(mut self) -> Self
    where
        T: Default,
    {
        if let Some(class) = self.entry.building() {
            class.hooks.default_construct = Some(construct_default::<T>);
        }
        self
    }

    /// Enable `clone_object`
    pub fn clonable(mut self) -> Self
    where
        T: Clone,
    {
        if let Some(class) = self.entry.building() {
            class.hooks.clone = Some(clone_into::<T>);
        }
        self
    }

    /// Enable `move_object`
    pub fn movable(mut self) -> Self {
        if let Some(class) = self.entry.building() {
            class.hooks.move_construct = Some(move_into::<T>);
        }
        self
    }

    /// Enable `equals`
    pub fn comparable(mut self) -> Self
    where
        T: PartialEq,
    {
        if let Some(class) = self.entry.building() {
            class.hooks.equality = Some(equals::<T>);
        }
        self
    }

    /// Enable `hash_object`
    pub fn hashable(mut self) -> Self
    where
        T: Hash,
    {
        if let Some(class) = self.entry.building() {
            class.hooks.hash = Some(hash_of::<T>);
        }
        self
    }

    /// Declare `T` a wrapper around `Inner`
    pub fn wrapping<Inner: Any>(mut self, get: fn(&T) -> &Inner, get_mut: fn(&mut T) -> &mut Inner) -> Self {
        if let Some(class) = self.entry.building() {
            class.set_wrapped(Projection::new(get, get_mut));
        }
        self
    }

    /// Add a constructor
    pub fn constructor<M: 'static, F: FunctionFn<M, Output = T>>(mut self, function: F) -> Self
    where
        T: IntoValue,
    {
        if let Some(class) = self.entry.building() {
            let constructor = BehaviorMethod::constructor(class.name(), function);
            class.constructors.push(constructor);
            self.current = ClassItem::Constructor(class.constructors.len() - 1);
        }
        self
    }

    fn insert_method(mut self, method: BehaviorMethod) -> Self {
        if let Some(class) = self.entry.building() {
            let name = method.name().to_string();
            if class.methods.contains_key(&name) {
                log::warn!("class '{}': {}", class.name(), RegistrationError::DuplicateName(name));
                self.current = ClassItem::Skipped;
            } else {
                class.methods.insert(name.clone(), method);
                self.current = ClassItem::Method(name);
            }
        }
        self
    }

    /// Add a method taking `&T` or `&mut T`
    pub fn method<M: 'static, F: MemberFn<T, M>>(self, name: &str, function: F) -> Self {
        if !matches!(self.entry, Entry::Building(_)) {
            return self;
        }
        self.insert_method(BehaviorMethod::from_member(name, function))
    }

    /// Add a method without receiver
    pub fn static_method<M: 'static, F: FunctionFn<M>>(self, name: &str, function: F) -> Self {
        if !matches!(self.entry, Entry::Building(_)) {
            return self;
        }
        self.insert_method(BehaviorMethod::from_fn(name, function))
    }

    /// Add a property from already reflected accessors
    pub fn property_with(mut self, name: &str, getter: Option<BehaviorMethod>, setter: Option<BehaviorMethod>) -> Self {
        let Some(class) = self.entry.building() else {
            return self;
        };
        if class.properties.contains_key(name) {
            log::warn!("class '{}': {}", class.name(), RegistrationError::DuplicateName(name.to_string()));
            self.current = ClassItem::Skipped;
            return self;
        }
        match BehaviorProperty::new(name, getter, setter, Some(class.property_owner())) {
            Ok(property) => {
                class.properties.insert(name.to_string(), property);
                self.current = ClassItem::Property(name.to_string());
            }
            Err(err) => {
                log::warn!("class '{}': {}", class.name(), err);
                self.current = ClassItem::Skipped;
            }
        }
        self
    }

    /// Add a read/write property
    pub fn property<MG, MS, G, S>(self, name: &str, getter: G, setter: S) -> Self
    where
        MG: 'static,
        MS: 'static,
        G: MemberFn<T, MG>,
        S: MemberFn<T, MS>,
    {
        let getter = BehaviorMethod::from_member(format!("{}::Getter", name), getter);
        let setter = BehaviorMethod::from_member(format!("{}::Setter", name), setter);
        self.property_with(name, Some(getter), Some(setter))
    }

    /// Add a read-only property
    pub fn property_read_only<M: 'static, G: MemberFn<T, M>>(self, name: &str, getter: G) -> Self {
        let getter = BehaviorMethod::from_member(format!("{}::Getter", name), getter);
        self.property_with(name, Some(getter), None)
    }

    /// Add a write-only property
    pub fn property_write_only<M: 'static, S: MemberFn<T, M>>(self, name: &str, setter: S) -> Self {
        let setter = BehaviorMethod::from_member(format!("{}::Setter", name), setter);
        self.property_with(name, None, Some(setter))
    }

    /// Attach an attribute to the most recent item
    pub fn attribute<V: Any>(mut self, key: &str, value: V) -> Self {
        let Some(class) = self.entry.building() else {
            return self;
        };
        match &self.current {
            ClassItem::Class => class.attributes.insert(key, value),
            ClassItem::Constructor(index) => {
                if let Some(constructor) = class.constructors.get_mut(*index) {
                    constructor.attributes_mut().insert(key, value);
                }
            }
            ClassItem::Method(name) => {
                if let Some(method) = class.methods.get_mut(name) {
                    method.attributes_mut().insert(key, value);
                }
            }
            ClassItem::Property(name) => {
                if let Some(property) = class.properties.get_mut(name) {
                    property.attributes.insert(key, value);
                }
            }
            ClassItem::Skipped => {}
        }
        self
    }

    /// Default for argument `index` of the most recent method
    pub fn default_value<V: IntoValue + Clone>(self, index: usize, value: V) -> Self {
        self.with_current_method("default_value", |method| apply_default(method, index, DefaultValue::new(value)))
    }

    /// Defaults for the trailing arguments of the most recent method
    pub fn defaults(self, set: DefaultValueSet) -> Self {
        self.with_current_method("defaults", |method| apply_defaults(method, &set))
    }

    /// Names for the trailing arguments of the most recent method
    pub fn parameter_names(self, names: &[&str]) -> Self {
        self.with_current_method("parameter_names", |method| method.set_parameter_names(names))
    }

    /// Add the class to the context
    pub fn finish(self) -> Result<(), RegistrationError> {
        let context = self.context;
        self.entry.finish(|class| context.add_class(class).map(|_| ()))
    }
}

// ============================================================================
// Buses
// ============================================================================

/// Builds a reflected bus
pub struct EBusBuilder<'c, B: BusTraits> {
    context: &'c mut BehaviorContext,
    entry: Entry<BehaviorEBus>,
    bus: EventBus<B>,
    policy: ResultPolicy,
    /// Most recent event, `None` for the bus itself
    current: Option<String>,
}

impl BehaviorContext {
    /// Reflect `bus` under `name`
    pub fn ebus<B: BusTraits>(&mut self, name: &str, bus: &EventBus<B>) -> EBusBuilder<'_, B> {
        let entry = if self.removing {
            removed("bus", self.remove_ebus(name))
        } else {
            match self.check_ebus_name(name) {
                Ok(()) => Entry::Building(BehaviorEBus::new(name, bus)),
                Err(err) => disabled("bus", err),
            }
        };
        let policy = self.config.result_policy;
        EBusBuilder {
            context: self,
            entry,
            bus: bus.clone(),
            policy,
            current: None,
        }
    }
}

impl<'c, B: BusTraits> EBusBuilder<'c, B> {
    fn current_sender(&mut self) -> Option<&mut BehaviorEBusEventSender> {
        let ebus = self.entry.building()?;
        ebus.events.get_mut(self.current.as_deref()?)
    }

    /// Description for tools
    pub fn tooltip(mut self, text: &str) -> Self {
        if let Some(ebus) = self.entry.building() {
            ebus.tooltip = Some(text.to_string());
        }
        self
    }

    /// Also register under an old name
    pub fn deprecated_name(mut self, name: &str) -> Self {
        if let Some(ebus) = self.entry.building() {
            ebus.deprecated_name = Some(name.to_string());
        }
        self
    }

    /// Reflect an event function
    pub fn event<M: 'static, F: BusEventFn<B::Handler, M>>(mut self, name: &str, function: F) -> Self {
        let policy = self.policy;
        let sender = BehaviorEBusEventSender::new(&self.bus, name, function, policy);
        if let Some(ebus) = self.entry.building() {
            match ebus.add_event(name, sender) {
                Ok(()) => self.current = Some(name.to_string()),
                Err(err) => {
                    log::warn!("bus '{}': {}", ebus.name, err);
                    self.current = None;
                }
            }
        }
        self
    }

    /// Expose a getter/setter event pair as a property
    pub fn virtual_property(mut self, name: &str, getter: Option<&str>, setter: Option<&str>) -> Self {
        if let Some(ebus) = self.entry.building() {
            let outcome = ebus.add_virtual_property(name, getter, setter);
            let owner = ebus.name.clone();
            warn_step(&owner, outcome);
        }
        self
    }

    /// Let foreign code handle this bus through forwarder hooks
    pub fn handler(
        mut self,
        events: Vec<HandlerEvent>,
        factory: impl Fn(Rc<BusForwarder>) -> Rc<RefCell<B::Handler>> + 'static,
    ) -> Self {
        let bus = self.bus.clone();
        if let Some(ebus) = self.entry.building() {
            ebus.set_handler(&bus, events, factory);
        }
        self
    }

    /// Attach an attribute to the most recent event, or to the bus
    pub fn attribute<V: Any>(mut self, key: &str, value: V) -> Self {
        if self.current.is_some() {
            if let Some(sender) = self.current_sender() {
                sender.attributes.insert(key, value);
            }
        } else if let Some(ebus) = self.entry.building() {
            ebus.attributes.insert(key, value);
        }
        self
    }

    /// Default for argument `index` of the most recent event; addressed
    /// variants shift it past the bus id
    pub fn default_value<V: IntoValue + Clone>(mut self, index: usize, value: V) -> Self {
        let value = DefaultValue::new(value);
        if let Some(sender) = self.current_sender() {
            apply_default(&mut sender.broadcast, index, value.clone());
            if let Some(method) = sender.queue_broadcast.as_mut() {
                apply_default(method, index, value.clone());
            }
            for method in sender.event.iter_mut().chain(sender.queue_event.iter_mut()) {
                apply_default(method, index + 1, value.clone());
            }
        }
        self
    }

    /// Defaults for the trailing arguments of the most recent event
    pub fn defaults(mut self, set: DefaultValueSet) -> Self {
        if let Some(sender) = self.current_sender() {
            for method in sender.methods_mut() {
                apply_defaults(method, &set);
            }
        }
        self
    }

    /// Names for the trailing arguments of the most recent event
    pub fn parameter_names(mut self, names: &[&str]) -> Self {
        if let Some(sender) = self.current_sender() {
            for method in sender.methods_mut() {
                method.set_parameter_names(names);
            }
        }
        self
    }

    /// Add the bus to the context
    pub fn finish(self) -> Result<(), RegistrationError> {
        let context = self.context;
        self.entry.finish(|ebus| context.add_ebus(ebus).map(|_| ()))
    }
}
