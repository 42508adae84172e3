//! Reflection Context
//!
//! The [`BehaviorContext`] owns every reflected method, property, class and
//! bus, indexed by name (plus deprecated-name aliases and, for classes, by
//! type). Content is registered through the builders in [`builder`] and
//! removed by name with the same registration code run in remove mode:
//!
//! ```ignore
//! fn reflect(context: &mut BehaviorContext) -> Result<(), RegistrationError> {
//!     context.method("Add", |a: i32, b: i32| a + b).finish()?;
//!     context
//!         .class::<Vector3>("Vector3")
//!         .default_constructible()
//!         .method("Length", Vector3::length)
//!         .finish()
//! }
//!
//! reflect(&mut context)?;                 // adds
//! context.enable_remove_reflection();
//! reflect(&mut context)?;                 // removes the same entries
//! context.disable_remove_reflection();
//! ```

pub mod builder;
mod events;

use std::fmt;
use std::rc::Rc;

use behave_sdk::{RegistrationError, TypeKey};
use rustc_hash::FxHashMap;

pub use builder::{ClassBuilder, EBusBuilder, MethodBuilder, PropertyBuilder};
pub use events::BehaviorContextEvents;

use crate::class::BehaviorClass;
use crate::config::BehaviorConfig;
use crate::ebus::BehaviorEBus;
use crate::method::BehaviorMethod;
use crate::property::BehaviorProperty;

/// Registry of reflected content
#[derive(Default)]
pub struct BehaviorContext {
    config: BehaviorConfig,
    methods: FxHashMap<String, Rc<BehaviorMethod>>,
    properties: FxHashMap<String, Rc<BehaviorProperty>>,
    classes: FxHashMap<String, Rc<BehaviorClass>>,
    type_to_class: FxHashMap<TypeKey, Rc<BehaviorClass>>,
    ebuses: FxHashMap<String, Rc<BehaviorEBus>>,
    observers: Vec<Rc<dyn BehaviorContextEvents>>,
    removing: bool,
}

/// Insert `alias` for `target` unless the name is taken
fn insert_alias<T>(table: &mut FxHashMap<String, Rc<T>>, alias: &str, target: &Rc<T>, kind: &str) {
    if table.contains_key(alias) {
        log::warn!("deprecated {} name '{}' is already in use, alias not created", kind, alias);
        return;
    }
    table.insert(alias.to_string(), Rc::clone(target));
}

/// Erase every key pointing at `target`
fn erase<T>(table: &mut FxHashMap<String, Rc<T>>, target: &Rc<T>) {
    table.retain(|_, entry| !Rc::ptr_eq(entry, target));
}

impl BehaviorContext {
    /// Empty context with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty context with `config`
    pub fn with_config(config: BehaviorConfig) -> Self {
        BehaviorContext {
            config,
            ..Self::default()
        }
    }

    /// Active configuration
    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    // ========================================================================
    // Remove mode
    // ========================================================================

    /// Make registration code remove what it would add
    pub fn enable_remove_reflection(&mut self) {
        self.removing = true;
    }

    /// Return to adding
    pub fn disable_remove_reflection(&mut self) {
        self.removing = false;
    }

    /// Check if registration code currently removes
    pub fn is_removing_reflection(&self) -> bool {
        self.removing
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Register an observer
    pub fn add_observer(&mut self, observer: Rc<dyn BehaviorContextEvents>) {
        self.observers.push(observer);
    }

    /// Unregister an observer
    pub fn remove_observer(&mut self, observer: &Rc<dyn BehaviorContextEvents>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|entry| !Rc::ptr_eq(entry, observer));
        self.observers.len() != before
    }

    fn notify(&self, f: impl Fn(&dyn BehaviorContextEvents)) {
        for observer in &self.observers {
            f(observer.as_ref());
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Global method by name or deprecated name
    pub fn find_method(&self, name: &str) -> Option<&Rc<BehaviorMethod>> {
        self.methods.get(name)
    }

    /// Global property by name
    pub fn find_property(&self, name: &str) -> Option<&Rc<BehaviorProperty>> {
        self.properties.get(name)
    }

    /// Class by name
    pub fn find_class(&self, name: &str) -> Option<&Rc<BehaviorClass>> {
        self.classes.get(name)
    }

    /// Class by reflected type
    pub fn find_class_by_type(&self, type_key: TypeKey) -> Option<&Rc<BehaviorClass>> {
        self.type_to_class.get(&type_key)
    }

    /// Class reflecting `T`
    pub fn find_class_of<T: ?Sized + 'static>(&self) -> Option<&Rc<BehaviorClass>> {
        self.find_class_by_type(TypeKey::of::<T>())
    }

    /// Bus by name or deprecated name
    pub fn find_ebus(&self, name: &str) -> Option<&Rc<BehaviorEBus>> {
        self.ebuses.get(name)
    }

    /// Global methods, aliases included
    pub fn methods(&self) -> impl Iterator<Item = (&str, &Rc<BehaviorMethod>)> {
        self.methods.iter().map(|(name, method)| (name.as_str(), method))
    }

    /// Global properties
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Rc<BehaviorProperty>)> {
        self.properties.iter().map(|(name, property)| (name.as_str(), property))
    }

    /// Classes
    pub fn classes(&self) -> impl Iterator<Item = (&str, &Rc<BehaviorClass>)> {
        self.classes.iter().map(|(name, class)| (name.as_str(), class))
    }

    /// Buses, aliases included
    pub fn ebuses(&self) -> impl Iterator<Item = (&str, &Rc<BehaviorEBus>)> {
        self.ebuses.iter().map(|(name, ebus)| (name.as_str(), ebus))
    }

    /// Number of entries in the type index
    pub fn class_type_count(&self) -> usize {
        self.type_to_class.len()
    }

    // ========================================================================
    // Adding
    // ========================================================================

    pub(crate) fn check_method_name(&self, name: &str) -> Result<(), RegistrationError> {
        if self.methods.contains_key(name) {
            return Err(RegistrationError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    pub(crate) fn check_property_name(&self, name: &str) -> Result<(), RegistrationError> {
        if self.properties.contains_key(name) {
            return Err(RegistrationError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    pub(crate) fn check_class(&self, name: &str, type_key: TypeKey) -> Result<(), RegistrationError> {
        if self.classes.contains_key(name) {
            return Err(RegistrationError::DuplicateName(name.to_string()));
        }
        if self.type_to_class.contains_key(&type_key) {
            return Err(RegistrationError::DuplicateType(type_key));
        }
        Ok(())
    }

    pub(crate) fn check_ebus_name(&self, name: &str) -> Result<(), RegistrationError> {
        if self.ebuses.contains_key(name) {
            return Err(RegistrationError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Add a global method
    pub fn add_method(&mut self, mut method: BehaviorMethod) -> Result<Rc<BehaviorMethod>, RegistrationError> {
        let name = method.name().to_string();
        self.check_method_name(&name)?;
        method.set_report_failures(self.config.log_call_failures);

        let method = Rc::new(method);
        self.methods.insert(name.clone(), Rc::clone(&method));
        if let (Some(alias), true) = (method.deprecated_name(), self.config.allow_deprecated_names) {
            insert_alias(&mut self.methods, alias, &method, "method");
        }
        log::debug!("method '{}' added", name);
        self.notify(|observer| observer.on_add_method(&name, &method));
        Ok(method)
    }

    /// Add a global property
    pub fn add_property(&mut self, mut property: BehaviorProperty) -> Result<Rc<BehaviorProperty>, RegistrationError> {
        let name = property.name().to_string();
        self.check_property_name(&name)?;
        for method in property.methods_mut() {
            method.set_report_failures(self.config.log_call_failures);
        }

        let property = Rc::new(property);
        self.properties.insert(name.clone(), Rc::clone(&property));
        log::debug!("property '{}' added", name);
        self.notify(|observer| observer.on_add_property(&name, &property));
        Ok(property)
    }

    /// Add a class
    pub fn add_class(&mut self, mut class: BehaviorClass) -> Result<Rc<BehaviorClass>, RegistrationError> {
        let name = class.name().to_string();
        self.check_class(&name, class.type_key())?;
        for method in class.methods_mut() {
            method.set_report_failures(self.config.log_call_failures);
        }

        let class = Rc::new(class);
        self.classes.insert(name.clone(), Rc::clone(&class));
        self.type_to_class.insert(class.type_key(), Rc::clone(&class));
        log::debug!("class '{}' added", name);
        self.notify(|observer| observer.on_add_class(&name, &class));
        Ok(class)
    }

    /// Add a bus
    pub fn add_ebus(&mut self, mut ebus: BehaviorEBus) -> Result<Rc<BehaviorEBus>, RegistrationError> {
        let name = ebus.name.clone();
        self.check_ebus_name(&name)?;
        for method in ebus.methods_mut() {
            method.set_report_failures(self.config.log_call_failures);
        }

        let ebus = Rc::new(ebus);
        self.ebuses.insert(name.clone(), Rc::clone(&ebus));
        if let (Some(alias), true) = (ebus.deprecated_name.as_deref(), self.config.allow_deprecated_names) {
            insert_alias(&mut self.ebuses, alias, &ebus, "bus");
        }
        log::debug!("bus '{}' added", name);
        self.notify(|observer| observer.on_add_ebus(&name, &ebus));
        Ok(ebus)
    }

    // ========================================================================
    // Removing
    // ========================================================================

    /// Remove a global method by name or alias
    pub fn remove_method(&mut self, name: &str) -> Result<(), RegistrationError> {
        let method = self
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrationError::NotFound(name.to_string()))?;
        self.notify(|observer| observer.on_remove_method(method.name(), &method));
        erase(&mut self.methods, &method);
        log::debug!("method '{}' removed", method.name());
        Ok(())
    }

    /// Remove a global property by name
    pub fn remove_property(&mut self, name: &str) -> Result<(), RegistrationError> {
        let property = self
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrationError::NotFound(name.to_string()))?;
        self.notify(|observer| observer.on_remove_property(property.name(), &property));
        erase(&mut self.properties, &property);
        log::debug!("property '{}' removed", property.name());
        Ok(())
    }

    /// Remove a class by name
    pub fn remove_class(&mut self, name: &str) -> Result<(), RegistrationError> {
        let class = self
            .classes
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrationError::NotFound(name.to_string()))?;
        self.notify(|observer| observer.on_remove_class(class.name(), &class));
        erase(&mut self.classes, &class);
        self.type_to_class.retain(|_, entry| !Rc::ptr_eq(entry, &class));
        log::debug!("class '{}' removed", class.name());
        Ok(())
    }

    /// Remove a bus by name or alias
    pub fn remove_ebus(&mut self, name: &str) -> Result<(), RegistrationError> {
        let ebus = self
            .ebuses
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrationError::NotFound(name.to_string()))?;
        self.notify(|observer| observer.on_remove_ebus(&ebus.name, &ebus));
        erase(&mut self.ebuses, &ebus);
        log::debug!("bus '{}' removed", ebus.name);
        Ok(())
    }
}

impl fmt::Debug for BehaviorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorContext")
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .field("classes", &self.classes.len())
            .field("ebuses", &self.ebuses.len())
            .field("observers", &self.observers.len())
            .field("removing", &self.removing)
            .finish()
    }
}
