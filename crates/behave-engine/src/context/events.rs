//! Registration observers

use std::rc::Rc;

use crate::class::BehaviorClass;
use crate::ebus::BehaviorEBus;
use crate::method::BehaviorMethod;
use crate::property::BehaviorProperty;

/// Notified when reflection is added to or removed from a context.
///
/// Remove notifications fire before the context lets go of the object, so
/// the reference is still valid inside the callback. Every callback has an
/// empty default.
#[allow(unused_variables)]
pub trait BehaviorContextEvents {
    /// A global method was added
    fn on_add_method(&self, name: &str, method: &Rc<BehaviorMethod>) {}

    /// A global method is being removed
    fn on_remove_method(&self, name: &str, method: &Rc<BehaviorMethod>) {}

    /// A global property was added
    fn on_add_property(&self, name: &str, property: &Rc<BehaviorProperty>) {}

    /// A global property is being removed
    fn on_remove_property(&self, name: &str, property: &Rc<BehaviorProperty>) {}

    /// A class was added
    fn on_add_class(&self, name: &str, class: &Rc<BehaviorClass>) {}

    /// A class is being removed
    fn on_remove_class(&self, name: &str, class: &Rc<BehaviorClass>) {}

    /// A bus was added
    fn on_add_ebus(&self, name: &str, ebus: &Rc<BehaviorEBus>) {}

    /// A bus is being removed
    fn on_remove_ebus(&self, name: &str, ebus: &Rc<BehaviorEBus>) {}
}
