//! Introspection manifest
//!
//! A serializable snapshot of everything a context reflects, for binding
//! generators and documentation tools. Entries are sorted by name and
//! deprecated aliases are left out.

use serde::{Deserialize, Serialize};

use behave_sdk::{Attributes, Parameter};

use crate::class::BehaviorClass;
use crate::context::BehaviorContext;
use crate::ebus::BehaviorEBus;
use crate::method::BehaviorMethod;
use crate::property::BehaviorProperty;

/// One argument of a method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentManifest {
    /// Argument name, empty if unnamed
    pub name: String,
    /// Rust type name
    pub type_name: String,
    /// Shape bits
    pub traits: u32,
    /// A default value fills this argument when omitted
    pub has_default: bool,
}

/// One method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodManifest {
    /// Method name
    pub name: String,
    /// Callable shape (`free`, `member`, ...)
    pub kind: String,
    /// Human readable signature
    pub signature: String,
    /// Result type name, `None` for void
    pub result: Option<String>,
    /// Arguments, receiver included
    pub arguments: Vec<ArgumentManifest>,
    /// Arguments a caller must supply
    pub min_arguments: usize,
    /// Old name still resolving to this method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_name: Option<String>,
    /// Attribute keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

/// One property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyManifest {
    /// Property name
    pub name: String,
    /// Value type name
    pub type_name: String,
    /// Has a getter
    pub readable: bool,
    /// Has a setter
    pub writable: bool,
    /// Attribute keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

/// One class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassManifest {
    /// Class name
    pub name: String,
    /// Rust type name
    pub type_name: String,
    /// `size_of`
    pub size: usize,
    /// `align_of`
    pub align: usize,
    /// Ancestor type names, nearest first
    pub bases: Vec<String>,
    /// Type wrapped by this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped: Option<String>,
    /// Supported lifecycle operations
    pub lifecycle: Vec<String>,
    /// Constructors in declaration order
    pub constructors: Vec<MethodManifest>,
    /// Methods
    pub methods: Vec<MethodManifest>,
    /// Properties
    pub properties: Vec<PropertyManifest>,
    /// Attribute keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

/// One bus event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventManifest {
    /// Event name
    pub name: String,
    /// Broadcast signature
    pub signature: String,
    /// Built call variants
    pub variants: Vec<String>,
    /// Attribute keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

/// One virtual property of a bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualPropertyManifest {
    /// Property name
    pub name: String,
    /// Getter event
    pub getter: Option<String>,
    /// Setter event
    pub setter: Option<String>,
}

/// One bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EBusManifest {
    /// Bus name
    pub name: String,
    /// Old name still resolving to this bus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_name: Option<String>,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// Bus id type name, `None` for broadcast-only buses
    pub id_type: Option<String>,
    /// Accepts queued calls
    pub queued: bool,
    /// Events
    pub events: Vec<EventManifest>,
    /// Virtual properties
    pub virtual_properties: Vec<VirtualPropertyManifest>,
    /// Events forwarded by handler objects, in order
    pub handler_events: Vec<String>,
    /// Attribute keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

/// Everything reflected by a context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Global methods
    pub methods: Vec<MethodManifest>,
    /// Global properties
    pub properties: Vec<PropertyManifest>,
    /// Classes
    pub classes: Vec<ClassManifest>,
    /// Buses
    pub ebuses: Vec<EBusManifest>,
}

impl Manifest {
    /// Pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a manifest written by [`Manifest::to_json`]
    pub fn from_json(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }
}

fn attribute_keys(attributes: &Attributes) -> Vec<String> {
    attributes.keys().into_iter().map(str::to_string).collect()
}

fn type_name(parameter: &Parameter) -> String {
    parameter.type_key.name().to_string()
}

fn describe_method(method: &BehaviorMethod) -> MethodManifest {
    let arguments = method
        .arguments()
        .iter()
        .enumerate()
        .map(|(index, parameter)| ArgumentManifest {
            name: parameter.name.clone(),
            type_name: type_name(parameter),
            traits: parameter.traits.bits(),
            has_default: method.get_default(index).is_some(),
        })
        .collect();
    MethodManifest {
        name: method.name().to_string(),
        kind: method.kind().as_str().to_string(),
        signature: method.signature(),
        result: method.has_result().then(|| type_name(method.result())),
        arguments,
        min_arguments: method.min_arguments(),
        deprecated_name: method.deprecated_name().map(str::to_string),
        attributes: attribute_keys(method.attributes()),
    }
}

fn describe_property(property: &BehaviorProperty) -> PropertyManifest {
    PropertyManifest {
        name: property.name().to_string(),
        type_name: property.value_type().name().to_string(),
        readable: property.is_readable(),
        writable: property.is_writable(),
        attributes: attribute_keys(&property.attributes),
    }
}

fn sorted<T>(mut items: Vec<T>, key: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| key(a).cmp(key(b)));
    items
}

fn describe_class(class: &BehaviorClass) -> ClassManifest {
    let hooks = &class.hooks;
    let lifecycle = [
        ("create", hooks.default_construct.is_some()),
        ("clone", hooks.clone.is_some()),
        ("move", hooks.move_construct.is_some()),
        ("equals", hooks.equality.is_some()),
        ("hash", hooks.hash.is_some()),
    ]
    .into_iter()
    .filter_map(|(name, supported)| supported.then(|| name.to_string()))
    .collect();

    ClassManifest {
        name: class.name().to_string(),
        type_name: class.type_key().name().to_string(),
        size: class.size(),
        align: class.align(),
        bases: class.bases().iter().map(|base| base.name().to_string()).collect(),
        wrapped: class.wrapped_type().map(|key| key.name().to_string()),
        lifecycle,
        constructors: class.constructors.iter().map(describe_method).collect(),
        methods: sorted(class.methods.values().map(describe_method).collect(), |m| &m.name),
        properties: sorted(class.properties.values().map(describe_property).collect(), |p| &p.name),
        attributes: attribute_keys(&class.attributes),
    }
}

fn describe_ebus(ebus: &BehaviorEBus) -> EBusManifest {
    let events = ebus
        .events
        .iter()
        .map(|(name, sender)| EventManifest {
            name: name.clone(),
            signature: sender.broadcast.signature(),
            variants: sender.methods().map(|method| method.kind().as_str().to_string()).collect(),
            attributes: attribute_keys(&sender.attributes),
        })
        .collect();
    let virtual_properties = ebus
        .virtual_properties
        .iter()
        .map(|(name, property)| VirtualPropertyManifest {
            name: name.clone(),
            getter: property.getter.clone(),
            setter: property.setter.clone(),
        })
        .collect();

    EBusManifest {
        name: ebus.name.clone(),
        deprecated_name: ebus.deprecated_name.clone(),
        tooltip: ebus.tooltip.clone(),
        id_type: ebus.id_parameter.as_ref().map(type_name),
        queued: ebus.is_queued(),
        events: sorted(events, |e| &e.name),
        virtual_properties: sorted(virtual_properties, |p| &p.name),
        handler_events: ebus.handler_events.iter().map(|event| event.name().to_string()).collect(),
        attributes: attribute_keys(&ebus.attributes),
    }
}

impl BehaviorContext {
    /// Describe everything reflected so far
    pub fn manifest(&self) -> Manifest {
        let methods = self
            .methods()
            .filter(|(name, method)| *name == method.name())
            .map(|(_, method)| describe_method(method))
            .collect();
        let properties = self.properties().map(|(_, property)| describe_property(property)).collect();
        let classes = self.classes().map(|(_, class)| describe_class(class)).collect();
        let ebuses = self
            .ebuses()
            .filter(|(name, ebus)| *name == ebus.name)
            .map(|(_, ebus)| describe_ebus(ebus))
            .collect();

        Manifest {
            methods: sorted(methods, |m| &m.name),
            properties: sorted(properties, |p| &p.name),
            classes: sorted(classes, |c| &c.name),
            ebuses: sorted(ebuses, |b| &b.name),
        }
    }
}
