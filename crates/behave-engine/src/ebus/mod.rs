//! Event Bus Projection
//!
//! A [`BehaviorEBus`] is the reflected face of an [`EventBus`]. Every
//! reflected event function gets an [`BehaviorEBusEventSender`] holding up to
//! four methods, gated by the bus shape:
//!
//! | Method             | Built when                   |
//! |--------------------|------------------------------|
//! | `broadcast`        | always                       |
//! | `event`            | the bus is addressed         |
//! | `queue_broadcast`  | the bus queues calls         |
//! | `queue_event`      | addressed and queued         |
//!
//! Foreign code receives bus events through [`BehaviorEBusHandler`] objects
//! created by the bus's `create_handler` method.

pub mod bus;
mod dispatch;
pub mod handler;

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use behave_sdk::{Attributes, CallError, Parameter, RegistrationError, Shared, Typed, Value};
use rustc_hash::FxHashMap;

pub use bus::{BusId, BusTraits, Connection, EventBus, HandlerOf, NoId};
pub use handler::{BehaviorEBusHandler, BusForwarder, BusForwarderEvent, GenericHook, HandlerConnector, HandlerEvent};

use crate::config::ResultPolicy;
use crate::method::{BehaviorMethod, BusEventFn, MethodKind};
use dispatch::{BroadcastDispatch, EventDispatch, QueueBroadcastDispatch, QueueEventDispatch};
use handler::BusConnector;

/// Deferred free function accepted by a bus's `queue_function` method
#[derive(Clone)]
pub struct QueuedFunction(pub Rc<dyn Fn()>);

impl QueuedFunction {
    /// Wrap a closure
    pub fn new(f: impl Fn() + 'static) -> Self {
        QueuedFunction(Rc::new(f))
    }
}

impl fmt::Debug for QueuedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueuedFunction")
    }
}

behave_sdk::reflect_value!(QueuedFunction);

// ============================================================================
// Event sender
// ============================================================================

/// Call variants of one reflected bus event
pub struct BehaviorEBusEventSender {
    /// Deliver to every handler
    pub broadcast: BehaviorMethod,
    /// Deliver to the handlers at one id (addressed buses)
    pub event: Option<BehaviorMethod>,
    /// Deferred broadcast (queued buses)
    pub queue_broadcast: Option<BehaviorMethod>,
    /// Deferred addressed event (addressed and queued buses)
    pub queue_event: Option<BehaviorMethod>,
    /// Event attributes
    pub attributes: Attributes,
}

fn id_parameter<B: BusTraits>() -> Parameter {
    B::Id::parameter().named("id")
}

impl BehaviorEBusEventSender {
    /// Build the variants of `function` for `bus`
    pub fn new<B, M, F>(bus: &EventBus<B>, name: &str, function: F, policy: ResultPolicy) -> Self
    where
        B: BusTraits,
        M: 'static,
        F: BusEventFn<B::Handler, M>,
    {
        let parameters = F::parameters();
        let addressed = <B::Id as BusId>::ADDRESSED;

        let mut addressed_parameters = parameters.clone();
        addressed_parameters.insert(1, id_parameter::<B>());

        let mut queued_parameters = parameters.clone();
        queued_parameters[0] = Parameter::void();
        let mut queued_addressed_parameters = addressed_parameters.clone();
        queued_addressed_parameters[0] = Parameter::void();

        let broadcast = BehaviorMethod::new(
            name,
            MethodKind::EBusBroadcast,
            parameters,
            Box::new(BroadcastDispatch {
                bus: bus.clone(),
                function: function.clone(),
                policy,
                _marker: PhantomData::<fn() -> M>,
            }),
        );

        let event = addressed.then(|| {
            BehaviorMethod::new(
                name,
                MethodKind::EBusAddressed,
                addressed_parameters,
                Box::new(EventDispatch {
                    bus: bus.clone(),
                    function: function.clone(),
                    policy,
                    _marker: PhantomData::<fn() -> M>,
                }),
            )
        });

        let queue_broadcast = bus.is_queued().then(|| {
            BehaviorMethod::new(
                name,
                MethodKind::EBusQueueBroadcast,
                queued_parameters,
                Box::new(QueueBroadcastDispatch {
                    bus: bus.clone(),
                    function: function.clone(),
                    _marker: PhantomData::<fn() -> M>,
                }),
            )
        });

        let queue_event = (addressed && bus.is_queued()).then(|| {
            BehaviorMethod::new(
                name,
                MethodKind::EBusQueueAddressed,
                queued_addressed_parameters,
                Box::new(QueueEventDispatch {
                    bus: bus.clone(),
                    function,
                    _marker: PhantomData::<fn() -> M>,
                }),
            )
        });

        BehaviorEBusEventSender {
            broadcast,
            event,
            queue_broadcast,
            queue_event,
            attributes: Attributes::new(),
        }
    }

    /// Every built variant
    pub fn methods(&self) -> impl Iterator<Item = &BehaviorMethod> {
        std::iter::once(&self.broadcast)
            .chain(self.event.as_ref())
            .chain(self.queue_broadcast.as_ref())
            .chain(self.queue_event.as_ref())
    }

    /// Every built variant, mutably
    pub fn methods_mut(&mut self) -> impl Iterator<Item = &mut BehaviorMethod> {
        std::iter::once(&mut self.broadcast)
            .chain(self.event.as_mut())
            .chain(self.queue_broadcast.as_mut())
            .chain(self.queue_event.as_mut())
    }
}

impl fmt::Debug for BehaviorEBusEventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorEBusEventSender")
            .field("broadcast", &self.broadcast.signature())
            .field("event", &self.event.is_some())
            .field("queue_broadcast", &self.queue_broadcast.is_some())
            .field("queue_event", &self.queue_event.is_some())
            .finish()
    }
}

// ============================================================================
// Reflected bus
// ============================================================================

/// Getter/setter pair of events exposed as one property
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualProperty {
    /// Event returning the value, taking no arguments
    pub getter: Option<String>,
    /// Event taking the value, returning nothing
    pub setter: Option<String>,
}

/// A reflected event bus
pub struct BehaviorEBus {
    /// Bus name
    pub name: String,
    /// Alias kept for old content
    pub deprecated_name: Option<String>,
    /// Description for tools
    pub tooltip: Option<String>,
    /// Shape of the bus id, `None` for broadcast-only buses
    pub id_parameter: Option<Parameter>,
    /// Returns the id of the handler receiving the current event
    pub get_current_id: Option<BehaviorMethod>,
    /// Queues a [`QueuedFunction`] on the bus
    pub queue_function: Option<BehaviorMethod>,
    /// Reflected events by name
    pub events: FxHashMap<String, BehaviorEBusEventSender>,
    /// Event pairs exposed as properties
    pub virtual_properties: FxHashMap<String, VirtualProperty>,
    /// Events a handler object forwards, in declaration order
    pub handler_events: Vec<HandlerEvent>,
    /// Returns a new `Shared<BehaviorEBusHandler>`
    pub create_handler: Option<BehaviorMethod>,
    /// Disconnects a `Shared<BehaviorEBusHandler>`
    pub destroy_handler: Option<BehaviorMethod>,
    /// Bus attributes
    pub attributes: Attributes,
}

impl BehaviorEBus {
    /// Reflect `bus` under `name`, without events
    pub fn new<B: BusTraits>(name: impl Into<String>, bus: &EventBus<B>) -> Self {
        let addressed = <B::Id as BusId>::ADDRESSED;

        let get_current_id = addressed.then(|| {
            let bus = bus.clone();
            BehaviorMethod::from_fn("GetCurrentBusId", move || bus.current_id())
        });

        let queue_function = bus.is_queued().then(|| {
            let bus = bus.clone();
            BehaviorMethod::from_fn("QueueFunction", move |function: QueuedFunction| {
                bus.queue_function(move || (function.0)())
            })
        });

        BehaviorEBus {
            name: name.into(),
            deprecated_name: None,
            tooltip: None,
            id_parameter: addressed.then(id_parameter::<B>),
            get_current_id,
            queue_function,
            events: FxHashMap::default(),
            virtual_properties: FxHashMap::default(),
            handler_events: Vec::new(),
            create_handler: None,
            destroy_handler: None,
            attributes: Attributes::new(),
        }
    }

    /// Check if events can be addressed to one id
    pub fn is_addressed(&self) -> bool {
        self.id_parameter.is_some()
    }

    /// Check if the bus accepts queued calls
    pub fn is_queued(&self) -> bool {
        self.queue_function.is_some()
    }

    /// Add a reflected event
    pub fn add_event(&mut self, name: impl Into<String>, sender: BehaviorEBusEventSender) -> Result<(), RegistrationError> {
        let name = name.into();
        if self.events.contains_key(&name) {
            return Err(RegistrationError::DuplicateName(name));
        }
        self.events.insert(name, sender);
        Ok(())
    }

    /// Look up an event
    pub fn event(&self, name: &str) -> Option<&BehaviorEBusEventSender> {
        self.events.get(name)
    }

    /// Expose a getter/setter event pair as a property.
    ///
    /// The getter must take no arguments and return a value; the setter must
    /// take exactly that value and return nothing.
    pub fn add_virtual_property(
        &mut self,
        name: impl Into<String>,
        getter: Option<&str>,
        setter: Option<&str>,
    ) -> Result<(), RegistrationError> {
        let name = name.into();
        let invalid = |reason: String| RegistrationError::VirtualProperty {
            name: name.clone(),
            reason,
        };
        if getter.is_none() && setter.is_none() {
            return Err(invalid("neither getter nor setter given".to_string()));
        }
        if self.virtual_properties.contains_key(&name) {
            return Err(RegistrationError::DuplicateName(name));
        }

        let mut value_type = None;
        if let Some(getter) = getter {
            let sender = self
                .events
                .get(getter)
                .ok_or_else(|| invalid(format!("unknown getter event '{}'", getter)))?;
            let method = &sender.broadcast;
            if method.num_arguments() != 0 || !method.has_result() {
                return Err(invalid(format!("getter '{}' must take nothing and return a value", getter)));
            }
            value_type = Some(method.result().type_key);
        }
        if let Some(setter) = setter {
            let sender = self
                .events
                .get(setter)
                .ok_or_else(|| invalid(format!("unknown setter event '{}'", setter)))?;
            let method = &sender.broadcast;
            if method.num_arguments() != 1 || method.has_result() {
                return Err(invalid(format!("setter '{}' must take one value and return nothing", setter)));
            }
            let argument = method.arguments()[0].type_key;
            if let Some(expected) = value_type.filter(|expected| *expected != argument) {
                return Err(invalid(format!("setter takes {}, getter returns {}", argument, expected)));
            }
        }

        self.virtual_properties.insert(
            name,
            VirtualProperty {
                getter: getter.map(str::to_string),
                setter: setter.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Enable handler objects for foreign code.
    ///
    /// `factory` builds the bus handler that forwards each event to the
    /// given forwarder, by index in `events`.
    pub fn set_handler<B: BusTraits>(
        &mut self,
        bus: &EventBus<B>,
        events: Vec<HandlerEvent>,
        factory: impl Fn(Rc<BusForwarder>) -> Rc<RefCell<B::Handler>> + 'static,
    ) {
        let bus = bus.clone();
        let declared = events.clone();
        self.create_handler = Some(BehaviorMethod::from_fn("CreateHandler", move || {
            let forwarder = Rc::new(BusForwarder::new(&declared));
            let handler = factory(Rc::clone(&forwarder));
            let connector = BusConnector::new(bus.clone(), handler);
            Shared::new(BehaviorEBusHandler::new(forwarder, Box::new(connector)))
        }));
        self.destroy_handler = Some(BehaviorMethod::from_fn(
            "DestroyHandler",
            |handler: Shared<BehaviorEBusHandler>| handler.borrow_mut().disconnect(),
        ));
        self.handler_events = events;
    }

    /// Create a handler object through `create_handler`
    pub fn new_handler(&self) -> Result<Shared<BehaviorEBusHandler>, CallError> {
        let method = self
            .create_handler
            .as_ref()
            .ok_or_else(|| CallError::Unsupported(format!("handlers of bus '{}'", self.name)))?;
        method.invoke_result(&mut [])
    }

    /// Disconnect a handler object through `destroy_handler`
    pub fn destroy_handler_object(&self, handler: &Shared<BehaviorEBusHandler>) -> Result<(), CallError> {
        let method = self
            .destroy_handler
            .as_ref()
            .ok_or_else(|| CallError::Unsupported(format!("handlers of bus '{}'", self.name)))?;
        method.invoke(&mut [Value::reference(handler)], None)
    }

    /// Every method owned by the bus
    pub fn methods_mut(&mut self) -> impl Iterator<Item = &mut BehaviorMethod> {
        self.get_current_id
            .iter_mut()
            .chain(self.queue_function.iter_mut())
            .chain(self.create_handler.iter_mut())
            .chain(self.destroy_handler.iter_mut())
            .chain(self.events.values_mut().flat_map(|sender| sender.methods_mut()))
    }
}

impl fmt::Debug for BehaviorEBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<&String> = self.events.keys().collect();
        events.sort();
        f.debug_struct("BehaviorEBus")
            .field("name", &self.name)
            .field("addressed", &self.is_addressed())
            .field("queued", &self.is_queued())
            .field("events", &events)
            .finish()
    }
}
