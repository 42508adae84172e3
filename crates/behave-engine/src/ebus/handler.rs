//! Bus handlers driven by foreign code
//!
//! A host that cannot implement a bus's handler trait directly (a script
//! VM, a visual graph) asks the reflected bus for a handler object. The
//! handler forwards every event it receives to a [`BusForwarder`], where
//! the host installs one hook per event:
//!
//! - a typed hook: any closure whose signature matches the event exactly
//! - a generic hook: one callback receiving the event name, index, result
//!   cell and argument cells
//!
//! Events without a hook are silently ignored.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use behave_sdk::{CallError, FromValue, Parameter, RegistrationError, Traits, TypeKey, Typed, Value};
use rustc_hash::FxHashMap;

use super::bus::{BusId, BusTraits, Connection, EventBus};
use crate::method::{store_output, FunctionFn, HookArgs};

/// Generic hook: `(user_data, event_name, event_index, result, arguments)`
pub type GenericHook = Rc<dyn Fn(Option<&dyn Any>, &str, usize, Option<&mut Value>, &mut [Value])>;

type ErasedHook = Rc<dyn Fn(&mut [Value], Option<&mut Value>) -> Result<(), CallError>>;

#[derive(Clone)]
enum ForwarderHook {
    Typed {
        /// `Rc<dyn Fn(Args) -> Output>` for the fast path
        direct: Rc<dyn Any>,
        erased: ErasedHook,
    },
    Generic {
        callback: GenericHook,
        user_data: Option<Rc<dyn Any>>,
    },
}

// ============================================================================
// Event declarations
// ============================================================================

/// Declared signature of one forwarder event
#[derive(Debug, Clone)]
pub struct HandlerEvent {
    name: String,
    result: Parameter,
    arguments: Vec<Parameter>,
}

impl HandlerEvent {
    /// Declare an event taking `A` and returning `R`
    pub fn declare<A: HookArgs, R: Typed>(name: impl Into<String>) -> Self {
        HandlerEvent {
            name: name.into(),
            result: R::parameter(),
            arguments: A::parameters(),
        }
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One event slot of a forwarder
pub struct BusForwarderEvent {
    name: String,
    event_id: u32,
    /// `[result, user_data, args..]`
    parameters: Vec<Parameter>,
    hook: RefCell<Option<ForwarderHook>>,
}

impl BusForwarderEvent {
    fn new(event: &HandlerEvent) -> Self {
        let mut parameters = Vec::with_capacity(event.arguments.len() + 2);
        parameters.push(event.result.clone());
        parameters.push(Parameter::void().named("userData").with_traits(Traits::POINTER));
        parameters.extend(event.arguments.iter().cloned());
        BusForwarderEvent {
            name: event.name.clone(),
            event_id: crc32fast::hash(event.name.as_bytes()),
            parameters,
            hook: RefCell::new(None),
        }
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// CRC32 of the name
    pub fn event_id(&self) -> u32 {
        self.event_id
    }

    /// Full shape: result, user data, then arguments
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Result shape
    pub fn result(&self) -> &Parameter {
        &self.parameters[0]
    }

    /// Argument shapes
    pub fn arguments(&self) -> &[Parameter] {
        &self.parameters[2..]
    }

    /// Check if any hook is installed
    pub fn has_hook(&self) -> bool {
        self.hook.borrow().is_some()
    }

    /// Check if the installed hook is the generic form
    pub fn is_generic(&self) -> bool {
        matches!(*self.hook.borrow(), Some(ForwarderHook::Generic { .. }))
    }

    /// User data attached with a generic hook
    pub fn user_data(&self) -> Option<Rc<dyn Any>> {
        match &*self.hook.borrow() {
            Some(ForwarderHook::Generic { user_data, .. }) => user_data.clone(),
            _ => None,
        }
    }
}

impl fmt::Debug for BusForwarderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusForwarderEvent")
            .field("name", &self.name)
            .field("event_id", &self.event_id)
            .field("hooked", &self.has_hook())
            .finish()
    }
}

// ============================================================================
// Forwarder
// ============================================================================

/// Event table of one handler instance
pub struct BusForwarder {
    events: Vec<BusForwarderEvent>,
    by_name: FxHashMap<String, usize>,
}

fn read_result<R: FromValue>(cell: &Value) -> Result<Option<R>, CallError> {
    if cell.is_null() && !cell.traits().contains(Traits::POINTER) {
        return Ok(None);
    }
    R::from_value(cell)
        .map(Some)
        .map_err(|source| CallError::Access { index: 0, source })
}

fn check_arguments(event: &BusForwarderEvent, supplied: &[Parameter]) -> Result<(), CallError> {
    let declared = event.arguments();
    if supplied.len() > declared.len() {
        return Err(CallError::TooManyArguments {
            expected: declared.len(),
            got: supplied.len(),
        });
    }
    if supplied.len() < declared.len() {
        return Err(CallError::InsufficientArguments {
            expected: declared.len(),
            got: supplied.len(),
        });
    }
    match declared.iter().zip(supplied).position(|(d, s)| d.type_key != s.type_key) {
        Some(index) => Err(CallError::ArgumentMismatch {
            index,
            expected: declared[index].type_key,
            actual: supplied[index].type_key,
        }),
        None => Ok(()),
    }
}

impl BusForwarder {
    /// Build an event table from declarations
    pub fn new(events: &[HandlerEvent]) -> Self {
        let events: Vec<BusForwarderEvent> = events.iter().map(BusForwarderEvent::new).collect();
        let by_name = events
            .iter()
            .enumerate()
            .map(|(index, event)| (event.name.clone(), index))
            .collect();
        BusForwarder { events, by_name }
    }

    /// Ordered event table
    pub fn events(&self) -> &[BusForwarderEvent] {
        &self.events
    }

    /// Index of a named event
    pub fn event_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    fn event(&self, index: usize) -> Result<&BusForwarderEvent, RegistrationError> {
        self.events
            .get(index)
            .ok_or_else(|| RegistrationError::UnknownEvent(format!("#{}", index)))
    }

    fn index_of(&self, name: &str) -> Result<usize, RegistrationError> {
        self.event_index(name)
            .ok_or_else(|| RegistrationError::UnknownEvent(name.to_string()))
    }

    /// Install a typed hook; its signature must match the event exactly
    pub fn install_hook<M: 'static, F: FunctionFn<M>>(&self, index: usize, hook: F) -> Result<(), RegistrationError> {
        let event = self.event(index)?;
        let shape = F::parameters();
        let expected: Vec<TypeKey> = std::iter::once(event.result().type_key)
            .chain(event.arguments().iter().map(|p| p.type_key))
            .collect();
        let actual: Vec<TypeKey> = shape.iter().map(|p| p.type_key).collect();
        if expected.len() != actual.len() {
            return Err(RegistrationError::HookSignature {
                event: event.name.clone(),
                reason: format!("expected {} arguments, got {}", expected.len() - 1, actual.len() - 1),
            });
        }
        if let Some(position) = expected.iter().zip(&actual).position(|(e, a)| e != a) {
            let what = if position == 0 {
                "result".to_string()
            } else {
                format!("argument {}", position - 1)
            };
            return Err(RegistrationError::HookSignature {
                event: event.name.clone(),
                reason: format!("{}: expected {}, got {}", what, expected[position], actual[position]),
            });
        }

        let hook = Rc::new(hook);
        let typed = Rc::clone(&hook);
        let direct: Rc<dyn Fn(F::Args) -> F::Output> = Rc::new(move |args| typed.call(args));
        let erased: ErasedHook = Rc::new(move |args: &mut [Value], result: Option<&mut Value>| {
            let extracted = F::extract(args, 0)?;
            store_output(hook.call(extracted), result)
        });
        *event.hook.borrow_mut() = Some(ForwarderHook::Typed {
            direct: Rc::new(direct),
            erased,
        });
        log::debug!("typed hook installed on '{}'", event.name);
        Ok(())
    }

    /// Install a typed hook by event name
    pub fn install_hook_by_name<M: 'static, F: FunctionFn<M>>(&self, name: &str, hook: F) -> Result<(), RegistrationError> {
        self.install_hook(self.index_of(name)?, hook)
    }

    /// Install a generic hook
    pub fn install_generic_hook(
        &self,
        index: usize,
        callback: impl Fn(Option<&dyn Any>, &str, usize, Option<&mut Value>, &mut [Value]) + 'static,
        user_data: Option<Rc<dyn Any>>,
    ) -> Result<(), RegistrationError> {
        let event = self.event(index)?;
        *event.hook.borrow_mut() = Some(ForwarderHook::Generic {
            callback: Rc::new(callback),
            user_data,
        });
        log::debug!("generic hook installed on '{}'", event.name);
        Ok(())
    }

    /// Install a generic hook by event name
    pub fn install_generic_hook_by_name(
        &self,
        name: &str,
        callback: impl Fn(Option<&dyn Any>, &str, usize, Option<&mut Value>, &mut [Value]) + 'static,
        user_data: Option<Rc<dyn Any>>,
    ) -> Result<(), RegistrationError> {
        self.install_generic_hook(self.index_of(name)?, callback, user_data)
    }

    /// Remove the hook of an event
    pub fn remove_hook(&self, index: usize) -> bool {
        match self.events.get(index) {
            Some(event) => event.hook.borrow_mut().take().is_some(),
            None => false,
        }
    }

    /// Forward an event, discarding any result
    pub fn call<A: HookArgs>(&self, index: usize, args: A) -> Result<(), CallError> {
        self.call_result::<(), A>(index, args).map(|_| ())
    }

    /// Forward an event and read back its result.
    ///
    /// Returns `Ok(None)` when no hook is installed or the hook produced
    /// nothing.
    pub fn call_result<R, A>(&self, index: usize, args: A) -> Result<Option<R>, CallError>
    where
        R: FromValue,
        A: HookArgs,
    {
        let event = self
            .events
            .get(index)
            .ok_or_else(|| CallError::Unsupported(format!("forwarder event #{}", index)))?;
        // Cloned out so the hook may reinstall itself.
        let hook = event.hook.borrow().clone();
        match hook {
            None => Ok(None),
            Some(ForwarderHook::Typed { direct, erased }) => {
                if let Some(direct) = direct.downcast_ref::<Rc<dyn Fn(A) -> R>>() {
                    return Ok(Some(direct(args)));
                }
                let mut cells = args.into_values();
                let mut result = Value::for_parameter(&R::parameter());
                erased(&mut cells, Some(&mut result))?;
                read_result(&result)
            }
            Some(ForwarderHook::Generic { callback, user_data }) => {
                // Generic hooks read the cells by the declared shape.
                check_arguments(event, &A::parameters())?;
                let mut cells = args.into_values();
                let mut result = Value::for_parameter(event.result());
                callback(user_data.as_deref(), &event.name, index, Some(&mut result), &mut cells);
                read_result(&result)
            }
        }
    }

    /// Forward an event by name
    pub fn call_by_name<A: HookArgs>(&self, name: &str, args: A) -> Result<(), CallError> {
        let index = self
            .event_index(name)
            .ok_or_else(|| CallError::Unsupported(format!("forwarder event '{}'", name)))?;
        self.call(index, args)
    }
}

impl fmt::Debug for BusForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.events.iter()).finish()
    }
}

// ============================================================================
// Handler object
// ============================================================================

/// Connects a handler instance to its bus
pub trait HandlerConnector {
    /// Connect, at `id` for addressed buses
    fn connect(&mut self, id: Option<&Value>) -> Result<(), CallError>;
    /// Disconnect if connected
    fn disconnect(&mut self);
    /// Check if connected
    fn is_connected(&self) -> bool;
}

pub(crate) struct BusConnector<B: BusTraits> {
    bus: EventBus<B>,
    handler: Rc<RefCell<B::Handler>>,
    connection: Option<Connection>,
}

impl<B: BusTraits> BusConnector<B> {
    pub(crate) fn new(bus: EventBus<B>, handler: Rc<RefCell<B::Handler>>) -> Self {
        BusConnector {
            bus,
            handler,
            connection: None,
        }
    }
}

impl<B: BusTraits> HandlerConnector for BusConnector<B> {
    fn connect(&mut self, id: Option<&Value>) -> Result<(), CallError> {
        let id = if <B::Id as BusId>::ADDRESSED {
            let cell = id.ok_or(CallError::InsufficientArguments { expected: 1, got: 0 })?;
            let id = B::Id::from_value(cell).map_err(|source| CallError::Access { index: 0, source })?;
            Some(id)
        } else {
            None
        };
        self.disconnect();
        self.connection = Some(self.bus.connect(Rc::clone(&self.handler), id));
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.bus.disconnect(connection);
        }
    }

    fn is_connected(&self) -> bool {
        self.connection
            .is_some_and(|connection| self.bus.is_connected(connection))
    }
}

impl<B: BusTraits> Drop for BusConnector<B> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Handler object handed to foreign code by a reflected bus
pub struct BehaviorEBusHandler {
    forwarder: Rc<BusForwarder>,
    connector: Box<dyn HandlerConnector>,
}

impl BehaviorEBusHandler {
    /// Pair a forwarder with the connector of its handler
    pub fn new(forwarder: Rc<BusForwarder>, connector: Box<dyn HandlerConnector>) -> Self {
        BehaviorEBusHandler { forwarder, connector }
    }

    /// Event table
    pub fn forwarder(&self) -> &Rc<BusForwarder> {
        &self.forwarder
    }

    /// Declared events
    pub fn events(&self) -> &[BusForwarderEvent] {
        self.forwarder.events()
    }

    /// Index of a named event
    pub fn event_index(&self, name: &str) -> Option<usize> {
        self.forwarder.event_index(name)
    }

    /// See [`BusForwarder::install_hook`]
    pub fn install_hook<M: 'static, F: FunctionFn<M>>(&self, index: usize, hook: F) -> Result<(), RegistrationError> {
        self.forwarder.install_hook(index, hook)
    }

    /// See [`BusForwarder::install_generic_hook`]
    pub fn install_generic_hook(
        &self,
        index: usize,
        callback: impl Fn(Option<&dyn Any>, &str, usize, Option<&mut Value>, &mut [Value]) + 'static,
        user_data: Option<Rc<dyn Any>>,
    ) -> Result<(), RegistrationError> {
        self.forwarder.install_generic_hook(index, callback, user_data)
    }

    /// Connect to the bus; `id` is required for addressed buses
    pub fn connect(&mut self, id: Option<&Value>) -> bool {
        match self.connector.connect(id) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("handler connect failed: {}", err);
                false
            }
        }
    }

    /// Disconnect from the bus
    pub fn disconnect(&mut self) {
        self.connector.disconnect();
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connector.is_connected()
    }
}

// Passed around as `Shared<BehaviorEBusHandler>`, never by value.
impl Typed for BehaviorEBusHandler {
    fn parameter() -> Parameter {
        Parameter::of::<BehaviorEBusHandler>()
    }
}

impl fmt::Debug for BehaviorEBusHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorEBusHandler")
            .field("events", &self.forwarder)
            .field("connected", &self.is_connected())
            .finish()
    }
}
