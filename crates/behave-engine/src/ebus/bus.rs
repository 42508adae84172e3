//! In-process event bus
//!
//! The reflection layer projects onto this bus; it is the collaborator that
//! actually holds handlers and delivers events. A bus is described by a
//! [`BusTraits`] type naming its handler interface and its address type:
//!
//! ```ignore
//! trait DamageEvents {
//!     fn on_damage(&mut self, amount: i32);
//! }
//!
//! struct DamageBus;
//!
//! impl BusTraits for DamageBus {
//!     type Handler = dyn DamageEvents;
//!     type Id = EntityId;
//! }
//! ```
//!
//! Handlers are snapshotted before every dispatch, so they may connect or
//! disconnect (themselves or others) while an event is being delivered.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use behave_sdk::{FromValue, IntoValue};

use crate::config::ResultPolicy;

/// Address type of a bus
pub trait BusId: Clone + PartialEq + FromValue + IntoValue + 'static {
    /// False only for [`NoId`]
    const ADDRESSED: bool = true;
}

/// Address type of broadcast-only buses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NoId;

behave_sdk::reflect_value!(NoId);

impl BusId for NoId {
    const ADDRESSED: bool = false;
}

macro_rules! impl_bus_id {
    ($($ty:ty),*) => {
        $(impl BusId for $ty {})*
    };
}

impl_bus_id!(i8, i16, i32, i64, u8, u16, u32, u64, usize, String);

/// Shape of a bus
pub trait BusTraits: 'static {
    /// Handler interface, usually a trait object
    type Handler: ?Sized + 'static;
    /// Address type, [`NoId`] for broadcast-only buses
    type Id: BusId;
}

/// Handler type of bus `B`
pub type HandlerOf<B> = <B as BusTraits>::Handler;

/// Handle returned by [`EventBus::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection(u64);

type QueuedCall = Box<dyn FnOnce()>;

struct HandlerEntry<B: BusTraits> {
    connection: Connection,
    id: Option<B::Id>,
    handler: Rc<RefCell<B::Handler>>,
}

impl<B: BusTraits> Clone for HandlerEntry<B> {
    fn clone(&self) -> Self {
        HandlerEntry {
            connection: self.connection,
            id: self.id.clone(),
            handler: Rc::clone(&self.handler),
        }
    }
}

struct BusState<B: BusTraits> {
    handlers: Vec<HandlerEntry<B>>,
    next_connection: u64,
    current_ids: Vec<B::Id>,
    queue: VecDeque<QueuedCall>,
}

struct BusShared<B: BusTraits> {
    queued: bool,
    state: RefCell<BusState<B>>,
}

/// Shared handle to a bus; clones address the same bus
pub struct EventBus<B: BusTraits>(Rc<BusShared<B>>);

impl<B: BusTraits> Clone for EventBus<B> {
    fn clone(&self) -> Self {
        EventBus(Rc::clone(&self.0))
    }
}

impl<B: BusTraits> Default for EventBus<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BusTraits> EventBus<B> {
    fn with_queue(queued: bool) -> Self {
        EventBus(Rc::new(BusShared {
            queued,
            state: RefCell::new(BusState {
                handlers: Vec::new(),
                next_connection: 0,
                current_ids: Vec::new(),
                queue: VecDeque::new(),
            }),
        }))
    }

    /// Bus delivering events immediately only
    pub fn new() -> Self {
        Self::with_queue(false)
    }

    /// Bus that also supports deferred calls
    pub fn queued() -> Self {
        Self::with_queue(true)
    }

    /// Check if deferred calls are supported
    pub fn is_queued(&self) -> bool {
        self.0.queued
    }

    /// Check if the bus is addressed by id
    pub fn is_addressed(&self) -> bool {
        B::Id::ADDRESSED
    }

    fn downgrade(&self) -> Weak<BusShared<B>> {
        Rc::downgrade(&self.0)
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Connect a handler, optionally at an address
    pub fn connect(&self, handler: Rc<RefCell<B::Handler>>, id: Option<B::Id>) -> Connection {
        let mut state = self.0.state.borrow_mut();
        let connection = Connection(state.next_connection);
        state.next_connection += 1;
        state.handlers.push(HandlerEntry { connection, id, handler });
        log::trace!("bus handler {:?} connected", connection);
        connection
    }

    /// Disconnect a handler; returns false if it was not connected
    pub fn disconnect(&self, connection: Connection) -> bool {
        let mut state = self.0.state.borrow_mut();
        let before = state.handlers.len();
        state.handlers.retain(|entry| entry.connection != connection);
        before != state.handlers.len()
    }

    /// Check if a connection is live
    pub fn is_connected(&self, connection: Connection) -> bool {
        self.0
            .state
            .borrow()
            .handlers
            .iter()
            .any(|entry| entry.connection == connection)
    }

    /// Number of connected handlers
    pub fn handler_count(&self) -> usize {
        self.0.state.borrow().handlers.len()
    }

    /// Number of handlers connected at `id`
    pub fn handler_count_at(&self, id: &B::Id) -> usize {
        self.0
            .state
            .borrow()
            .handlers
            .iter()
            .filter(|entry| entry.id.as_ref() == Some(id))
            .count()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn snapshot(&self, id: Option<&B::Id>) -> Vec<HandlerEntry<B>> {
        let state = self.0.state.borrow();
        state
            .handlers
            .iter()
            .filter(|entry| id.is_none() || entry.id.as_ref() == id)
            .cloned()
            .collect()
    }

    fn deliver<R>(&self, entry: &HandlerEntry<B>, f: &mut impl FnMut(&mut B::Handler) -> R) -> Option<R> {
        let Ok(mut handler) = entry.handler.try_borrow_mut() else {
            log::warn!("bus handler {:?} is busy, event skipped", entry.connection);
            return None;
        };
        let pushed = match &entry.id {
            Some(id) => {
                self.0.state.borrow_mut().current_ids.push(id.clone());
                true
            }
            None => false,
        };
        let output = f(&mut *handler);
        if pushed {
            self.0.state.borrow_mut().current_ids.pop();
        }
        Some(output)
    }

    /// Deliver to every handler
    pub fn broadcast(&self, mut f: impl FnMut(&mut B::Handler)) {
        for entry in self.snapshot(None) {
            self.deliver(&entry, &mut f);
        }
    }

    /// Deliver to the handlers connected at `id`
    pub fn event(&self, id: &B::Id, mut f: impl FnMut(&mut B::Handler)) {
        for entry in self.snapshot(Some(id)) {
            self.deliver(&entry, &mut f);
        }
    }

    fn aggregate<R>(
        &self,
        entries: Vec<HandlerEntry<B>>,
        policy: ResultPolicy,
        mut f: impl FnMut(&mut B::Handler) -> R,
    ) -> Option<R> {
        let mut result = None;
        for entry in entries {
            let Some(output) = self.deliver(&entry, &mut f) else {
                continue;
            };
            match policy {
                ResultPolicy::FirstResponder if result.is_some() => {}
                _ => result = Some(output),
            }
        }
        result
    }

    /// Deliver to every handler and keep one result per `policy`
    pub fn broadcast_result<R>(&self, policy: ResultPolicy, f: impl FnMut(&mut B::Handler) -> R) -> Option<R> {
        self.aggregate(self.snapshot(None), policy, f)
    }

    /// Deliver to the handlers at `id` and keep one result per `policy`
    pub fn event_result<R>(
        &self,
        id: &B::Id,
        policy: ResultPolicy,
        f: impl FnMut(&mut B::Handler) -> R,
    ) -> Option<R> {
        self.aggregate(self.snapshot(Some(id)), policy, f)
    }

    /// Address of the handler currently receiving an event
    pub fn current_id(&self) -> Option<B::Id> {
        self.0.state.borrow().current_ids.last().cloned()
    }

    // ========================================================================
    // Queue
    // ========================================================================

    fn enqueue(&self, call: QueuedCall) -> bool {
        if !self.0.queued {
            log::warn!("bus does not support queued calls");
            return false;
        }
        self.0.state.borrow_mut().queue.push_back(call);
        true
    }

    /// Defer a broadcast until [`EventBus::execute_queued`]
    pub fn queue_broadcast(&self, f: impl Fn(&mut B::Handler) + 'static) -> bool {
        let bus = self.downgrade();
        self.enqueue(Box::new(move || {
            if let Some(shared) = bus.upgrade() {
                EventBus(shared).broadcast(&f);
            }
        }))
    }

    /// Defer an addressed event until [`EventBus::execute_queued`]
    pub fn queue_event(&self, id: B::Id, f: impl Fn(&mut B::Handler) + 'static) -> bool {
        let bus = self.downgrade();
        self.enqueue(Box::new(move || {
            if let Some(shared) = bus.upgrade() {
                EventBus(shared).event(&id, &f);
            }
        }))
    }

    /// Defer an arbitrary function
    pub fn queue_function(&self, f: impl FnOnce() + 'static) -> bool {
        self.enqueue(Box::new(f))
    }

    /// Number of deferred calls waiting
    pub fn queued_len(&self) -> usize {
        self.0.state.borrow().queue.len()
    }

    /// Run the calls queued so far; calls queued while running wait for the
    /// next execution. Returns the number of calls run.
    pub fn execute_queued(&self) -> usize {
        let pending = std::mem::take(&mut self.0.state.borrow_mut().queue);
        let count = pending.len();
        for call in pending {
            call();
        }
        count
    }
}

impl<B: BusTraits> fmt::Debug for EventBus<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("EventBus")
            .field("queued", &self.0.queued)
            .field("handlers", &state.handlers.len())
            .field("pending", &state.queue.len())
            .finish()
    }
}
