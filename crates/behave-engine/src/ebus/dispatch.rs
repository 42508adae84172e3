//! Dispatch strategies for reflected bus events
//!
//! | Variant            | Argument 0 | Result                     |
//! |--------------------|------------|----------------------------|
//! | broadcast          | -          | aggregated per policy      |
//! | addressed event    | bus id     | aggregated per policy      |
//! | queued broadcast   | -          | never                      |
//! | queued event       | bus id     | never                      |

use std::marker::PhantomData;

use behave_sdk::{CallError, Typed, Value};

use super::bus::{BusTraits, EventBus};
use crate::config::ResultPolicy;
use crate::method::function::extract_arg;
use crate::method::{store_output, BusEventFn, Dispatch};

fn returns_void<B: BusTraits, M, F: BusEventFn<B::Handler, M>>() -> bool {
    <F::Output as Typed>::parameter().is_void()
}

pub(super) struct BroadcastDispatch<B: BusTraits, F, M> {
    pub(super) bus: EventBus<B>,
    pub(super) function: F,
    pub(super) policy: ResultPolicy,
    pub(super) _marker: PhantomData<fn() -> M>,
}

impl<B: BusTraits, F: BusEventFn<B::Handler, M>, M: 'static> Dispatch for BroadcastDispatch<B, F, M> {
    fn invoke(&self, args: &mut [Value], result: Option<&mut Value>) -> Result<(), CallError> {
        let extracted = F::extract(args, 0)?;
        let function = &self.function;
        match result {
            Some(slot) if !returns_void::<B, M, F>() => {
                let output = self
                    .bus
                    .broadcast_result(self.policy, |handler| function.call_handler(handler, extracted.clone()));
                match output {
                    Some(output) => store_output(output, Some(slot)),
                    None => Ok(()),
                }
            }
            _ => {
                self.bus.broadcast(|handler| {
                    function.call_handler(handler, extracted.clone());
                });
                Ok(())
            }
        }
    }
}

pub(super) struct EventDispatch<B: BusTraits, F, M> {
    pub(super) bus: EventBus<B>,
    pub(super) function: F,
    pub(super) policy: ResultPolicy,
    pub(super) _marker: PhantomData<fn() -> M>,
}

impl<B: BusTraits, F: BusEventFn<B::Handler, M>, M: 'static> Dispatch for EventDispatch<B, F, M> {
    fn invoke(&self, args: &mut [Value], result: Option<&mut Value>) -> Result<(), CallError> {
        let id = extract_arg::<B::Id>(args, 0)?;
        let extracted = F::extract(args, 1)?;
        let function = &self.function;
        match result {
            Some(slot) if !returns_void::<B, M, F>() => {
                let output = self.bus.event_result(&id, self.policy, |handler| {
                    function.call_handler(handler, extracted.clone())
                });
                match output {
                    Some(output) => store_output(output, Some(slot)),
                    None => Ok(()),
                }
            }
            _ => {
                self.bus.event(&id, |handler| {
                    function.call_handler(handler, extracted.clone());
                });
                Ok(())
            }
        }
    }
}

pub(super) struct QueueBroadcastDispatch<B: BusTraits, F, M> {
    pub(super) bus: EventBus<B>,
    pub(super) function: F,
    pub(super) _marker: PhantomData<fn() -> M>,
}

impl<B: BusTraits, F: BusEventFn<B::Handler, M>, M: 'static> Dispatch for QueueBroadcastDispatch<B, F, M> {
    fn invoke(&self, args: &mut [Value], _result: Option<&mut Value>) -> Result<(), CallError> {
        let extracted = F::extract(args, 0)?;
        let function = self.function.clone();
        let queued = self.bus.queue_broadcast(move |handler| {
            function.call_handler(handler, extracted.clone());
        });
        if queued {
            Ok(())
        } else {
            Err(CallError::Unsupported("queued broadcast".to_string()))
        }
    }
}

pub(super) struct QueueEventDispatch<B: BusTraits, F, M> {
    pub(super) bus: EventBus<B>,
    pub(super) function: F,
    pub(super) _marker: PhantomData<fn() -> M>,
}

impl<B: BusTraits, F: BusEventFn<B::Handler, M>, M: 'static> Dispatch for QueueEventDispatch<B, F, M> {
    fn invoke(&self, args: &mut [Value], _result: Option<&mut Value>) -> Result<(), CallError> {
        let id = extract_arg::<B::Id>(args, 0)?;
        let extracted = F::extract(args, 1)?;
        let function = self.function.clone();
        let queued = self.bus.queue_event(id, move |handler| {
            function.call_handler(handler, extracted.clone());
        });
        if queued {
            Ok(())
        } else {
            Err(CallError::Unsupported("queued event".to_string()))
        }
    }
}
