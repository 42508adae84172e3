//! Behave Reflection Engine
//!
//! This crate exposes native Rust functions, types and event buses to
//! scripting and tooling layers:
//! - **Methods**: type-erased callables with default arguments (`method` module)
//! - **Properties**: getter/setter pairs (`property` module)
//! - **Classes**: lifecycle hooks, constructors and members of a native type (`class` module)
//! - **Event buses**: broadcast/addressed/queued events and handler hooks (`ebus` module)
//! - **Context**: the registry and its builder DSL (`context` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use behave_engine::{BehaviorContext, DefaultValueSet, Value};
//!
//! let mut context = BehaviorContext::new();
//! context
//!     .method("Clamp", |v: i32, lo: i32, hi: i32| v.clamp(lo, hi))
//!     .defaults(DefaultValueSet::new().with(0i32).with(100i32))
//!     .finish()?;
//!
//! let clamp = context.find_method("Clamp").unwrap();
//! let value: i32 = clamp.invoke_result(&mut [Value::new(150i32)])?;
//! assert_eq!(value, 100);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(clippy::type_complexity)]

// ============================================================================
// Core Modules
// ============================================================================

/// Shared default argument values
pub mod default_value;

/// Type-erased callables
pub mod method;

/// Getter/setter pairs
pub mod property;

/// Reflected native types
pub mod class;

/// Event buses and handler hooks
pub mod ebus;

// ============================================================================
// Registry
// ============================================================================

/// Context settings
pub mod config;

/// The reflection registry and its builder DSL
pub mod context;

/// Serializable description of a context
pub mod manifest;

// ============================================================================
// Re-exports
// ============================================================================

pub use class::{BehaviorClass, BehaviorObject, ClassHooks};
pub use config::{BehaviorConfig, ConfigError, ResultPolicy};
pub use context::{
    BehaviorContext, BehaviorContextEvents, ClassBuilder, EBusBuilder, MethodBuilder, PropertyBuilder,
};
pub use default_value::{DefaultValue, DefaultValueSet};
pub use ebus::{
    BehaviorEBus, BehaviorEBusEventSender, BehaviorEBusHandler, BusForwarder, BusId, BusTraits, Connection,
    EventBus, HandlerConnector, HandlerEvent, HandlerOf, NoId, QueuedFunction, VirtualProperty,
};
pub use manifest::Manifest;
pub use method::{BehaviorMethod, FunctionFn, MemberFn, MethodKind};
pub use property::BehaviorProperty;

pub use behave_sdk::{
    attributes, reflect_value, AccessError, Attributes, CallError, FromValue, IntoValue, Parameter, Projection,
    RegistrationError, Rtti, RttiHelper, Shared, Traits, TypeKey, Typed, Value,
};
