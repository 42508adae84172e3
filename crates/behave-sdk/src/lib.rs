//! Behave SDK - value cells and conversion traits for the behave reflection runtime
//!
//! This crate holds the types shared by everything that crosses a reflected
//! call boundary, without depending on the registry in `behave-engine`:
//!
//! - [`TypeKey`], [`Traits`] and [`Parameter`] describe signature slots
//! - [`Value`] is the live argument / result cell, [`Shared`] the caller
//!   storage a cell can alias
//! - [`RttiHelper`] lists the upcasts of a concrete type
//! - [`Typed`], [`FromValue`] and [`IntoValue`] move Rust values in and out
//!   of cells
//!
//! # Example
//!
//! ```ignore
//! use behave_sdk::{reflect_value, Value};
//!
//! #[derive(Clone)]
//! struct Vector3 { x: f32, y: f32, z: f32 }
//!
//! reflect_value!(Vector3);
//!
//! let cell = Value::new(Vector3 { x: 0.0, y: 1.0, z: 0.0 });
//! let back: Vector3 = cell.extract()?;
//! ```

#![warn(missing_docs)]

pub mod attributes;
pub mod convert;
pub mod error;
pub mod rtti;
pub mod types;
pub mod value;

pub use attributes::{Attributes, ExcludeFrom};
pub use convert::{FromValue, IntoValue, Typed};
pub use error::{AccessError, CallError, CallResult, RegistrationError};
pub use rtti::{Cast, Projection, Rtti, RttiBuilder, RttiHelper};
pub use types::{Parameter, Traits, TypeKey};
pub use value::{OnAssigned, Shared, Value};
