//! Method Dispatch Engine
//!
//! A [`BehaviorMethod`] is one reflected callable. Its parameter list always
//! starts with the result slot, followed by the receiver (member methods),
//! the bus id (addressed bus events) or the construction target
//! (constructors), then the positional arguments:
//!
//! ```text
//! parameters: [result, this?, args..]
//! arguments:          [this?, args..]      <- what callers pass
//! ```
//!
//! Calling a method:
//! 1. reject too many / too few arguments
//! 2. pad missing trailing arguments from the default values
//! 3. convert the receiver, then every argument, to the declared types
//! 4. hand the converted cells to the [`Dispatch`] strategy
//!
//! Type and arity mismatches are ordinary call failures ([`CallError`]);
//! [`BehaviorMethod::call`] reports them through `log::warn!` and returns
//! false.

mod dispatch;
pub mod function;

use std::fmt;

use behave_sdk::{Attributes, CallError, FromValue, Parameter, RegistrationError, Traits, Value};

use crate::default_value::{DefaultValue, DefaultValueSet};

pub(crate) use dispatch::store_output;
pub use function::{BusEventFn, ConstReceiver, FunctionFn, HookArgs, MemberFn, MutReceiver};

/// Callable shape of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Free function
    Free,
    /// Method with a mutable receiver
    Member,
    /// Method with a const receiver
    MemberConst,
    /// Constructor writing into its first argument
    Constructor,
    /// Bus event delivered to every handler
    EBusBroadcast,
    /// Bus event delivered to the handlers of one id
    EBusAddressed,
    /// Deferred broadcast
    EBusQueueBroadcast,
    /// Deferred addressed event
    EBusQueueAddressed,
}

impl MethodKind {
    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Free => "free",
            MethodKind::Member => "member",
            MethodKind::MemberConst => "member_const",
            MethodKind::Constructor => "constructor",
            MethodKind::EBusBroadcast => "ebus_broadcast",
            MethodKind::EBusAddressed => "ebus_addressed",
            MethodKind::EBusQueueBroadcast => "ebus_queue_broadcast",
            MethodKind::EBusQueueAddressed => "ebus_queue_addressed",
        }
    }

    /// Check if argument 0 is a receiver
    pub fn has_receiver(&self) -> bool {
        matches!(self, MethodKind::Member | MethodKind::MemberConst)
    }
}

/// Call strategy behind a method.
///
/// `args` are the already converted argument cells (receiver / id / target
/// included); `result` is the caller's result cell, if one was requested.
pub trait Dispatch {
    /// Run the native target
    fn invoke(&self, args: &mut [Value], result: Option<&mut Value>) -> Result<(), CallError>;
}

/// A reflected callable
pub struct BehaviorMethod {
    name: String,
    deprecated_name: Option<String>,
    kind: MethodKind,
    parameters: Vec<Parameter>,
    /// One slot per argument
    defaults: Vec<Option<DefaultValue>>,
    attributes: Attributes,
    report_failures: bool,
    dispatch: Box<dyn Dispatch>,
}

impl BehaviorMethod {
    /// Create a method from a parameter list (`[result, args..]`) and a
    /// dispatch strategy. An empty list declares a void method without
    /// arguments.
    pub fn new(
        name: impl Into<String>,
        kind: MethodKind,
        mut parameters: Vec<Parameter>,
        dispatch: Box<dyn Dispatch>,
    ) -> Self {
        if parameters.is_empty() {
            parameters.push(Parameter::void());
        }
        let arguments = parameters.len() - 1;
        BehaviorMethod {
            name: name.into(),
            deprecated_name: None,
            kind,
            parameters,
            defaults: vec![None; arguments],
            attributes: Attributes::new(),
            report_failures: true,
            dispatch,
        }
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deprecated alias
    pub fn deprecated_name(&self) -> Option<&str> {
        self.deprecated_name.as_deref()
    }

    /// Set the deprecated alias
    pub fn set_deprecated_name(&mut self, name: impl Into<String>) {
        self.deprecated_name = Some(name.into());
    }

    /// Callable shape
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Full parameter list, result slot first
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Result slot
    pub fn result(&self) -> &Parameter {
        &self.parameters[0]
    }

    /// Check if the method produces a value
    pub fn has_result(&self) -> bool {
        !self.parameters[0].is_void()
    }

    /// Argument shapes (receiver / id included)
    pub fn arguments(&self) -> &[Parameter] {
        &self.parameters[1..]
    }

    /// Shape of argument `index`
    pub fn argument(&self, index: usize) -> Option<&Parameter> {
        self.parameters.get(index + 1)
    }

    /// Check if argument 0 is a receiver
    pub fn is_member(&self) -> bool {
        self.kind.has_receiver()
    }

    /// Check if the receiver is const
    pub fn is_const(&self) -> bool {
        self.kind == MethodKind::MemberConst
    }

    /// Number of arguments a full call takes
    pub fn num_arguments(&self) -> usize {
        self.parameters.len() - 1
    }

    /// Arguments that have no default value, counted from the end
    pub fn min_arguments(&self) -> usize {
        let optional = self.defaults.iter().rev().take_while(|d| d.is_some()).count();
        self.num_arguments() - optional
    }

    /// Default value of argument `index`
    pub fn get_default(&self, index: usize) -> Option<&DefaultValue> {
        self.defaults.get(index)?.as_ref()
    }

    /// Attribute bag
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Mutable attribute bag
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Toggle reporting of failed calls through the log
    pub fn set_report_failures(&mut self, report: bool) {
        self.report_failures = report;
    }

    /// Name argument `index`
    pub fn set_argument_name(&mut self, index: usize, name: impl Into<String>) -> bool {
        match self.parameters.get_mut(index + 1) {
            Some(parameter) => {
                parameter.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Attach a tooltip to argument `index`
    pub fn set_argument_tooltip(&mut self, index: usize, tooltip: impl Into<String>) -> bool {
        match self.parameters.get_mut(index + 1) {
            Some(parameter) => {
                parameter.tooltip = Some(tooltip.into());
                true
            }
            None => false,
        }
    }

    /// Name the trailing arguments, last name to last argument
    pub fn set_parameter_names(&mut self, names: &[&str]) {
        let arguments = self.num_arguments();
        let skip = arguments.saturating_sub(names.len());
        let skip_names = names.len().saturating_sub(arguments);
        for (offset, name) in names.iter().skip(skip_names).enumerate() {
            self.set_argument_name(skip + offset, *name);
        }
    }

    // ========================================================================
    // Default values
    // ========================================================================

    /// Attach a default to argument `index`.
    ///
    /// Defaults must be filled from the last argument backward; a default
    /// that would leave an argument without one after it is rejected.
    pub fn set_default_value(&mut self, index: usize, value: DefaultValue) -> Result<(), RegistrationError> {
        let parameter = self
            .argument(index)
            .ok_or(RegistrationError::DefaultValueIndex(index))?;
        if parameter.is_this() {
            return Err(RegistrationError::DefaultValueIndex(index));
        }
        if parameter.type_key != value.type_key() {
            return Err(RegistrationError::DefaultValueType {
                index,
                expected: parameter.type_key,
                actual: value.type_key(),
            });
        }
        if index + 1 < self.defaults.len() && self.defaults[index + 1].is_none() {
            return Err(RegistrationError::DefaultValueGap(index));
        }
        self.defaults[index] = Some(value);
        Ok(())
    }

    /// Attach a set of defaults to the trailing arguments. Nothing is
    /// attached if any of them is rejected.
    pub fn set_default_values(&mut self, set: &DefaultValueSet) -> Result<(), RegistrationError> {
        let arguments = self.num_arguments();
        if set.len() > arguments {
            return Err(RegistrationError::DefaultValueIndex(set.len() - 1));
        }
        let first = arguments - set.len();
        for (offset, value) in set.iter().enumerate() {
            let index = first + offset;
            let parameter = &self.parameters[index + 1];
            if parameter.is_this() {
                return Err(RegistrationError::DefaultValueIndex(index));
            }
            if parameter.type_key != value.type_key() {
                return Err(RegistrationError::DefaultValueType {
                    index,
                    expected: parameter.type_key,
                    actual: value.type_key(),
                });
            }
        }
        for (offset, value) in set.iter().enumerate().rev() {
            self.set_default_value(first + offset, value.clone())?;
        }
        Ok(())
    }

    // ========================================================================
    // Calling
    // ========================================================================

    /// Call with live argument cells.
    ///
    /// Missing trailing arguments are filled from the default values in a
    /// call-local buffer; the caller's cells are moved back afterwards.
    pub fn invoke(&self, args: &mut [Value], result: Option<&mut Value>) -> Result<(), CallError> {
        let total = self.num_arguments();
        if args.len() > total {
            return Err(CallError::TooManyArguments {
                expected: total,
                got: args.len(),
            });
        }
        let required = self.min_arguments();
        if args.len() < required {
            return Err(CallError::InsufficientArguments {
                expected: required,
                got: args.len(),
            });
        }
        if args.len() == total {
            return self.convert_and_dispatch(args, result);
        }

        let supplied = args.len();
        let mut buffer: Vec<Value> = Vec::with_capacity(total);
        buffer.extend(args.iter_mut().map(std::mem::take));
        for index in supplied..total {
            match self.get_default(index) {
                Some(default) => buffer.push(default.to_value()),
                None => {
                    for (slot, cell) in args.iter_mut().zip(buffer) {
                        *slot = cell;
                    }
                    return Err(CallError::InsufficientArguments {
                        expected: index + 1,
                        got: supplied,
                    });
                }
            }
        }

        let outcome = self.convert_and_dispatch(&mut buffer, result);
        for (slot, cell) in args.iter_mut().zip(buffer) {
            *slot = cell;
        }
        outcome
    }

    fn convert_and_dispatch(&self, args: &mut [Value], result: Option<&mut Value>) -> Result<(), CallError> {
        for (index, (cell, parameter)) in args.iter_mut().zip(self.arguments()).enumerate() {
            let actual = cell.type_key();
            if cell.convert_to(parameter.type_key) {
                // `Shared<T>` arguments alias the caller's storage directly,
                // which a projected view cannot provide.
                if cell.is_projected() && parameter.traits.contains(Traits::REFERENCE) && !parameter.is_this() {
                    cell.convert_to(actual);
                    return Err(CallError::ArgumentMismatch {
                        index,
                        expected: parameter.type_key,
                        actual,
                    });
                }
                continue;
            }
            if parameter.is_this() {
                return Err(CallError::InvalidThis {
                    expected: parameter.type_key,
                    actual: cell.type_key(),
                });
            }
            return Err(CallError::ArgumentMismatch {
                index,
                expected: parameter.type_key,
                actual: cell.type_key(),
            });
        }
        self.dispatch.invoke(args, result)
    }

    /// Call and report failures through the warning channel
    pub fn call(&self, args: &mut [Value], result: Option<&mut Value>) -> bool {
        match self.invoke(args, result) {
            Ok(()) => true,
            Err(err) => {
                if self.report_failures {
                    log::warn!("call to '{}' failed: {}", self.name, err);
                }
                false
            }
        }
    }

    /// Call and extract the result as `R`
    pub fn invoke_result<R: FromValue>(&self, args: &mut [Value]) -> Result<R, CallError> {
        let mut result = Value::for_parameter(&R::parameter());
        self.invoke(args, Some(&mut result))?;
        R::from_value(&result).map_err(|_| CallError::ResultMismatch {
            expected: R::parameter().type_key,
            produced: result.type_key(),
        })
    }

    /// Human readable signature, e.g. `Add(a: i32, b: i32 = ..) -> i32`
    pub fn signature(&self) -> String {
        let arguments: Vec<String> = self
            .arguments()
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                if self.get_default(index).is_some() {
                    format!("{} = ..", parameter.describe())
                } else {
                    parameter.describe()
                }
            })
            .collect();
        let mut signature = format!("{}({})", self.name, arguments.join(", "));
        if self.has_result() {
            signature.push_str(" -> ");
            signature.push_str(&self.result().describe());
        }
        signature
    }
}

impl fmt::Debug for BehaviorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorMethod")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("signature", &self.signature())
            .field("min_arguments", &self.min_arguments())
            .finish()
    }
}
