//! Typed native callables
//!
//! Closures and fn items of up to eight arguments are adapted to the
//! homogeneous `&[Value]` calling convention through these traits. The
//! `Marker` parameter is the callable's signature (`fn(A, B) -> R`); it only
//! exists so that one impl per arity can coexist.
//!
//! | Trait         | Shape                              |
//! |---------------|------------------------------------|
//! | `FunctionFn`  | `Fn(A..) -> R`                     |
//! | `MemberFn`    | `Fn(&C, A..) -> R` / `Fn(&mut C, A..) -> R` |
//! | `BusEventFn`  | `Fn(&mut H, A..) -> R`             |
//! | `HookArgs`    | `(A..)` tuples sent to forwarders  |

use std::any::Any;

use behave_sdk::{AccessError, CallError, FromValue, IntoValue, Parameter, Traits, Value};

/// Marker for `&C` receivers
pub struct ConstReceiver;

/// Marker for `&mut C` receivers
pub struct MutReceiver;

/// Free function
pub trait FunctionFn<Marker>: 'static {
    /// Argument tuple
    type Args: 'static;
    /// Return type
    type Output: IntoValue;

    /// `[result, args..]`
    fn parameters() -> Vec<Parameter>;

    /// Read the argument tuple from `args[offset..]`
    fn extract(args: &[Value], offset: usize) -> Result<Self::Args, CallError>;

    /// Call with an extracted tuple
    fn call(&self, args: Self::Args) -> Self::Output;
}

/// Method taking a `C` receiver
pub trait MemberFn<C, Marker>: 'static {
    /// Argument tuple (receiver excluded)
    type Args: 'static;
    /// Return type
    type Output: IntoValue;
    /// Receiver is borrowed immutably
    const IS_CONST: bool;

    /// `[result, args..]`, receiver excluded
    fn parameters() -> Vec<Parameter>;

    /// Read the argument tuple from `args[offset..]`
    fn extract(args: &[Value], offset: usize) -> Result<Self::Args, CallError>;

    /// Borrow the receiver out of `this` and call
    fn call_on(&self, this: &mut Value, args: Self::Args) -> Result<Self::Output, CallError>;
}

/// Event function invoked on every handler of a bus
pub trait BusEventFn<H: ?Sized, Marker>: Clone + 'static {
    /// Argument tuple
    type Args: Clone + 'static;
    /// Return type
    type Output: IntoValue;

    /// `[result, args..]`
    fn parameters() -> Vec<Parameter>;

    /// Read the argument tuple from `args[offset..]`
    fn extract(args: &[Value], offset: usize) -> Result<Self::Args, CallError>;

    /// Deliver to one handler
    fn call_handler(&self, handler: &mut H, args: Self::Args) -> Self::Output;
}

/// Argument tuples sent through a handler forwarder
pub trait HookArgs: Sized + 'static {
    /// Argument shapes in order
    fn parameters() -> Vec<Parameter>;

    /// Pack into argument cells
    fn into_values(self) -> Vec<Value>;

    /// Unpack from argument cells
    fn from_values(values: &[Value]) -> Result<Self, CallError>;
}

/// Read argument `index` as `A`
pub fn extract_arg<A: FromValue>(args: &[Value], index: usize) -> Result<A, CallError> {
    let cell = args.get(index).ok_or(CallError::InsufficientArguments {
        expected: index + 1,
        got: args.len(),
    })?;
    A::from_value(cell).map_err(|source| match source {
        AccessError::Null => CallError::NullArgument { index },
        source => CallError::Access { index, source },
    })
}

fn receiver_parameter<C: Any>(is_const: bool) -> Parameter {
    let traits = if is_const {
        Traits::THIS_PTR | Traits::REFERENCE | Traits::CONST
    } else {
        Traits::THIS_PTR | Traits::REFERENCE
    };
    Parameter::of::<C>().named("this").with_traits(traits)
}

/// Shape of the receiver slot of a member function
pub fn this_parameter<C: Any, M, F: MemberFn<C, M>>() -> Parameter {
    receiver_parameter::<C>(F::IS_CONST)
}

fn receiver_error(source: AccessError) -> CallError {
    CallError::Access { index: 0, source }
}

macro_rules! impl_callables {
    ($($A:ident),*) => {
        impl<F, R, $($A,)*> FunctionFn<fn($($A,)*) -> R> for F
        where
            F: Fn($($A),*) -> R + 'static,
            R: IntoValue,
            $($A: FromValue,)*
        {
            type Args = ($($A,)*);
            type Output = R;

            fn parameters() -> Vec<Parameter> {
                vec![R::parameter(), $($A::parameter(),)*]
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn extract(args: &[Value], offset: usize) -> Result<Self::Args, CallError> {
                let mut index = offset;
                Ok(($({
                    let value = extract_arg::<$A>(args, index)?;
                    index += 1;
                    value
                },)*))
            }

            #[allow(non_snake_case)]
            fn call(&self, args: Self::Args) -> R {
                let ($($A,)*) = args;
                self($($A),*)
            }
        }

        impl<F, C, R, $($A,)*> MemberFn<C, (ConstReceiver, fn($($A,)*) -> R)> for F
        where
            F: Fn(&C, $($A),*) -> R + 'static,
            C: Any,
            R: IntoValue,
            $($A: FromValue,)*
        {
            type Args = ($($A,)*);
            type Output = R;
            const IS_CONST: bool = true;

            fn parameters() -> Vec<Parameter> {
                vec![R::parameter(), $($A::parameter(),)*]
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn extract(args: &[Value], offset: usize) -> Result<Self::Args, CallError> {
                let mut index = offset;
                Ok(($({
                    let value = extract_arg::<$A>(args, index)?;
                    index += 1;
                    value
                },)*))
            }

            #[allow(non_snake_case)]
            fn call_on(&self, this: &mut Value, args: Self::Args) -> Result<R, CallError> {
                let ($($A,)*) = args;
                this.try_with_ref(|receiver| {
                    receiver.downcast_ref::<C>().map(|receiver| self(receiver, $($A),*))
                })
                .map_err(receiver_error)?
                .ok_or(receiver_error(AccessError::TypeMismatch))
            }
        }

        impl<F, C, R, $($A,)*> MemberFn<C, (MutReceiver, fn($($A,)*) -> R)> for F
        where
            F: Fn(&mut C, $($A),*) -> R + 'static,
            C: Any,
            R: IntoValue,
            $($A: FromValue,)*
        {
            type Args = ($($A,)*);
            type Output = R;
            const IS_CONST: bool = false;

            fn parameters() -> Vec<Parameter> {
                vec![R::parameter(), $($A::parameter(),)*]
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn extract(args: &[Value], offset: usize) -> Result<Self::Args, CallError> {
                let mut index = offset;
                Ok(($({
                    let value = extract_arg::<$A>(args, index)?;
                    index += 1;
                    value
                },)*))
            }

            #[allow(non_snake_case)]
            fn call_on(&self, this: &mut Value, args: Self::Args) -> Result<R, CallError> {
                let ($($A,)*) = args;
                this.try_with_mut(|receiver| {
                    receiver.downcast_mut::<C>().map(|receiver| self(receiver, $($A),*))
                })
                .map_err(receiver_error)?
                .ok_or(receiver_error(AccessError::TypeMismatch))
            }
        }

        impl<F, H, R, $($A,)*> BusEventFn<H, fn($($A,)*) -> R> for F
        where
            F: Fn(&mut H, $($A),*) -> R + Clone + 'static,
            H: ?Sized,
            R: IntoValue,
            $($A: FromValue + Clone,)*
        {
            type Args = ($($A,)*);
            type Output = R;

            fn parameters() -> Vec<Parameter> {
                vec![R::parameter(), $($A::parameter(),)*]
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn extract(args: &[Value], offset: usize) -> Result<Self::Args, CallError> {
                let mut index = offset;
                Ok(($({
                    let value = extract_arg::<$A>(args, index)?;
                    index += 1;
                    value
                },)*))
            }

            #[allow(non_snake_case)]
            fn call_handler(&self, handler: &mut H, args: Self::Args) -> R {
                let ($($A,)*) = args;
                self(handler, $($A),*)
            }
        }

        impl<$($A,)*> HookArgs for ($($A,)*)
        where
            $($A: FromValue + IntoValue,)*
        {
            fn parameters() -> Vec<Parameter> {
                vec![$($A::parameter(),)*]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($A,)*) = self;
                vec![$(Value::new($A),)*]
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn from_values(values: &[Value]) -> Result<Self, CallError> {
                let mut index = 0;
                Ok(($({
                    let value = extract_arg::<$A>(values, index)?;
                    index += 1;
                    value
                },)*))
            }
        }
    };
}

impl_callables!();
impl_callables!(A0);
impl_callables!(A0, A1);
impl_callables!(A0, A1, A2);
impl_callables!(A0, A1, A2, A3);
impl_callables!(A0, A1, A2, A3, A4);
impl_callables!(A0, A1, A2, A3, A4, A5);
impl_callables!(A0, A1, A2, A3, A4, A5, A6);
impl_callables!(A0, A1, A2, A3, A4, A5, A6, A7);
