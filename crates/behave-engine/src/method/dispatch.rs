//! Dispatch strategies for free functions, member functions and constructors

use std::any::Any;
use std::marker::PhantomData;

use behave_sdk::{CallError, IntoValue, Parameter, Traits, Value};

use super::function::{this_parameter, FunctionFn, MemberFn};
use super::{BehaviorMethod, Dispatch, MethodKind};

/// Store a native return value into the caller's result cell, if any
pub(crate) fn store_output<R: IntoValue>(output: R, result: Option<&mut Value>) -> Result<(), CallError> {
    let Some(slot) = result else {
        return Ok(());
    };
    if output.into_value(slot) {
        Ok(())
    } else {
        Err(CallError::ResultMismatch {
            expected: slot.type_key(),
            produced: R::parameter().type_key,
        })
    }
}

struct FreeDispatch<F, M> {
    function: F,
    _marker: PhantomData<fn() -> M>,
}

impl<F: FunctionFn<M>, M: 'static> Dispatch for FreeDispatch<F, M> {
    fn invoke(&self, args: &mut [Value], result: Option<&mut Value>) -> Result<(), CallError> {
        let extracted = F::extract(args, 0)?;
        store_output(self.function.call(extracted), result)
    }
}

struct MemberDispatch<C, F, M> {
    function: F,
    _marker: PhantomData<fn() -> (C, M)>,
}

impl<C: Any, F: MemberFn<C, M>, M: 'static> Dispatch for MemberDispatch<C, F, M> {
    fn invoke(&self, args: &mut [Value], result: Option<&mut Value>) -> Result<(), CallError> {
        let extracted = F::extract(args, 1)?;
        let this = args
            .first_mut()
            .ok_or(CallError::InsufficientArguments { expected: 1, got: 0 })?;
        let output = self.function.call_on(this, extracted)?;
        store_output(output, result)
    }
}

struct ConstructorDispatch<F, M> {
    function: F,
    _marker: PhantomData<fn() -> M>,
}

impl<F: FunctionFn<M>, M: 'static> Dispatch for ConstructorDispatch<F, M> {
    fn invoke(&self, args: &mut [Value], _result: Option<&mut Value>) -> Result<(), CallError> {
        let extracted = F::extract(args, 1)?;
        let target = args
            .first_mut()
            .ok_or(CallError::InsufficientArguments { expected: 1, got: 0 })?;
        store_output(self.function.call(extracted), Some(target))
    }
}

impl BehaviorMethod {
    /// Reflect a free function
    pub fn from_fn<M: 'static, F: FunctionFn<M>>(name: impl Into<String>, function: F) -> Self {
        BehaviorMethod::new(
            name,
            MethodKind::Free,
            F::parameters(),
            Box::new(FreeDispatch {
                function,
                _marker: PhantomData,
            }),
        )
    }

    /// Reflect a method on `C`; the receiver becomes argument 0
    pub fn from_member<C: Any, M: 'static, F: MemberFn<C, M>>(name: impl Into<String>, function: F) -> Self {
        let mut parameters = F::parameters();
        parameters.insert(1, this_parameter::<C, M, F>());
        let kind = if F::IS_CONST {
            MethodKind::MemberConst
        } else {
            MethodKind::Member
        };
        BehaviorMethod::new(
            name,
            kind,
            parameters,
            Box::new(MemberDispatch::<C, F, M> {
                function,
                _marker: PhantomData,
            }),
        )
    }

    /// Reflect a constructor of `T`; argument 0 is the cell to construct into
    pub fn constructor<T, M, F>(name: impl Into<String>, function: F) -> Self
    where
        T: IntoValue,
        M: 'static,
        F: FunctionFn<M, Output = T>,
    {
        let mut parameters = F::parameters();
        parameters[0] = Parameter::void();
        parameters.insert(1, T::parameter().named("target").with_traits(Traits::REFERENCE));
        BehaviorMethod::new(
            name,
            MethodKind::Constructor,
            parameters,
            Box::new(ConstructorDispatch {
                function,
                _marker: PhantomData,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use behave_sdk::{Shared, TypeKey};

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Vector2 {
        x: f32,
        y: f32,
    }

    behave_sdk::reflect_value!(Vector2);

    impl Vector2 {
        fn length_squared(&self) -> f32 {
            self.x * self.x + self.y * self.y
        }

        fn scale(&mut self, by: f32) {
            self.x *= by;
            self.y *= by;
        }
    }

    #[test]
    fn test_member_shape() {
        let method = BehaviorMethod::from_member("LengthSquared", Vector2::length_squared);
        assert_eq!(method.kind(), MethodKind::MemberConst);
        assert_eq!(method.num_arguments(), 1);
        assert!(method.argument(0).unwrap().is_this());
        assert_eq!(method.result().type_key, TypeKey::of::<f32>());

        let method = BehaviorMethod::from_member("Scale", Vector2::scale);
        assert_eq!(method.kind(), MethodKind::Member);
        assert_eq!(method.num_arguments(), 2);
    }

    #[test]
    fn test_member_call_mutates_bound_receiver() {
        let shared = Shared::new(Vector2 { x: 1.0, y: 2.0 });
        let scale = BehaviorMethod::from_member("Scale", Vector2::scale);
        let mut args = [Value::bind(&shared), Value::new(2.0f32)];
        scale.invoke(&mut args, None).unwrap();
        assert_eq!(shared.get(), Vector2 { x: 2.0, y: 4.0 });

        let length = BehaviorMethod::from_member("LengthSquared", Vector2::length_squared);
        let mut result = Value::result::<f32>();
        length.invoke(&mut args[..1], Some(&mut result)).unwrap();
        assert_eq!(result.extract::<f32>(), Ok(20.0));
    }

    #[test]
    fn test_constructor_fills_target() {
        let ctor = BehaviorMethod::constructor("Vector2", |x: f32, y: f32| Vector2 { x, y });
        assert_eq!(ctor.kind(), MethodKind::Constructor);
        assert!(!ctor.argument(0).unwrap().is_this());

        let target = Shared::new(Vector2::default());
        let mut args = [Value::bind(&target), Value::new(3.0f32), Value::new(4.0f32)];
        ctor.invoke(&mut args, None).unwrap();
        assert_eq!(target.get(), Vector2 { x: 3.0, y: 4.0 });
    }

    #[test]
    fn test_result_mismatch() {
        let method = BehaviorMethod::from_fn("Answer", || 42i32);
        let mut result = Value::result::<String>();
        let err = method.invoke(&mut [], Some(&mut result)).unwrap_err();
        assert_eq!(
            err,
            CallError::ResultMismatch {
                expected: TypeKey::of::<String>(),
                produced: TypeKey::of::<i32>(),
            }
        );
    }
}
