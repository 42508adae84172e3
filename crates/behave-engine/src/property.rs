//! Getter/setter pairs exposed as one named attribute

use std::fmt;

use behave_sdk::{Attributes, CallError, FromValue, RegistrationError, RttiHelper, TypeKey, Value};

use crate::method::BehaviorMethod;

/// Class a property belongs to, for receiver validation
#[derive(Clone, Copy)]
pub struct PropertyOwner<'a> {
    /// Class type
    pub type_key: TypeKey,
    /// Cast table of the class, if reflected
    pub rtti: Option<&'a RttiHelper>,
}

impl<'a> PropertyOwner<'a> {
    fn accepts(&self, this_type: TypeKey) -> bool {
        this_type == self.type_key || self.rtti.is_some_and(|rtti| rtti.is_type_of(this_type))
    }
}

/// A reflected property
pub struct BehaviorProperty {
    name: String,
    getter: Option<BehaviorMethod>,
    setter: Option<BehaviorMethod>,
    /// Property attributes
    pub attributes: Attributes,
}

impl BehaviorProperty {
    /// Pair a getter and a setter.
    ///
    /// A getter takes only its receiver (or nothing) and returns the value.
    /// A setter takes its receiver (or nothing) plus one value of the
    /// getter's return type. Either may be absent, not both.
    pub fn new(
        name: impl Into<String>,
        getter: Option<BehaviorMethod>,
        setter: Option<BehaviorMethod>,
        owner: Option<PropertyOwner<'_>>,
    ) -> Result<Self, RegistrationError> {
        let name = name.into();
        let invalid = |reason: String| RegistrationError::PropertySignature {
            name: name.clone(),
            reason,
        };

        if getter.is_none() && setter.is_none() {
            return Err(invalid("neither getter nor setter given".to_string()));
        }

        let check_receiver = |method: &BehaviorMethod| -> Result<usize, RegistrationError> {
            if !method.is_member() {
                return Ok(0);
            }
            let this_type = method.argument(0).map(|p| p.type_key).unwrap_or_default();
            match owner {
                Some(owner) if owner.accepts(this_type) => Ok(1),
                Some(owner) => Err(invalid(format!(
                    "'{}' takes a {} receiver, class is {}",
                    method.name(),
                    this_type,
                    owner.type_key
                ))),
                None => Err(invalid(format!("'{}' needs a receiver outside of a class", method.name()))),
            }
        };

        if let Some(getter) = &getter {
            let receivers = check_receiver(getter)?;
            if getter.num_arguments() != receivers {
                return Err(invalid(format!(
                    "getter '{}' takes {} arguments",
                    getter.name(),
                    getter.num_arguments() - receivers
                )));
            }
            if !getter.has_result() {
                return Err(invalid(format!("getter '{}' returns nothing", getter.name())));
            }
        }

        if let Some(setter) = &setter {
            let receivers = check_receiver(setter)?;
            if setter.num_arguments() != receivers + 1 {
                return Err(invalid(format!(
                    "setter '{}' takes {} arguments, expected 1",
                    setter.name(),
                    setter.num_arguments().saturating_sub(receivers)
                )));
            }
            if let Some(getter) = &getter {
                let value_type = setter.arguments()[receivers].type_key;
                let result_type = getter.result().type_key;
                if value_type != result_type {
                    return Err(invalid(format!(
                        "setter takes {}, getter returns {}",
                        value_type, result_type
                    )));
                }
            }
        }

        Ok(BehaviorProperty {
            name,
            getter,
            setter,
            attributes: Attributes::new(),
        })
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Getter method
    pub fn getter(&self) -> Option<&BehaviorMethod> {
        self.getter.as_ref()
    }

    /// Setter method
    pub fn setter(&self) -> Option<&BehaviorMethod> {
        self.setter.as_ref()
    }

    /// Type of the property value
    pub fn value_type(&self) -> TypeKey {
        match (&self.getter, &self.setter) {
            (Some(getter), _) => getter.result().type_key,
            (None, Some(setter)) => setter.arguments().last().map(|p| p.type_key).unwrap_or_default(),
            (None, None) => TypeKey::void(),
        }
    }

    /// Check if the property can be read
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    /// Check if the property can be written
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub(crate) fn methods_mut(&mut self) -> impl Iterator<Item = &mut BehaviorMethod> {
        self.getter.iter_mut().chain(self.setter.iter_mut())
    }

    /// Read the value; `this` is required for member getters
    pub fn get_value(&self, this: Option<&mut Value>) -> Result<Value, CallError> {
        let getter = self
            .getter
            .as_ref()
            .ok_or_else(|| CallError::Unsupported(format!("reading '{}'", self.name)))?;
        let mut result = Value::for_parameter(getter.result());
        match this {
            Some(this) => getter.invoke(std::slice::from_mut(this), Some(&mut result))?,
            None => getter.invoke(&mut [], Some(&mut result))?,
        }
        Ok(result)
    }

    /// Read the value as `R`
    pub fn get<R: FromValue>(&self, this: Option<&mut Value>) -> Result<R, CallError> {
        let result = self.get_value(this)?;
        R::from_value(&result).map_err(|_| CallError::ResultMismatch {
            expected: R::parameter().type_key,
            produced: result.type_key(),
        })
    }

    /// Write the value; `this` is required for member setters
    pub fn set_value(&self, this: Option<&mut Value>, value: Value) -> Result<(), CallError> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| CallError::Unsupported(format!("writing '{}'", self.name)))?;
        match this {
            Some(this) => {
                let mut args = [std::mem::take(this), value];
                let outcome = setter.invoke(&mut args, None);
                let [receiver, _] = args;
                *this = receiver;
                outcome
            }
            None => setter.invoke(&mut [value], None),
        }
    }
}

impl fmt::Debug for BehaviorProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorProperty")
            .field("name", &self.name)
            .field("value_type", &self.value_type())
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use behave_sdk::Shared;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Vector3 {
        x: f32,
        y: f32,
        z: f32,
    }

    behave_sdk::reflect_value!(Vector3);

    impl Vector3 {
        fn length(&self) -> f32 {
            (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
        }

        fn x(&self) -> f32 {
            self.x
        }

        fn set_x(&mut self, x: f32) {
            self.x = x;
        }

        fn set_name(&mut self, _name: String) {}
    }

    fn owner() -> Option<PropertyOwner<'static>> {
        Some(PropertyOwner {
            type_key: TypeKey::of::<Vector3>(),
            rtti: None,
        })
    }

    #[test]
    fn test_read_only_member_property() {
        let getter = BehaviorMethod::from_member("GetLength", Vector3::length);
        let property = BehaviorProperty::new("length", Some(getter), None, owner()).unwrap();
        assert!(property.is_readable());
        assert!(!property.is_writable());
        assert_eq!(property.value_type(), TypeKey::of::<f32>());

        let shared = Shared::new(Vector3 { x: 3.0, y: 4.0, z: 0.0 });
        let mut this = Value::bind(&shared);
        assert_eq!(property.get::<f32>(Some(&mut this)), Ok(5.0));
        assert!(matches!(
            property.set_value(Some(&mut this), Value::new(1.0f32)),
            Err(CallError::Unsupported(_))
        ));
    }

    #[test]
    fn test_setter_type_must_match_getter() {
        let getter = BehaviorMethod::from_member("GetLength", Vector3::length);
        let setter = BehaviorMethod::from_member("SetName", Vector3::set_name);
        let err = BehaviorProperty::new("length", Some(getter), Some(setter), owner()).unwrap_err();
        assert!(matches!(err, RegistrationError::PropertySignature { .. }));
    }

    #[test]
    fn test_read_write_member_property() {
        let property = BehaviorProperty::new(
            "x",
            Some(BehaviorMethod::from_member("GetX", Vector3::x)),
            Some(BehaviorMethod::from_member("SetX", Vector3::set_x)),
            owner(),
        )
        .unwrap();

        let shared = Shared::new(Vector3::default());
        let mut this = Value::bind(&shared);
        property.set_value(Some(&mut this), Value::new(2.5f32)).unwrap();
        assert_eq!(shared.borrow().x, 2.5);
        assert!(this.is_bound());
        assert_eq!(property.get::<f32>(Some(&mut this)), Ok(2.5));
    }

    #[test]
    fn test_receiver_must_match_class() {
        struct Other;
        let getter = BehaviorMethod::from_member("GetX", Vector3::x);
        let owner = Some(PropertyOwner {
            type_key: TypeKey::of::<Other>(),
            rtti: None,
        });
        assert!(BehaviorProperty::new("x", Some(getter), None, owner).is_err());
    }

    #[test]
    fn test_free_property() {
        let getter = BehaviorMethod::from_fn("GetGravity", || -9.81f32);
        let property = BehaviorProperty::new("gravity", Some(getter), None, None).unwrap();
        assert_eq!(property.get::<f32>(None), Ok(-9.81));

        let getter = BehaviorMethod::from_fn("Bad", |a: i32| a);
        assert!(BehaviorProperty::new("bad", Some(getter), None, None).is_err());
    }
}
