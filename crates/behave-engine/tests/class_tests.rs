use std::cell::RefCell;
use std::rc::{Rc, Weak};

use behave_engine::{
    attributes, BehaviorClass, BehaviorContext, BehaviorContextEvents, BehaviorMethod, BehaviorProperty, CallError,
    RegistrationError, Rtti, RttiHelper, Shared, TypeKey, Value,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct Vector3 {
    x: f32,
    y: f32,
    z: f32,
}

behave_engine::reflect_value!(Vector3);

impl Vector3 {
    fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }

    fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    fn x(&self) -> f32 {
        self.x
    }

    fn set_x(&mut self, x: f32) {
        self.x = x;
    }

    fn scale(&mut self, factor: f32) {
        self.x *= factor;
        self.y *= factor;
        self.z *= factor;
    }
}

fn reflect_vector(context: &mut BehaviorContext) -> Result<(), RegistrationError> {
    context
        .class::<Vector3>("Vector3")
        .attribute(attributes::CATEGORY, "Math")
        .default_constructible()
        .clonable()
        .comparable()
        .constructor(Vector3::new)
        .parameter_names(&["x", "y", "z"])
        .method("Length", Vector3::length)
        .method("Scale", Vector3::scale)
        .default_value(1, 2.0f32)
        .property_read_only("length", Vector3::length)
        .property("x", Vector3::x, Vector3::set_x)
        .finish()
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_register_vector_class() {
    let mut context = BehaviorContext::new();
    reflect_vector(&mut context).unwrap();

    let class = context.find_class_of::<Vector3>().unwrap();
    assert_eq!(class.name(), "Vector3");
    assert!(Rc::ptr_eq(class, context.find_class("Vector3").unwrap()));
    assert_eq!(class.attributes.get::<&str>(attributes::CATEGORY), Some(&"Math"));
    assert_eq!(class.constructors.len(), 1);
    assert_eq!(class.constructors[0].argument(3).unwrap().name, "z");
    assert_eq!(class.find_method("Scale").unwrap().min_arguments(), 1);
}

#[test]
fn test_incompatible_setter_rejected() {
    let mut context = BehaviorContext::new();
    context
        .class::<Vector3>("Vector3")
        .property("length", Vector3::length, |_v: &mut Vector3, _label: String| {})
        .property_read_only("x", Vector3::x)
        .finish()
        .unwrap();

    let class = context.find_class("Vector3").unwrap();
    assert!(class.find_property("length").is_none());
    assert!(class.find_property("x").is_some());

    let getter = BehaviorMethod::from_member("length::Getter", Vector3::length);
    let setter = BehaviorMethod::from_member("length::Setter", |_v: &mut Vector3, _label: String| {});
    assert!(matches!(
        BehaviorProperty::new("length", Some(getter), Some(setter), Some(class.property_owner())),
        Err(RegistrationError::PropertySignature { .. })
    ));
}

#[test]
fn test_property_types_match() {
    let mut context = BehaviorContext::new();
    reflect_vector(&mut context).unwrap();
    let class = context.find_class("Vector3").unwrap();

    for property in class.properties.values() {
        if let (Some(getter), Some(setter)) = (property.getter(), property.setter()) {
            assert_eq!(getter.result().type_key, setter.argument(1).unwrap().type_key);
        }
    }
    assert!(!class.find_property("length").unwrap().is_writable());
}

#[test]
fn test_duplicate_class_type_rejected() {
    let mut context = BehaviorContext::new();
    reflect_vector(&mut context).unwrap();
    let err = context.class::<Vector3>("Vec3").finish();
    assert_eq!(err, Err(RegistrationError::DuplicateType(TypeKey::of::<Vector3>())));
    assert!(context.find_class("Vec3").is_none());
}

// ============================================================================
// Objects
// ============================================================================

#[test]
fn test_construct_and_call_members() {
    let mut context = BehaviorContext::new();
    reflect_vector(&mut context).unwrap();
    let class = context.find_class("Vector3").unwrap();

    let mut object = class
        .create_with(0, &mut [Value::new(3.0f32), Value::new(0.0f32), Value::new(4.0f32)])
        .unwrap();
    assert!(object.is_valid());

    let length = class.find_method("Length").unwrap();
    let mut args = [std::mem::take(object.value_mut())];
    assert_eq!(length.invoke_result::<f32>(&mut args), Ok(5.0));

    let scale = class.find_method("Scale").unwrap();
    assert!(scale.call(&mut args, None));
    assert_eq!(args[0].get::<Vector3>(), Some(Vector3::new(6.0, 0.0, 8.0)));

    let x = class.find_property("x").unwrap();
    x.set_value(Some(&mut args[0]), Value::new(1.0f32)).unwrap();
    assert_eq!(x.get::<f32>(Some(&mut args[0])), Ok(1.0));
}

#[test]
fn test_member_on_shared_receiver() {
    let mut context = BehaviorContext::new();
    reflect_vector(&mut context).unwrap();
    let class = context.find_class("Vector3").unwrap();

    let vector = Shared::new(Vector3::new(1.0, 1.0, 1.0));
    let scale = class.find_method("Scale").unwrap();
    assert!(scale.call(&mut [Value::reference(&vector), Value::new(3.0f32)], None));
    assert_eq!(vector.get(), Vector3::new(3.0, 3.0, 3.0));
}

#[test]
fn test_object_lifecycle() {
    let mut context = BehaviorContext::new();
    reflect_vector(&mut context).unwrap();
    let class = context.find_class("Vector3").unwrap();

    let object = class.create();
    assert_eq!(object.get::<Vector3>(), Some(Vector3::default()));
    let copy = class.clone_object(&object);
    assert_eq!(class.equals(&object, &copy), Some(true));
    assert!(class.hash_object(&object).is_none());
    assert!(class.destroy(copy));
}

// ============================================================================
// Ancestry
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
struct Actor {
    health: i32,
}

impl Actor {
    fn damage(&mut self, amount: i32) {
        self.health -= amount;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Player {
    actor: Actor,
    name: String,
}

fn player_actor(player: &Player) -> &Actor {
    &player.actor
}

fn player_actor_mut(player: &mut Player) -> &mut Actor {
    &mut player.actor
}

impl Rtti for Player {
    fn rtti() -> RttiHelper {
        RttiHelper::builder::<Player>().base(player_actor, player_actor_mut).build()
    }
}

behave_engine::reflect_value!(Actor);
behave_engine::reflect_value!(@rtti Player);

#[test]
fn test_base_method_on_derived_receiver() {
    let mut context = BehaviorContext::new();
    context
        .class::<Actor>("Actor")
        .method("Damage", Actor::damage)
        .finish()
        .unwrap();
    context
        .class::<Player>("Player")
        .rtti(Player::rtti())
        .finish()
        .unwrap();

    let player_class = context.find_class("Player").unwrap();
    assert!(player_class.is_a(TypeKey::of::<Actor>()));
    assert_eq!(player_class.bases(), &[TypeKey::of::<Actor>()]);

    let player = Shared::new(Player {
        actor: Actor { health: 50 },
        name: "Ada".to_string(),
    });
    let damage = context.find_class("Actor").unwrap().find_method("Damage").unwrap();
    let mut args = [Value::reference(&player), Value::new(20i32)];
    assert!(args[0].rtti().is_some());
    assert!(damage.call(&mut args, None));
    assert_eq!(player.borrow().actor.health, 30);
    assert_eq!(player.borrow().name, "Ada");

    let by_value = Value::new(Player::default());
    assert!(by_value.rtti().is_some());
}

fn reflect_actors(context: &mut BehaviorContext) {
    context
        .class::<Actor>("Actor")
        .method("Damage", Actor::damage)
        .finish()
        .unwrap();
    context
        .class::<Player>("Player")
        .rtti(Player::rtti())
        .finish()
        .unwrap();
}

#[test]
fn test_shared_derived_cell_carries_rtti() {
    let mut context = BehaviorContext::new();
    reflect_actors(&mut context);
    let damage = context.find_class("Actor").unwrap().find_method("Damage").unwrap();

    let player = Shared::new(Player {
        actor: Actor { health: 50 },
        name: "Ada".to_string(),
    });
    let mut args = [Value::new(player.clone()), Value::new(20i32)];
    assert_eq!(damage.invoke(&mut args, None), Ok(()));
    assert_eq!(player.borrow().actor.health, 30);

    let mut args = [Value::pointer(Some(&player)), Value::new(5i32)];
    assert_eq!(damage.invoke(&mut args, None), Ok(()));
    assert_eq!(player.borrow().actor.health, 25);
}

#[test]
fn test_shared_base_parameter_rejects_derived_cell() {
    let heal = BehaviorMethod::from_fn("Heal", |actor: Shared<Actor>, amount: i32| {
        actor.borrow_mut().health += amount;
    });

    let player = Shared::new(Player::default());
    let mut args = [Value::reference(&player), Value::new(10i32)];
    assert_eq!(
        heal.invoke(&mut args, None),
        Err(CallError::ArgumentMismatch {
            index: 0,
            expected: TypeKey::of::<Actor>(),
            actual: TypeKey::of::<Player>(),
        })
    );
    assert!(!args[0].is_projected());
    assert_eq!(args[0].type_key(), TypeKey::of::<Player>());
    assert_eq!(player.borrow().actor.health, 0);

    let actor = Shared::new(Actor { health: 1 });
    assert!(heal.call(&mut [Value::reference(&actor), Value::new(10i32)], None));
    assert_eq!(actor.borrow().health, 11);
}

// ============================================================================
// Removal
// ============================================================================

#[derive(Default)]
struct RemovalLog {
    removed: RefCell<Vec<String>>,
    last: RefCell<Option<Weak<BehaviorClass>>>,
}

impl BehaviorContextEvents for RemovalLog {
    fn on_remove_class(&self, name: &str, class: &Rc<BehaviorClass>) {
        assert_eq!(class.name(), name);
        assert!(class.find_method("Length").is_some());
        self.removed.borrow_mut().push(name.to_string());
        *self.last.borrow_mut() = Some(Rc::downgrade(class));
    }

    fn on_remove_method(&self, name: &str, _method: &Rc<BehaviorMethod>) {
        self.removed.borrow_mut().push(name.to_string());
    }
}

#[test]
fn test_remove_class_by_name() {
    let mut context = BehaviorContext::new();
    let log = Rc::new(RemovalLog::default());
    context.add_observer(log.clone());
    reflect_vector(&mut context).unwrap();

    context.remove_class("Vector3").unwrap();
    assert!(context.find_class("Vector3").is_none());
    assert!(context.find_class_by_type(TypeKey::of::<Vector3>()).is_none());
    assert_eq!(context.class_type_count(), 0);
    assert_eq!(*log.removed.borrow(), vec!["Vector3".to_string()]);

    let weak = log.last.borrow_mut().take().unwrap();
    assert!(weak.upgrade().is_none());

    assert_eq!(
        context.remove_class("Vector3"),
        Err(RegistrationError::NotFound("Vector3".to_string()))
    );
    assert_eq!(log.removed.borrow().len(), 1);
}

#[test]
fn test_remove_method_clears_alias() {
    let mut context = BehaviorContext::new();
    let log = Rc::new(RemovalLog::default());
    context.add_observer(log.clone());
    context
        .method("Distance", |a: f32, b: f32| (a - b).abs())
        .deprecated_name("Dist")
        .finish()
        .unwrap();
    assert!(Rc::ptr_eq(
        context.find_method("Dist").unwrap(),
        context.find_method("Distance").unwrap()
    ));

    context.remove_method("Dist").unwrap();
    assert!(context.find_method("Distance").is_none());
    assert!(context.find_method("Dist").is_none());
    assert_eq!(context.methods().count(), 0);
    assert_eq!(*log.removed.borrow(), vec!["Distance".to_string()]);
}

#[test]
fn test_remove_mode_mirrors_registration() {
    let mut context = BehaviorContext::new();
    reflect_vector(&mut context).unwrap();

    context.enable_remove_reflection();
    reflect_vector(&mut context).unwrap();
    context.disable_remove_reflection();

    assert!(context.find_class("Vector3").is_none());
    assert_eq!(context.class_type_count(), 0);
    reflect_vector(&mut context).unwrap();
    assert!(context.find_class_of::<Vector3>().is_some());
}
