use std::cell::{Cell, RefCell};
use std::rc::Rc;

use behave_engine::{
    BehaviorContext, BusForwarder, BusId, BusTraits, EventBus, HandlerEvent, HandlerOf, NoId, RegistrationError,
    Value,
};

#[derive(Debug, Clone, PartialEq)]
struct EntityId(u64);

behave_engine::reflect_value!(EntityId);

impl BusId for EntityId {}

trait DamageEvents {
    fn on_damage(&mut self, amount: i32);
    fn on_heal(&mut self, amount: i32);
    fn modify(&mut self, amount: i32) -> i32;
}

struct DamageBus;

impl BusTraits for DamageBus {
    type Handler = dyn DamageEvents;
    type Id = EntityId;
}

struct GlobalDamageBus;

impl BusTraits for GlobalDamageBus {
    type Handler = dyn DamageEvents;
    type Id = NoId;
}

type Handler = HandlerOf<DamageBus>;

struct Health {
    value: i32,
}

impl DamageEvents for Health {
    fn on_damage(&mut self, amount: i32) {
        self.value -= amount;
    }

    fn on_heal(&mut self, amount: i32) {
        self.value += amount;
    }

    fn modify(&mut self, amount: i32) -> i32 {
        amount.min(self.value)
    }
}

/// Handler that forwards every event to installed hooks
struct Forward(Rc<BusForwarder>);

impl DamageEvents for Forward {
    fn on_damage(&mut self, amount: i32) {
        let _ = self.0.call(0, (amount,));
    }

    fn on_heal(&mut self, amount: i32) {
        let _ = self.0.call(1, (amount,));
    }

    fn modify(&mut self, amount: i32) -> i32 {
        self.0.call_result::<i32, _>(2, (amount,)).ok().flatten().unwrap_or(amount)
    }
}

fn reflect_damage<B>(context: &mut BehaviorContext, name: &str, bus: &EventBus<B>) -> Result<(), RegistrationError>
where
    B: BusTraits<Handler = dyn DamageEvents>,
{
    context
        .ebus(name, bus)
        .tooltip("Damage notifications")
        .event("OnDamage", |h: &mut HandlerOf<B>, amount: i32| h.on_damage(amount))
        .parameter_names(&["amount"])
        .event("OnHeal", |h: &mut HandlerOf<B>, amount: i32| h.on_heal(amount))
        .default_value(0, 1i32)
        .event("Modify", |h: &mut HandlerOf<B>, amount: i32| h.modify(amount))
        .handler(
            vec![
                HandlerEvent::declare::<(i32,), ()>("OnDamage"),
                HandlerEvent::declare::<(i32,), ()>("OnHeal"),
                HandlerEvent::declare::<(i32,), i32>("Modify"),
            ],
            |forwarder| -> Rc<RefCell<HandlerOf<B>>> { Rc::new(RefCell::new(Forward(forwarder))) },
        )
        .finish()
}

// ============================================================================
// Bus shape
// ============================================================================

#[test]
fn test_addressed_bus_senders() {
    let mut context = BehaviorContext::new();
    reflect_damage(&mut context, "Damage", &EventBus::<DamageBus>::new()).unwrap();

    let ebus = context.find_ebus("Damage").unwrap();
    assert!(ebus.is_addressed());
    assert_eq!(ebus.tooltip.as_deref(), Some("Damage notifications"));
    let sender = ebus.event("OnDamage").unwrap();
    assert_eq!(sender.broadcast.num_arguments(), 1);
    assert_eq!(sender.event.as_ref().unwrap().num_arguments(), 2);
    assert_eq!(sender.event.as_ref().unwrap().argument(1).unwrap().name, "amount");
    assert!(sender.queue_broadcast.is_none());
    assert!(sender.queue_event.is_none());
}

#[test]
fn test_broadcast_bus_has_no_addressed_variants() {
    let mut context = BehaviorContext::new();
    reflect_damage(&mut context, "GlobalDamage", &EventBus::<GlobalDamageBus>::new()).unwrap();
    reflect_damage(&mut context, "QueuedDamage", &EventBus::<GlobalDamageBus>::queued()).unwrap();

    for name in ["GlobalDamage", "QueuedDamage"] {
        let ebus = context.find_ebus(name).unwrap();
        assert!(ebus.id_parameter.is_none());
        assert!(ebus.get_current_id.is_none());
        for sender in ebus.events.values() {
            assert!(sender.event.is_none());
            assert!(sender.queue_event.is_none());
        }
    }
    let queued = context.find_ebus("QueuedDamage").unwrap();
    assert!(queued.events.values().all(|sender| sender.queue_broadcast.is_some()));
}

#[test]
fn test_queued_addressed_event() {
    let bus = EventBus::<DamageBus>::queued();
    let mut context = BehaviorContext::new();
    reflect_damage(&mut context, "Damage", &bus).unwrap();

    let health: Rc<RefCell<Handler>> = Rc::new(RefCell::new(Health { value: 20 }));
    bus.connect(Rc::clone(&health), Some(EntityId(3)));

    let heal = context.find_ebus("Damage").unwrap().event("OnHeal").unwrap();
    let queue_event = heal.queue_event.as_ref().unwrap();
    assert_eq!(queue_event.min_arguments(), 1);
    assert!(queue_event.call(&mut [Value::new(EntityId(3))], None));
    assert_eq!(bus.queued_len(), 1);
    assert_eq!(health.borrow_mut().modify(100), 20);

    bus.execute_queued();
    assert_eq!(health.borrow_mut().modify(100), 21);
}

// ============================================================================
// Calling through the reflection
// ============================================================================

#[test]
fn test_addressed_event_reaches_one_handler() {
    let bus = EventBus::<DamageBus>::new();
    let mut context = BehaviorContext::new();
    reflect_damage(&mut context, "Damage", &bus).unwrap();

    let first: Rc<RefCell<Handler>> = Rc::new(RefCell::new(Health { value: 10 }));
    let second: Rc<RefCell<Handler>> = Rc::new(RefCell::new(Health { value: 10 }));
    bus.connect(Rc::clone(&first), Some(EntityId(1)));
    bus.connect(Rc::clone(&second), Some(EntityId(2)));

    let ebus = context.find_ebus("Damage").unwrap();
    let on_damage = ebus.event("OnDamage").unwrap().event.as_ref().unwrap();
    assert!(on_damage.call(&mut [Value::new(EntityId(2)), Value::new(4i32)], None));
    assert_eq!(first.borrow_mut().modify(100), 10);
    assert_eq!(second.borrow_mut().modify(100), 6);

    let on_heal = &ebus.event("OnHeal").unwrap().broadcast;
    assert!(on_heal.call(&mut [], None));
    assert_eq!(first.borrow_mut().modify(100), 11);
    assert_eq!(second.borrow_mut().modify(100), 7);
}

// ============================================================================
// Handler objects
// ============================================================================

#[test]
fn test_generic_hook_round_trip() {
    let bus = EventBus::<DamageBus>::new();
    let mut context = BehaviorContext::new();
    reflect_damage(&mut context, "Damage", &bus).unwrap();
    let ebus = context.find_ebus("Damage").unwrap();

    let handler = ebus.new_handler().unwrap();
    assert_eq!(handler.borrow().events().len(), 3);
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);
    handler
        .borrow()
        .install_generic_hook(
            2,
            move |user_data, name, index, result, args| {
                seen.set(seen.get() + 1);
                assert_eq!((name, index), ("Modify", 2));
                let scale = user_data.and_then(|data| data.downcast_ref::<i32>()).copied().unwrap_or(1);
                let amount = args[0].extract::<i32>().unwrap_or_default();
                if let Some(result) = result {
                    result.store_result(amount * scale);
                }
            },
            Some(Rc::new(3i32)),
        )
        .unwrap();

    let forwarder = Rc::clone(handler.borrow().forwarder());
    assert_eq!(forwarder.call(0, (5i32,)), Ok(()));
    assert_eq!(forwarder.call_result::<i32, _>(2, (5i32,)), Ok(Some(15)));
    assert_eq!(calls.get(), 1);

    assert!(handler.borrow_mut().connect(Some(&Value::new(EntityId(9)))));
    let modify = ebus.event("Modify").unwrap().event.as_ref().unwrap();
    assert_eq!(modify.invoke_result::<i32>(&mut [Value::new(EntityId(9)), Value::new(4i32)]), Ok(12));
    assert_eq!(calls.get(), 2);

    ebus.destroy_handler_object(&handler).unwrap();
    assert!(!handler.borrow().is_connected());
    assert_eq!(bus.handler_count(), 0);
}

#[test]
fn test_typed_hook_through_reflected_factory() {
    let bus = EventBus::<DamageBus>::new();
    let mut context = BehaviorContext::new();
    reflect_damage(&mut context, "Damage", &bus).unwrap();
    let ebus = context.find_ebus("Damage").unwrap();

    let create = ebus.create_handler.as_ref().unwrap();
    let mut created = Value::empty();
    assert!(create.call(&mut [], Some(&mut created)));
    let handler = created.as_shared::<behave_engine::BehaviorEBusHandler>().unwrap();

    let total = Rc::new(Cell::new(0));
    let sink = Rc::clone(&total);
    handler
        .borrow()
        .install_hook(0, move |amount: i32| sink.set(sink.get() + amount))
        .unwrap();
    assert!(matches!(
        handler.borrow().install_hook(0, |amount: i64| amount),
        Err(RegistrationError::HookSignature { .. })
    ));

    assert!(handler.borrow_mut().connect(Some(&Value::new(EntityId(1)))));
    bus.event(&EntityId(1), |h| h.on_damage(6));
    bus.event(&EntityId(2), |h| h.on_damage(50));
    bus.broadcast(|h| h.on_heal(1));
    assert_eq!(total.get(), 6);

    let destroy = ebus.destroy_handler.as_ref().unwrap();
    assert!(destroy.call(&mut [Value::reference(&handler)], None));
    bus.event(&EntityId(1), |h| h.on_damage(6));
    assert_eq!(total.get(), 6);
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_duplicate_event_and_bus() {
    let bus = EventBus::<DamageBus>::new();
    let mut context = BehaviorContext::new();
    reflect_damage(&mut context, "Damage", &bus).unwrap();
    assert_eq!(
        reflect_damage(&mut context, "Damage", &bus),
        Err(RegistrationError::DuplicateName("Damage".to_string()))
    );

    context
        .ebus("Other", &bus)
        .event("OnDamage", |h: &mut Handler, amount: i32| h.on_damage(amount))
        .event("OnDamage", |h: &mut Handler, amount: i32| h.on_heal(amount))
        .finish()
        .unwrap();
    assert_eq!(context.find_ebus("Other").unwrap().events.len(), 1);
}

#[test]
fn test_remove_bus_clears_alias() {
    let bus = EventBus::<DamageBus>::new();
    let mut context = BehaviorContext::new();
    context
        .ebus("Damage", &bus)
        .deprecated_name("Hurt")
        .event("OnDamage", |h: &mut Handler, amount: i32| h.on_damage(amount))
        .finish()
        .unwrap();
    assert!(Rc::ptr_eq(
        context.find_ebus("Hurt").unwrap(),
        context.find_ebus("Damage").unwrap()
    ));

    context.remove_ebus("Damage").unwrap();
    assert!(context.find_ebus("Hurt").is_none());
    assert_eq!(context.ebuses().count(), 0);
}

#[test]
fn test_manifest_lists_bus() {
    let mut context = BehaviorContext::new();
    reflect_damage(&mut context, "Damage", &EventBus::<DamageBus>::new()).unwrap();

    let manifest = context.manifest();
    let bus = &manifest.ebuses[0];
    assert_eq!(bus.id_type.as_deref(), Some(std::any::type_name::<EntityId>()));
    assert!(!bus.queued);
    let names: Vec<&str> = bus.events.iter().map(|event| event.name.as_str()).collect();
    assert_eq!(names, ["Modify", "OnDamage", "OnHeal"]);
    assert_eq!(bus.events[1].variants, ["ebus_broadcast", "ebus_addressed"]);
    assert_eq!(bus.handler_events, ["OnDamage", "OnHeal", "Modify"]);
}
