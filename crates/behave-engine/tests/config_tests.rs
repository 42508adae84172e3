use std::cell::RefCell;
use std::rc::Rc;

use behave_engine::{BehaviorConfig, BehaviorContext, BusTraits, EventBus, HandlerOf, NoId, ResultPolicy, Value};

trait ScoreEvents {
    fn score(&mut self) -> i32;
}

struct ScoreBus;

impl BusTraits for ScoreBus {
    type Handler = dyn ScoreEvents;
    type Id = NoId;
}

type Handler = HandlerOf<ScoreBus>;

struct Fixed(i32);

impl ScoreEvents for Fixed {
    fn score(&mut self) -> i32 {
        self.0
    }
}

fn broadcast_score(config: BehaviorConfig) -> i32 {
    let bus = EventBus::<ScoreBus>::new();
    let first: Rc<RefCell<Handler>> = Rc::new(RefCell::new(Fixed(5)));
    let second: Rc<RefCell<Handler>> = Rc::new(RefCell::new(Fixed(8)));
    bus.connect(first, None);
    bus.connect(second, None);

    let mut context = BehaviorContext::with_config(config);
    context
        .ebus("Score", &bus)
        .event("Score", |h: &mut Handler| h.score())
        .finish()
        .unwrap();
    let sender = context.find_ebus("Score").unwrap().event("Score").unwrap();
    sender.broadcast.invoke_result::<i32>(&mut []).unwrap()
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("behave.toml");
    std::fs::write(&path, "result_policy = \"last\"\nallow_deprecated_names = false\n").unwrap();

    let config = BehaviorConfig::load(&path).unwrap();
    assert_eq!(config.result_policy, ResultPolicy::LastResponder);
    assert!(!config.allow_deprecated_names);
    assert!(config.log_call_failures);
}

// ============================================================================
// Effects
// ============================================================================

#[test]
fn test_result_policy() {
    assert_eq!(broadcast_score(BehaviorConfig::default()), 5);
    let config = BehaviorConfig {
        result_policy: ResultPolicy::LastResponder,
        ..BehaviorConfig::default()
    };
    assert_eq!(broadcast_score(config), 8);
}

#[test]
fn test_deprecated_names_disabled() {
    let config = BehaviorConfig {
        allow_deprecated_names: false,
        ..BehaviorConfig::default()
    };
    let mut context = BehaviorContext::with_config(config);
    context
        .method("Double", |v: i32| v * 2)
        .deprecated_name("Twice")
        .finish()
        .unwrap();
    assert!(context.find_method("Twice").is_none());

    let double = context.find_method("Double").unwrap();
    assert_eq!(double.deprecated_name(), Some("Twice"));
    assert_eq!(double.invoke_result::<i32>(&mut [Value::new(4i32)]), Ok(8));
}
