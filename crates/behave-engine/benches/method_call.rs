use std::cell::RefCell;
use std::rc::Rc;

use behave_engine::{BehaviorContext, BehaviorMethod, BusTraits, DefaultValue, EventBus, HandlerOf, NoId, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn add(a: i32, b: i32) -> i32 {
    a + b
}

#[derive(Clone, Default)]
struct Counter {
    value: i64,
}

behave_engine::reflect_value!(Counter);

impl Counter {
    fn add(&mut self, by: i64) {
        self.value += by;
    }
}

trait TickEvents {
    fn tick(&mut self, dt: f32);
}

struct TickBus;

impl BusTraits for TickBus {
    type Handler = dyn TickEvents;
    type Id = NoId;
}

struct Ticker(f32);

impl TickEvents for Ticker {
    fn tick(&mut self, dt: f32) {
        self.0 += dt;
    }
}

fn bench_free_function(c: &mut Criterion) {
    let mut group = c.benchmark_group("free_function");

    let method = BehaviorMethod::from_fn("Add", add);
    group.bench_function("full_arguments", |b| {
        b.iter(|| {
            let mut args = [Value::new(black_box(2i32)), Value::new(black_box(3i32))];
            method.invoke_result::<i32>(&mut args).unwrap()
        });
    });

    let mut defaulted = BehaviorMethod::from_fn("Add", add);
    defaulted.set_default_value(1, DefaultValue::new(10i32)).unwrap();
    group.bench_function("default_fill", |b| {
        b.iter(|| {
            let mut args = [Value::new(black_box(7i32))];
            defaulted.invoke_result::<i32>(&mut args).unwrap()
        });
    });

    group.finish();
}

fn bench_member(c: &mut Criterion) {
    let mut context = BehaviorContext::new();
    context
        .class::<Counter>("Counter")
        .default_constructible()
        .method("Add", Counter::add)
        .finish()
        .unwrap();
    let class = context.find_class("Counter").unwrap();
    let method = class.find_method("Add").unwrap();

    c.bench_function("member_call", |b| {
        let mut object = class.create();
        let mut args = [std::mem::take(object.value_mut()), Value::empty()];
        b.iter(|| {
            args[1] = Value::new(black_box(1i64));
            method.invoke(&mut args, None).unwrap()
        });
    });
}

fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");

    for handlers in [1usize, 8, 64] {
        let bus = EventBus::<TickBus>::new();
        let connected: Vec<Rc<RefCell<HandlerOf<TickBus>>>> = (0..handlers)
            .map(|_| -> Rc<RefCell<HandlerOf<TickBus>>> { Rc::new(RefCell::new(Ticker(0.0))) })
            .collect();
        for handler in &connected {
            bus.connect(Rc::clone(handler), None);
        }

        let mut context = BehaviorContext::new();
        context
            .ebus("Tick", &bus)
            .event("Tick", |h: &mut HandlerOf<TickBus>, dt: f32| h.tick(dt))
            .finish()
            .unwrap();
        let ebus = context.find_ebus("Tick").unwrap();
        let sender = ebus.event("Tick").unwrap();

        group.bench_with_input(BenchmarkId::new("reflected", handlers), &handlers, |b, _| {
            b.iter(|| {
                let mut args = [Value::new(black_box(0.016f32))];
                sender.broadcast.invoke(&mut args, None).unwrap()
            });
        });
        group.bench_with_input(BenchmarkId::new("direct", handlers), &handlers, |b, _| {
            b.iter(|| bus.broadcast(|h| h.tick(black_box(0.016))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_free_function, bench_member, bench_broadcast);
criterion_main!(benches);
