//! Integration Tests for Reactive System
//!
//! These tests verify that reactive objects, refs, effects and computed
//! values work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ripple_core::reactive::{
    computed, effect, effect_with, is_reactive, is_readonly, proxy_refs, reactive, readonly,
    ref_value, shallow_readonly, stop, to_raw, untrack, EffectOptions, Reactive, Ref, Runtime,
    Value,
};
use ripple_core::Error;
use serde_json::json;

fn proxy(value: Value) -> Reactive {
    value.as_proxy().cloned().expect("object")
}

/// Test that an effect observes writes to a nested object.
#[test]
fn effect_tracks_nested_reads() {
    let state = proxy(reactive(Value::from(json!({ "user": { "name": "ada" } }))));
    let seen = Rc::new(RefCell::new(String::new()));

    let (reader, sink) = (state.clone(), seen.clone());
    let _e = effect(move || {
        let user = reader.get("user");
        let name = user.as_proxy().map(|u| u.get("name")).unwrap_or_default();
        *sink.borrow_mut() = name.to_display_string();
    });
    assert_eq!(*seen.borrow(), "ada");

    let user = proxy(state.get("user"));
    assert!(is_reactive(&state.get("user")));
    user.set("name", "grace").unwrap();
    assert_eq!(*seen.borrow(), "grace");

    // Replacing the whole nested object also re-runs.
    state
        .set("user", Value::from(json!({ "name": "linus" })))
        .unwrap();
    assert_eq!(*seen.borrow(), "linus");
}

/// Test that effects only follow the branch they read last.
#[test]
fn dependencies_follow_conditional_branches() {
    let state = proxy(reactive(Value::from(json!({ "ok": true, "a": 1, "b": 2 }))));
    let runs = Rc::new(Cell::new(0));

    let (reader, counter) = (state.clone(), runs.clone());
    let e = effect(move || {
        counter.set(counter.get() + 1);
        if reader.get("ok").as_bool() == Some(true) {
            reader.get("a");
        } else {
            reader.get("b");
        }
    });
    assert_eq!(runs.get(), 1);

    state.set("b", 3).unwrap();
    assert_eq!(runs.get(), 1);

    state.set("ok", false).unwrap();
    assert_eq!(runs.get(), 2);

    state.set("a", 5).unwrap();
    assert_eq!(runs.get(), 2);
    state.set("b", 4).unwrap();
    assert_eq!(runs.get(), 3);
    assert_eq!(e.dependency_count(), 2);
}

/// Test that a scheduler replaces the synchronous re-run.
#[test]
fn scheduler_defers_reruns() {
    let state = proxy(reactive(Value::from(json!({ "n": 1 }))));
    let observed = Rc::new(Cell::new(0));
    let pending = Rc::new(Cell::new(0));

    let (reader, sink) = (state.clone(), observed.clone());
    let hits = pending.clone();
    let e = effect_with(
        move || sink.set(reader.get("n").as_int().unwrap_or_default()),
        EffectOptions::new().scheduler(move || hits.set(hits.get() + 1)),
    );
    assert_eq!(observed.get(), 1);

    state.set("n", 2).unwrap();
    state.set("n", 3).unwrap();
    assert_eq!(pending.get(), 2);
    assert_eq!(observed.get(), 1);

    e.run();
    assert_eq!(observed.get(), 3);
}

/// Test that stopping detaches an effect and calls its stop callback once.
#[test]
fn stop_detaches_effect() {
    let state = proxy(reactive(Value::from(json!({ "n": 0 }))));
    let runs = Rc::new(Cell::new(0));
    let stopped = Rc::new(Cell::new(0));

    let (reader, counter, on_stop) = (state.clone(), runs.clone(), stopped.clone());
    let e = effect_with(
        move || {
            counter.set(counter.get() + 1);
            reader.get("n");
        },
        EffectOptions::new().on_stop(move || on_stop.set(on_stop.get() + 1)),
    );

    stop(&e);
    stop(&e);
    assert_eq!(stopped.get(), 1);
    assert_eq!(Runtime::dependent_count(state.raw(), &"n".into()), 0);

    state.set("n", 1).unwrap();
    assert_eq!(runs.get(), 1);

    // A stopped effect can still be run by hand, untracked.
    e.run();
    assert_eq!(runs.get(), 2);
    assert_eq!(e.dependency_count(), 0);
}

/// Test that readonly views reject writes at every depth.
#[test]
fn readonly_rejects_writes() {
    let raw = Value::from(json!({ "inner": { "n": 1 } }));
    let ro = readonly(raw.clone());
    assert!(is_readonly(&ro));
    let ro = proxy(ro);

    assert_eq!(
        ro.set("inner", 2),
        Err(Error::ReadonlyWrite { key: "inner".into() })
    );
    let inner = ro.get("inner");
    assert!(is_readonly(&inner));
    assert!(proxy(inner).set("n", 2).is_err());

    // Nothing changed underneath.
    let mutable = proxy(reactive(raw));
    assert_eq!(proxy(mutable.get("inner")).get("n"), Value::from(1));
}

/// Test that shallow readonly views only guard the top level.
#[test]
fn shallow_readonly_returns_nested_as_stored() {
    let view = proxy(shallow_readonly(Value::from(json!({ "nested": { "n": 1 } }))));
    assert!(view.set("nested", 1).is_err());

    let nested = view.get("nested");
    assert!(!is_readonly(&nested));
    assert!(!is_reactive(&nested));
    let raw = nested.as_object().cloned().unwrap();
    raw.set("n".into(), Value::from(2)).unwrap();
    assert_eq!(raw.get(&"n".into()), Value::from(2));
}

/// Test that wrapping and unwrapping round-trips to the same object.
#[test]
fn wrappers_share_their_raw_object() {
    let raw = Value::from(json!({ "n": 1 }));
    let a = reactive(raw.clone());
    let b = reactive(raw.clone());
    assert!(proxy(a.clone()).ptr_eq(&proxy(b)));
    assert_eq!(to_raw(&a), raw);
    assert!(!proxy(a).ptr_eq(&proxy(readonly(raw))));
}

/// Test that refs track, skip equal writes and wrap objects.
#[test]
fn refs_track_and_skip_equal_writes() {
    let count = Ref::new(1);
    let runs = Rc::new(Cell::new(0));

    let (reader, counter) = (count.clone(), runs.clone());
    let _e = effect(move || {
        counter.set(counter.get() + 1);
        reader.get();
    });

    count.set(1);
    assert_eq!(runs.get(), 1);
    count.set(2);
    assert_eq!(runs.get(), 2);
    count.update(|v| Value::from(v.as_int().unwrap_or_default() + 1));
    assert_eq!(count.get_untracked(), Value::from(3));
    assert_eq!(runs.get(), 3);

    let obj = Ref::new(Value::from(json!({ "n": 1 })));
    assert!(is_reactive(&obj.get_untracked()));
}

/// Test that writes into an object held by a ref trigger readers of it.
#[test]
fn ref_object_values_are_deeply_reactive() {
    let holder = Ref::new(Value::from(json!({ "n": 1 })));
    let seen = Rc::new(Cell::new(0));

    let (reader, sink) = (holder.clone(), seen.clone());
    let _e = effect(move || {
        let n = reader.get().as_proxy().map(|p| p.get("n")).unwrap_or_default();
        sink.set(n.as_int().unwrap_or_default());
    });

    proxy(holder.get_untracked()).set("n", 7).unwrap();
    assert_eq!(seen.get(), 7);
}

/// Test that proxy_refs unwraps on read and writes into refs.
#[test]
fn proxy_refs_unwrap_and_write_through() {
    let age = Ref::new(10);
    let record = Value::from(json!({ "name": "ada" }));
    record
        .as_object()
        .unwrap()
        .set("age".into(), Value::Ref(age.clone()))
        .unwrap();

    let view = proxy_refs(record).unwrap();
    assert_eq!(view.get("age"), Value::from(10));
    assert_eq!(view.get("name"), Value::from("ada"));

    view.set("age", 20).unwrap();
    assert_eq!(age.get_untracked(), Value::from(20));

    view.set("age", ref_value(30)).unwrap();
    assert_eq!(view.get("age"), Value::from(30));
    assert_eq!(age.get_untracked(), Value::from(20));
}

/// Test that computed values are lazy, cached, and chain.
#[test]
fn computed_values_are_lazy_and_chain() {
    let state = proxy(reactive(Value::from(json!({ "n": 1 }))));

    let reader = state.clone();
    let doubled = computed(move || reader.get("n").as_int().unwrap_or_default() * 2);
    let d = doubled.clone();
    let plus_one = computed(move || d.get() + 1);
    assert_eq!(doubled.compute_count(), 0);

    assert_eq!(plus_one.get(), 3);
    assert_eq!(plus_one.get(), 3);
    assert_eq!(doubled.compute_count(), 1);

    state.set("n", 5).unwrap();
    assert!(doubled.is_dirty());
    assert_eq!(doubled.compute_count(), 1);
    assert_eq!(plus_one.get(), 11);
    assert_eq!(doubled.compute_count(), 2);
}

/// Test that an effect reading a computed re-runs when its input changes.
#[test]
fn effects_observe_computed_values() {
    let count = Ref::new(1);
    let c = count.clone();
    let squared = computed(move || {
        let n = c.get().as_int().unwrap_or_default();
        n * n
    });

    let seen = Rc::new(Cell::new(0));
    let (reader, sink) = (squared.clone(), seen.clone());
    let _e = effect(move || sink.set(reader.get()));
    assert_eq!(seen.get(), 1);

    count.set(4);
    assert_eq!(seen.get(), 16);
}

/// Test that list length watchers see pushes.
#[test]
fn list_length_is_tracked() {
    let list = proxy(reactive(Value::from(json!([1, 2]))));
    let len = Rc::new(Cell::new(0));

    let (reader, sink) = (list.clone(), len.clone());
    let _e = effect(move || sink.set(reader.len()));
    assert_eq!(len.get(), 2);

    list.push(3).unwrap();
    assert_eq!(len.get(), 3);
    list.set(5usize, 9).unwrap();
    assert_eq!(len.get(), 6);
}

/// Test that untracked reads do not subscribe.
#[test]
fn untracked_reads_do_not_subscribe() {
    let state = proxy(reactive(Value::from(json!({ "n": 0 }))));
    let runs = Rc::new(Cell::new(0));

    let (reader, counter) = (state.clone(), runs.clone());
    let _e = effect(move || {
        counter.set(counter.get() + 1);
        untrack(|| reader.get("n"));
    });

    state.set("n", 1).unwrap();
    assert_eq!(runs.get(), 1);
}
