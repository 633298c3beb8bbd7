//! Computed Values
//!
//! A [`Computed`] is a cached derived value that re-evaluates only when its
//! inputs change and it is read again.
//!
//! # How Computed Values Work
//!
//! 1. The getter is wrapped in a lazy effect, so nothing runs at creation.
//!
//! 2. On the first `get()`, the effect runs, tracking the getter's inputs,
//!    and the result is cached.
//!
//! 3. When an input changes, the effect's scheduler only marks the cache
//!    dirty and notifies whoever read the computed value. The getter does
//!    not run until the next `get()`.
//!
//! Computed values never recompute for writes nobody reads.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::dep::Dep;
use super::effect::{effect_with, Effect, EffectOptions};

struct ComputedInner<T: 'static> {
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    dep: Dep,
    effect: Effect<T>,
}

impl<T: 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
    }
}

/// A lazily evaluated, cached derived value.
pub struct Computed<T: Clone + 'static>(Rc<ComputedInner<T>>);

impl<T: Clone + 'static> Computed<T> {
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self(Rc::new_cyclic(|weak: &std::rc::Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let scheduler = move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.dirty.replace(true) {
                    inner.dep.trigger();
                }
            };
            ComputedInner {
                value: RefCell::new(None),
                dirty: Cell::new(true),
                dep: Dep::new(),
                effect: effect_with(getter, EffectOptions::new().lazy().scheduler(scheduler)),
            }
        }))
    }

    /// Read the value, recomputing it if an input changed since the last read.
    pub fn get(&self) -> T {
        self.0.dep.track();

        let cached = self.0.value.borrow().clone();
        match cached {
            Some(value) if !self.0.dirty.get() => value,
            _ => {
                self.0.dirty.set(false);
                let value = self.0.effect.run();
                *self.0.value.borrow_mut() = Some(value.clone());
                value
            }
        }
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    /// Number of times the getter has run.
    pub fn compute_count(&self) -> usize {
        self.0.effect.run_count()
    }
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &*self.0.value.borrow())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Create a computed value from a getter.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use crate::reactive::{reactive, Reactive, Value};
    use serde_json::json;

    fn state(json: serde_json::Value) -> Reactive {
        Reactive::try_from(reactive(Value::from(json))).unwrap()
    }

    #[test]
    fn computed_returns_getter_value() {
        let user = state(json!({ "age": 1 }));
        let reader = user.clone();
        let age = computed(move || reader.get("age"));
        assert_eq!(age.get(), Value::from(1));
    }

    #[test]
    fn computed_is_lazy_and_cached() {
        let value = state(json!({ "foo": 1 }));
        let reader = value.clone();
        let c = computed(move || reader.get("foo"));

        assert_eq!(c.compute_count(), 0);
        assert_eq!(c.get(), Value::from(1));
        assert_eq!(c.compute_count(), 1);

        c.get();
        assert_eq!(c.compute_count(), 1);

        value.set("foo", 2).unwrap();
        assert!(c.is_dirty());
        assert_eq!(c.compute_count(), 1);

        assert_eq!(c.get(), Value::from(2));
        assert_eq!(c.compute_count(), 2);

        c.get();
        assert_eq!(c.compute_count(), 2);
    }

    #[test]
    fn effects_observe_computed_values() {
        let value = state(json!({ "foo": 1 }));
        let reader = value.clone();
        let doubled = computed(move || reader.get("foo").as_int().unwrap_or_default() * 2);

        let seen = Rc::new(Cell::new(0));
        let (c, sink) = (doubled.clone(), seen.clone());
        let e = effect(move || sink.set(c.get()));
        assert_eq!(seen.get(), 2);

        value.set("foo", 5).unwrap();
        assert_eq!(seen.get(), 10);
        assert_eq!(e.run_count(), 2);
    }
}
