//! Effect Implementation
//!
//! An Effect is a re-runnable computation that replays whenever reactive
//! state it read during its latest run is written.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately (unless it is
//!    lazy) to establish its initial dependencies.
//!
//! 2. Each run first removes the effect from every dep it belongs to, then
//!    pushes the effect as the active context so reads inside the function
//!    register it again. Deps therefore reflect only the latest run.
//!
//! 3. When a dependency is written, the effect is notified. Without a
//!    scheduler it re-runs synchronously; with a scheduler the scheduler is
//!    called instead and decides when (or whether) to run.
//!
//! 4. `stop()` removes the effect from every dep, calls the stop callback
//!    once, and marks the effect inactive. A stopped effect can still be run
//!    by hand; it just no longer tracks anything.
//!
//! # Re-entrancy
//!
//! An effect that writes a key it also reads (an increment, say) would
//! otherwise trigger itself forever. Deps skip subscribers that are
//! currently running, so the write inside the run is not replayed.
//!
//! # Ownership
//!
//! Deps hold their effects weakly. An effect lives as long as something
//! holds it: an `Effect` handle, a [`Computed`](super::Computed) or a
//! component instance. Dropping the last one removes the effect from every
//! dep, so keep the handle for as long as the effect should react.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::context::{untrack, ReactiveContext};
use super::dep::Dep;
use super::subscriber::{Subscriber, SubscriberId};

/// Callback that replaces an effect's immediate re-run.
pub type EffectScheduler = Rc<dyn Fn()>;

/// Options for [`effect_with`].
#[derive(Default)]
pub struct EffectOptions {
    /// Skip the initial run.
    pub lazy: bool,
    /// Called instead of re-running when a dependency changes.
    pub scheduler: Option<EffectScheduler>,
    /// Called once when the effect is stopped.
    pub on_stop: Option<Box<dyn FnOnce()>>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn on_stop<F>(mut self, on_stop: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_stop = Some(Box::new(on_stop));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

struct EffectInner<T> {
    id: SubscriberId,
    f: Box<dyn Fn() -> T>,
    scheduler: Option<EffectScheduler>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
    active: Cell<bool>,
    /// Depth of in-progress runs of this effect.
    running: Cell<usize>,
    deps: RefCell<SmallVec<[Dep; 4]>>,
    run_count: Cell<usize>,
}

/// Decrements the running depth when a run ends, including by panic.
struct RunningGuard<'a>(&'a Cell<usize>);

impl<'a> RunningGuard<'a> {
    fn new(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Rc<Self>) -> T {
        self.run_count.set(self.run_count.get() + 1);

        if !self.active.get() {
            return untrack(|| (self.f)());
        }

        self.cleanup();
        let _running = RunningGuard::new(&self.running);
        let _ctx = ReactiveContext::enter(self.clone());
        (self.f)()
    }

    fn stop(&self) {
        if !self.active.get() {
            return;
        }
        self.cleanup();
        let on_stop = self.on_stop.borrow_mut().take();
        if let Some(on_stop) = on_stop {
            on_stop();
        }
        self.active.set(false);
    }
}

impl<T> EffectInner<T> {
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            dep.remove(self.id);
        }
    }
}

impl<T> Drop for EffectInner<T> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn notify(self: Rc<Self>) {
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => {
                self.run();
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.get() > 0
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn record_dep(&self, dep: Dep) {
        self.deps.borrow_mut().push(dep);
    }
}

/// A handle to a reactive computation.
///
/// Handles are cheap to clone and all clones share the same effect.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{effect, reactive, Value};
///
/// let state = reactive(Value::from(serde_json::json!({ "count": 0 })));
/// let proxy = state.as_proxy().unwrap().clone();
///
/// let reader = proxy.clone();
/// let e = effect(move || reader.get("count").as_int().unwrap_or_default());
/// assert_eq!(e.run_count(), 1);
///
/// proxy.set("count", 1).unwrap();
/// assert_eq!(e.run_count(), 2);
/// ```
pub struct Effect<T: 'static>(Rc<EffectInner<T>>);

impl<T: 'static> Effect<T> {
    fn create<F>(f: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self(Rc::new(EffectInner {
            id: SubscriberId::new(),
            f: Box::new(f),
            scheduler: options.scheduler,
            on_stop: RefCell::new(options.on_stop),
            active: Cell::new(true),
            running: Cell::new(0),
            deps: RefCell::new(SmallVec::new()),
            run_count: Cell::new(0),
        }))
    }

    /// Get the effect's subscriber ID.
    pub fn id(&self) -> SubscriberId {
        self.0.id
    }

    /// Run the computation and return its result.
    ///
    /// Active effects re-collect their dependencies; stopped effects run
    /// without tracking.
    pub fn run(&self) -> T {
        self.0.run()
    }

    /// Stop the effect. Calling this more than once is a no-op.
    pub fn stop(&self) {
        self.0.stop();
    }

    /// Whether the effect still re-runs on changes.
    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.0.running.get() > 0
    }

    /// Number of times the computation has been executed.
    pub fn run_count(&self) -> usize {
        self.0.run_count.get()
    }

    /// Number of deps the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.0.deps.borrow().len()
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.0.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Create an effect and run it immediately.
pub fn effect<T, F>(f: F) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    effect_with(f, EffectOptions::default())
}

/// Create an effect with options.
///
/// Unless `options.lazy` is set, the effect runs once before returning.
pub fn effect_with<T, F>(f: F, options: EffectOptions) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    let lazy = options.lazy;
    let effect = Effect::create(f, options);
    if !lazy {
        effect.run();
    }
    effect
}

/// Stop an effect.
pub fn stop<T: 'static>(effect: &Effect<T>) {
    effect.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{reactive, Reactive, Ref, Value};
    use serde_json::json;

    fn state(json: serde_json::Value) -> Reactive {
        match reactive(Value::from(json)) {
            Value::Proxy(proxy) => proxy,
            other => panic!("expected proxy, got {other:?}"),
        }
    }

    #[test]
    fn effect_runs_on_creation() {
        let e = effect(|| 42);
        assert_eq!(e.run_count(), 1);
        assert_eq!(e.run(), 42);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let e = effect_with(|| (), EffectOptions::new().lazy());
        assert_eq!(e.run_count(), 0);
        e.run();
        assert_eq!(e.run_count(), 1);
    }

    #[test]
    fn effect_reruns_on_tracked_write() {
        let counter = state(json!({ "num": 0 }));
        let seen = Rc::new(Cell::new(0));

        let reader = counter.clone();
        let sink = seen.clone();
        let _e = effect(move || sink.set(reader.get("num").as_int().unwrap_or_default()));

        assert_eq!(seen.get(), 0);
        counter.set("num", 7).unwrap();
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn scheduler_replaces_rerun() {
        let counter = state(json!({ "foo": 1 }));
        let scheduled = Rc::new(Cell::new(0));

        let reader = counter.clone();
        let calls = scheduled.clone();
        let e = effect_with(
            move || reader.get("foo"),
            EffectOptions::new().scheduler(move || calls.set(calls.get() + 1)),
        );

        assert_eq!(e.run_count(), 1);
        assert_eq!(scheduled.get(), 0);

        counter.set("foo", 2).unwrap();
        assert_eq!(scheduled.get(), 1);
        assert_eq!(e.run_count(), 1);

        assert_eq!(e.run(), Value::from(2));
    }

    #[test]
    fn stop_is_idempotent_and_calls_on_stop_once() {
        let stops = Rc::new(Cell::new(0));
        let calls = stops.clone();
        let e = effect_with(
            || (),
            EffectOptions::new().on_stop(move || calls.set(calls.get() + 1)),
        );

        stop(&e);
        stop(&e);
        assert_eq!(stops.get(), 1);
        assert!(!e.is_active());
    }

    #[test]
    fn stopped_effect_runs_untracked() {
        let counter = state(json!({ "prop": 1 }));
        let reader = counter.clone();
        let e = effect(move || reader.get("prop"));
        assert_eq!(e.dependency_count(), 1);

        e.stop();
        assert_eq!(e.dependency_count(), 0);

        counter.set("prop", 2).unwrap();
        assert_eq!(e.run_count(), 1);

        assert_eq!(e.run(), Value::from(2));
        assert_eq!(e.dependency_count(), 0);

        counter.set("prop", 3).unwrap();
        assert_eq!(e.run_count(), 2);
    }

    #[test]
    fn self_increment_does_not_recurse() {
        let counter = state(json!({ "n": 0 }));
        let reader = counter.clone();
        let e = effect(move || {
            let n = reader.get("n").as_int().unwrap_or_default();
            reader.set("n", n + 1).unwrap();
        });

        assert_eq!(e.run_count(), 1);
        assert_eq!(counter.get("n"), Value::from(1));

        counter.set("n", 10).unwrap();
        assert_eq!(e.run_count(), 2);
        assert_eq!(counter.get("n"), Value::from(11));
    }

    #[test]
    fn deps_follow_latest_run() {
        let flags = state(json!({ "ok": true, "a": 1, "b": 2 }));
        let reader = flags.clone();
        let e = effect(move || {
            if reader.get("ok").as_bool().unwrap_or(false) {
                reader.get("a")
            } else {
                reader.get("b")
            }
        });
        assert_eq!(e.dependency_count(), 2);

        flags.set("ok", false).unwrap();
        assert_eq!(e.run_count(), 2);

        // "a" is no longer read.
        flags.set("a", 5).unwrap();
        assert_eq!(e.run_count(), 2);

        flags.set("b", 5).unwrap();
        assert_eq!(e.run_count(), 3);
    }

    #[test]
    fn dropped_effect_is_freed() {
        let count = Ref::new(0);
        let captured = Rc::new(());
        let weak = Rc::downgrade(&captured);

        let reader = count.clone();
        let e = effect(move || {
            let _keep = &captured;
            reader.get()
        });
        assert_eq!(count.subscriber_count(), 1);

        drop(e);
        assert_eq!(count.subscriber_count(), 0);
        assert_eq!(weak.strong_count(), 0);

        // Writes after the drop reach nobody.
        count.set(1);
        drop(count);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn effect_kept_by_clone_still_reacts() {
        let count = Ref::new(0);
        let reader = count.clone();
        let e = effect(move || reader.get());
        let kept = e.clone();
        drop(e);

        count.set(1);
        assert_eq!(kept.run_count(), 2);
    }

    #[test]
    fn effect_clone_shares_state() {
        let e1 = effect(|| ());
        let e2 = e1.clone();
        assert_eq!(e1.id(), e2.id());

        e1.run();
        assert_eq!(e2.run_count(), 2);

        e1.stop();
        assert!(!e2.is_active());
    }
}
