//! Reactive Runtime
//!
//! The runtime owns the dependency graph that connects reactive objects to
//! the effects that read them.
//!
//! # How It Works
//!
//! 1. When a proxy property is read inside an effect run, the proxy calls
//!    [`track`] with its raw object and the key. The runtime finds (or
//!    creates) the [`Dep`] for that pair and registers the running effect.
//!
//! 2. When a proxy property is written, the proxy calls [`trigger`]. The
//!    runtime looks up the dep for the pair and notifies its subscribers.
//!    A pair nobody tracked is a silent no-op.
//!
//! 3. Effects remove themselves from every dep before each run and on stop,
//!    so a dep only ever holds the effects whose latest run read the pair.
//!
//! # Ownership
//!
//! The graph is keyed by [`ObjectId`] and holds targets weakly, so tracking
//! an object never keeps it alive. Entries for dropped targets are pruned
//! whenever the map grows past a watermark.
//!
//! # Thread Safety
//!
//! Reactivity is single-threaded. The graph lives in thread-local storage,
//! so each thread has its own independent graph.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;

use tracing::trace;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::value::{Key, ObjectCell, ObjectId, RawObject};

/// Minimum size of the target map before dead entries are swept.
const PRUNE_THRESHOLD: usize = 64;

struct TargetEntry {
    target: Weak<ObjectCell>,
    deps: HashMap<Key, Dep>,
}

#[derive(Default)]
struct TargetMap {
    entries: HashMap<ObjectId, TargetEntry>,
    prune_at: usize,
}

impl TargetMap {
    fn dep_for(&mut self, target: &RawObject, key: &Key) -> Dep {
        if self.entries.len() >= self.prune_at.max(PRUNE_THRESHOLD) {
            self.prune();
            self.prune_at = self.entries.len() * 2;
        }

        self.entries
            .entry(target.id())
            .or_insert_with(|| TargetEntry {
                target: target.downgrade(),
                deps: HashMap::new(),
            })
            .deps
            .entry(key.clone())
            .or_default()
            .clone()
    }

    fn lookup(&self, target: &RawObject, key: &Key) -> Option<Dep> {
        self.entries
            .get(&target.id())
            .and_then(|entry| entry.deps.get(key))
            .cloned()
    }

    fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.target.strong_count() > 0);
        let removed = before - self.entries.len();
        if removed > 0 {
            trace!(removed, remaining = self.entries.len(), "pruned dead targets");
        }
        removed
    }
}

thread_local! {
    static TARGET_MAP: RefCell<TargetMap> = RefCell::new(TargetMap::default());
}

/// Entry point to the thread's dependency graph.
pub struct Runtime;

impl Runtime {
    /// Register the running effect as a dependent of `(target, key)`.
    ///
    /// Does nothing when no effect is tracking.
    pub fn track(target: &RawObject, key: &Key) {
        if !ReactiveContext::is_tracking() {
            return;
        }
        // The map borrow must end before the dep calls back into the effect.
        let dep = TARGET_MAP.with(|map| map.borrow_mut().dep_for(target, key));
        dep.track();
    }

    /// Notify every dependent of `(target, key)`.
    pub fn trigger(target: &RawObject, key: &Key) {
        let dep = TARGET_MAP.with(|map| map.borrow().lookup(target, key));
        if let Some(dep) = dep {
            dep.trigger();
        }
    }

    /// Number of effects currently registered for `(target, key)`.
    pub fn dependent_count(target: &RawObject, key: &Key) -> usize {
        TARGET_MAP
            .with(|map| map.borrow().lookup(target, key))
            .map_or(0, |dep| dep.len())
    }

    /// Number of targets with graph entries, live or not yet pruned.
    pub fn tracked_target_count() -> usize {
        TARGET_MAP.with(|map| map.borrow().entries.len())
    }

    /// Drop graph entries whose target no longer exists.
    ///
    /// Returns the number of entries removed.
    pub fn prune() -> usize {
        TARGET_MAP.with(|map| map.borrow_mut().prune())
    }
}

/// Register the running effect as a dependent of `(target, key)`.
pub fn track(target: &RawObject, key: &Key) {
    Runtime::track(target, key);
}

/// Notify every dependent of `(target, key)`.
pub fn trigger(target: &RawObject, key: &Key) {
    Runtime::trigger(target, key);
}
