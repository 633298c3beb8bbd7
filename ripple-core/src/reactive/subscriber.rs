//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that re-runs when the reactive values it
//! read change. Effects, computed values and component render jobs are all
//! subscribers.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::dep::Dep;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. Dependency sets are keyed
/// by this ID so a subscriber is registered at most once per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be registered in a [`Dep`].
pub(crate) trait Subscriber {
    fn id(&self) -> SubscriberId;

    /// Called when one of the subscriber's dependencies was written.
    fn notify(self: Rc<Self>);

    /// Whether the subscriber is currently executing.
    fn is_running(&self) -> bool;

    /// Whether the subscriber still wants notifications.
    fn is_active(&self) -> bool;

    /// Remember a dep this subscriber was registered in, so it can be
    /// removed again before the next run or on stop.
    fn record_dep(&self, dep: Dep);
}
