//! Dependency Sets
//!
//! A [`Dep`] is the set of subscribers that read one reactive key. Reads
//! call [`Dep::track`] to add the running subscriber; writes call
//! [`Dep::trigger`] to notify everyone in the set.
//!
//! Subscribers are stored in insertion order, so they are notified in the
//! order they first read the key. They are held weakly: a dep never keeps
//! an effect alive, its owner does.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

/// A shared, ordered set of subscribers.
#[derive(Clone, Default)]
pub struct Dep(Rc<RefCell<IndexMap<SubscriberId, Weak<dyn Subscriber>>>>);

impl Dep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the running subscriber, if any.
    ///
    /// A subscriber is added at most once. The subscriber also records this
    /// dep so it can unregister itself later.
    pub fn track(&self) {
        let Some(sub) = ReactiveContext::current_subscriber() else {
            return;
        };
        let id = sub.id();
        if self.0.borrow().contains_key(&id) {
            return;
        }
        self.0.borrow_mut().insert(id, Rc::downgrade(&sub));
        sub.record_dep(self.clone());
    }

    /// Notify every subscriber in the set.
    ///
    /// Iterates over a snapshot so subscribers may track or untrack this dep
    /// while being notified. A subscriber removed by an earlier notification
    /// is skipped, as is the subscriber that is currently running. Entries
    /// whose subscriber was dropped are pruned.
    pub fn trigger(&self) {
        let snapshot: Vec<Rc<dyn Subscriber>> = {
            let mut subs = self.0.borrow_mut();
            subs.retain(|_, sub| sub.strong_count() > 0);
            subs.values().filter_map(Weak::upgrade).collect()
        };
        for sub in snapshot {
            if !self.contains(sub.id()) || !sub.is_active() || sub.is_running() {
                continue;
            }
            sub.notify();
        }
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.0.borrow_mut().shift_remove(&id);
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.0.borrow().contains_key(&id)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.0.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
