//! Provide/inject scopes.
//!
//! Each component instance owns a [`ProvideScope`] chained to its parent's.
//! A lookup walks the chain outwards, so a value provided by any ancestor is
//! visible to every descendant unless a closer ancestor shadows it.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::Value;

#[derive(Debug, Default)]
pub struct ProvideScope {
    parent: Option<Rc<ProvideScope>>,
    local: RefCell<IndexMap<Rc<str>, Value>>,
}

impl ProvideScope {
    /// A root scope with no ancestors.
    pub fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A scope that falls back to `parent` for lookups.
    pub fn child(parent: &Rc<ProvideScope>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(parent.clone()),
            local: RefCell::default(),
        })
    }

    /// Provide a value to this scope and its descendants.
    pub fn provide(&self, key: impl Into<Rc<str>>, value: impl Into<Value>) {
        self.local.borrow_mut().insert(key.into(), value.into());
    }

    /// Find the closest value for `key`, starting at this scope.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.local.borrow().get(key) {
                return Some(value.clone());
            }
            scope = current.parent.as_deref();
        }
        None
    }

    /// Whether this scope itself provides `key`.
    pub fn provides(&self, key: &str) -> bool {
        self.local.borrow().contains_key(key)
    }
}
