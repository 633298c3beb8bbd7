//! Refs
//!
//! A [`Ref`] is a reactive box around a single value. Unlike proxies, a ref
//! does not go through the shared dependency graph: each ref owns its own
//! [`Dep`], which reading `.get()` tracks and a changing `.set()` triggers.
//!
//! Setting a value that is the same as the current one (SameValue, after
//! unwrapping proxies) does nothing. Object values are stored raw and
//! exposed wrapped in a mutable proxy.
//!
//! [`ProxyRefs`] is a view over a record of mixed ref and plain values that
//! unwraps refs on read and writes plain values into existing refs. It is
//! how component setup state is exposed to render functions.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::dep::Dep;
use super::proxy::{reactive, to_raw, Reactive};
use super::value::{has_changed, Key, RawObject, Value, Visit};
use crate::error::{Error, Result};

struct RefInner {
    raw: RefCell<Value>,
    value: RefCell<Value>,
    dep: Dep,
}

/// A reactive box.
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

fn to_reactive(value: &Value) -> Value {
    match value {
        Value::Object(_) => reactive(value.clone()),
        other => other.clone(),
    }
}

impl Ref {
    pub fn new(value: impl Into<Value>) -> Self {
        let raw = to_raw(&value.into());
        let value = to_reactive(&raw);
        Self(Rc::new(RefInner {
            raw: RefCell::new(raw),
            value: RefCell::new(value),
            dep: Dep::new(),
        }))
    }

    /// Read the value, tracking the ref.
    pub fn get(&self) -> Value {
        self.0.dep.track();
        self.get_untracked()
    }

    /// Read the value without tracking.
    pub fn get_untracked(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Replace the value and notify dependents if it changed.
    pub fn set(&self, value: impl Into<Value>) {
        let raw = to_raw(&value.into());
        if !has_changed(&self.0.raw.borrow(), &raw) {
            return;
        }
        *self.0.value.borrow_mut() = to_reactive(&raw);
        *self.0.raw.borrow_mut() = raw;
        self.0.dep.trigger();
    }

    /// Set the value computed from the current one. Does not track.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    /// Number of effects currently depending on the ref.
    pub fn subscriber_count(&self) -> usize {
        self.0.dep.len()
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(_visit) = Visit::enter(self.as_ptr()) else {
            return f.write_str("Ref(<cycle>)");
        };
        match self.0.value.try_borrow() {
            Ok(value) => f.debug_tuple("Ref").field(&*value).finish(),
            Err(_) => f.write_str("Ref(<borrowed>)"),
        }
    }
}

/// Box a value in a new ref.
pub fn ref_value(value: impl Into<Value>) -> Value {
    Value::Ref(Ref::new(value))
}

pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The ref's value (tracked) if `value` is a ref, otherwise `value` itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

/// A view over a record that unwraps refs on read.
#[derive(Clone, Debug)]
pub struct ProxyRefs {
    target: Target,
}

#[derive(Clone, Debug)]
enum Target {
    Raw(RawObject),
    Proxy(Reactive),
}

impl Target {
    fn raw(&self) -> &RawObject {
        match self {
            Target::Raw(raw) => raw,
            Target::Proxy(proxy) => proxy.raw(),
        }
    }
}

impl ProxyRefs {
    pub fn new(target: Value) -> Result<Self> {
        let target = match target {
            Value::Object(raw) => Target::Raw(raw),
            Value::Proxy(proxy) => Target::Proxy(proxy),
            other => {
                return Err(Error::NotAnObject {
                    found: other.type_name(),
                })
            }
        };
        Ok(Self { target })
    }

    /// A view over a fresh, empty record.
    pub fn empty() -> Self {
        Self {
            target: Target::Raw(RawObject::record()),
        }
    }

    /// Read a property, unwrapping a ref.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let value = match &self.target {
            Target::Raw(raw) => raw.get(&key),
            Target::Proxy(proxy) => proxy.get(key),
        };
        unref(&value)
    }

    /// Write a property.
    ///
    /// A plain value written over a ref is stored into the ref, keeping the
    /// ref and its dependents. Anything else replaces the slot.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        if let Value::Ref(slot) = self.target.raw().get(&key) {
            if !is_ref(&value) {
                slot.set(value);
                return Ok(());
            }
        }
        match &self.target {
            Target::Raw(raw) => raw.set(key, value).map(|_| ()),
            Target::Proxy(proxy) => proxy.set(key, value),
        }
    }

    /// Whether the record has the property. Does not track.
    pub fn contains_key(&self, key: &Key) -> bool {
        self.target.raw().contains_key(key)
    }

    /// The underlying record, refs included.
    pub fn raw(&self) -> &RawObject {
        self.target.raw()
    }
}

/// Build a ref-unwrapping view over a record.
pub fn proxy_refs(target: impl Into<Value>) -> Result<ProxyRefs> {
    ProxyRefs::new(target.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use crate::reactive::proxy::is_reactive;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn ref_get_and_set() {
        let a = Ref::new(1);
        assert_eq!(a.get(), Value::from(1));
        a.set(2);
        assert_eq!(a.get(), Value::from(2));
    }

    #[test]
    fn ref_is_reactive() {
        let a = Ref::new(1);
        let calls = Rc::new(Cell::new(0));
        let dummy = Rc::new(RefCell::new(Value::Null));

        let (reader, count, sink) = (a.clone(), calls.clone(), dummy.clone());
        let _e = effect(move || {
            count.set(count.get() + 1);
            *sink.borrow_mut() = reader.get();
        });
        assert_eq!(calls.get(), 1);
        assert_eq!(a.subscriber_count(), 1);

        a.set(2);
        assert_eq!(calls.get(), 2);
        assert_eq!(*dummy.borrow(), Value::from(2));

        // Same value does not trigger.
        a.set(2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn self_referencing_ref_prints() {
        let a = Ref::new(1);
        a.set(Value::Ref(a.clone()));
        assert_eq!(format!("{a:?}"), "Ref(Ref(<cycle>))");
        assert_eq!(Value::Ref(a.clone()).to_display_string(), "");
        assert!(serde_json::to_string(&Value::Ref(a.clone())).is_err());
        a.set(0);
    }

    #[test]
    fn nan_is_not_a_change() {
        let a = Ref::new(f64::NAN);
        let calls = Rc::new(Cell::new(0));
        let (reader, count) = (a.clone(), calls.clone());
        let _e = effect(move || {
            reader.get();
            count.set(count.get() + 1);
        });
        a.set(f64::NAN);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn object_values_are_exposed_reactive() {
        let a = Ref::new(Value::from(json!({ "count": 1 })));
        let value = a.get();
        assert!(is_reactive(&value));

        let calls = Rc::new(Cell::new(0));
        let (reader, count) = (a.clone(), calls.clone());
        let _e = effect(move || {
            let _ = reader.get().as_proxy().map(|p| p.get("count"));
            count.set(count.get() + 1);
        });

        value.as_proxy().unwrap().set("count", 2).unwrap();
        assert_eq!(calls.get(), 2);

        // Writing the same object back, wrapped or not, is not a change.
        a.set(value);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn is_ref_and_unref() {
        let a = ref_value(1);
        assert!(is_ref(&a));
        assert!(!is_ref(&Value::from(1)));
        assert_eq!(unref(&a), Value::from(1));
        assert_eq!(unref(&Value::from(1)), Value::from(1));
    }

    #[test]
    fn update_uses_current_value() {
        let a = Ref::new(1);
        a.update(|v| Value::from(v.as_int().unwrap_or_default() + 1));
        assert_eq!(a.get(), Value::from(2));
    }

    #[test]
    fn proxy_refs_unwrap_and_write_through() {
        let age = Ref::new(10);
        let user = RawObject::from_entries([
            ("age", Value::Ref(age.clone())),
            ("name", Value::from("xiaohong")),
        ]);
        let view = proxy_refs(user.clone()).unwrap();

        assert_eq!(view.get("age"), Value::from(10));
        assert_eq!(view.get("name"), Value::from("xiaohong"));

        view.set("age", 20).unwrap();
        assert_eq!(view.get("age"), Value::from(20));
        assert_eq!(age.get(), Value::from(20));

        let replacement = Ref::new(10);
        view.set("age", Value::Ref(replacement.clone())).unwrap();
        assert_eq!(view.get("age"), Value::from(10));
        assert!(replacement.ptr_eq(user.get(&"age".into()).as_ref_value().unwrap()));
        assert_eq!(age.get(), Value::from(20));
    }

    #[test]
    fn proxy_refs_rejects_non_objects() {
        assert_eq!(
            proxy_refs(1).unwrap_err(),
            Error::NotAnObject { found: "int" }
        );
    }
}
