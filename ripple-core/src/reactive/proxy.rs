//! Reactive Wrappers
//!
//! A [`Reactive`] wraps a [`RawObject`] and routes every property access
//! through the dependency graph: reads track, writes trigger.
//!
//! # Profiles
//!
//! | profile            | read tracks | nested objects      | writes   |
//! |--------------------|-------------|---------------------|----------|
//! | `Mutable`          | yes         | wrapped mutable     | trigger  |
//! | `Readonly`         | no          | wrapped readonly    | rejected |
//! | `ShallowReadonly`  | no          | returned unwrapped  | rejected |
//!
//! Nested wrapping is lazy: a nested object is only wrapped when it is read,
//! so cyclic or very large structures cost nothing up front.
//!
//! Rejected writes leave the object untouched, log a warning and return
//! [`Error::ReadonlyWrite`].
//!
//! # Identity
//!
//! A wrapper is a different value from the object it wraps. Two wrappers
//! are the same value when they wrap the same object with the same profile.

use std::fmt;

use tracing::warn;

use super::runtime::{track, trigger};
use super::value::{Key, RawObject, Value};
use crate::error::{Error, Result};

/// Interception profile of a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Mutable,
    Readonly,
    ShallowReadonly,
}

impl ProxyKind {
    pub fn is_readonly(self) -> bool {
        !matches!(self, ProxyKind::Mutable)
    }
}

/// A tracking view over a raw object.
#[derive(Clone)]
pub struct Reactive {
    raw: RawObject,
    kind: ProxyKind,
}

impl Reactive {
    /// Wrap an object mutably.
    pub fn new(raw: RawObject) -> Self {
        Self::with_kind(raw, ProxyKind::Mutable)
    }

    /// Wrap an object read-only, wrapping nested objects read-only too.
    pub fn readonly(raw: RawObject) -> Self {
        Self::with_kind(raw, ProxyKind::Readonly)
    }

    /// Wrap an object read-only without wrapping nested objects.
    pub fn shallow_readonly(raw: RawObject) -> Self {
        Self::with_kind(raw, ProxyKind::ShallowReadonly)
    }

    pub fn with_kind(raw: RawObject, kind: ProxyKind) -> Self {
        Self { raw, kind }
    }

    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    /// Whether this is a mutable reactive wrapper.
    pub fn is_reactive(&self) -> bool {
        self.kind == ProxyKind::Mutable
    }

    /// Whether writes through this wrapper are rejected.
    pub fn is_readonly(&self) -> bool {
        self.kind.is_readonly()
    }

    /// The wrapped object.
    pub fn raw(&self) -> &RawObject {
        &self.raw
    }

    /// Read a property.
    ///
    /// Mutable wrappers track the read. Object values come back wrapped
    /// with this wrapper's read-only-ness, except through a shallow wrapper,
    /// which returns the stored value as-is.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let value = self.raw.get(&key);
        if self.kind == ProxyKind::ShallowReadonly {
            return value;
        }
        if !self.is_readonly() {
            track(&self.raw, &key);
        }
        self.wrap_nested(value)
    }

    /// Write a property and notify its dependents.
    ///
    /// Dependents of the key are triggered on every successful write. A
    /// write that adds a field or extends a list also triggers `Length`.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        if self.is_readonly() {
            warn!(%key, "set ignored: target is readonly");
            return Err(Error::ReadonlyWrite { key });
        }

        let grew = self
            .raw
            .set(key.clone(), unwrap_proxy(value.into()))
            .inspect_err(|err| warn!(%err, "set ignored"))?;

        trigger(&self.raw, &key);
        if grew {
            trigger(&self.raw, &Key::Length);
        }
        Ok(())
    }

    /// Append to a list and notify dependents of the new index and `Length`.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        if self.is_readonly() {
            warn!("push ignored: target is readonly");
            return Err(Error::ReadonlyWrite { key: Key::Length });
        }
        let index = self.raw.push(unwrap_proxy(value.into()))?;
        trigger(&self.raw, &Key::Index(index));
        trigger(&self.raw, &Key::Length);
        Ok(index)
    }

    /// Remove a record field, returning the old value.
    pub fn remove(&self, key: impl Into<Key>) -> Result<Option<Value>> {
        let key = key.into();
        if self.is_readonly() {
            warn!(%key, "remove ignored: target is readonly");
            return Err(Error::ReadonlyWrite { key });
        }
        let old = self.raw.remove(&key);
        if old.is_some() {
            trigger(&self.raw, &key);
            trigger(&self.raw, &Key::Length);
        }
        Ok(old)
    }

    /// Number of fields or entries. Tracks `Length`.
    pub fn len(&self) -> usize {
        if !self.is_readonly() {
            track(&self.raw, &Key::Length);
        }
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in order. Tracks `Length`, so added fields are observed.
    pub fn keys(&self) -> Vec<Key> {
        if !self.is_readonly() {
            track(&self.raw, &Key::Length);
        }
        self.raw.keys()
    }

    /// Whether both wrap the same object with the same profile.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        self.kind == other.kind && self.raw.ptr_eq(&other.raw)
    }

    fn wrap_nested(&self, value: Value) -> Value {
        let kind = if self.is_readonly() {
            ProxyKind::Readonly
        } else {
            ProxyKind::Mutable
        };
        match value {
            Value::Object(raw) => Value::Proxy(Reactive { raw, kind }),
            Value::Proxy(inner) if self.is_readonly() && !inner.is_readonly() => {
                Value::Proxy(Reactive {
                    raw: inner.raw,
                    kind,
                })
            }
            other => other,
        }
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive")
            .field(&self.kind)
            .field(&self.raw)
            .finish()
    }
}

impl TryFrom<Value> for Reactive {
    type Error = Error;

    /// Wrap an object mutably; existing wrappers convert as-is.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(raw) => Ok(Reactive::new(raw)),
            Value::Proxy(proxy) => Ok(proxy),
            other => Err(Error::NotAnObject {
                found: other.type_name(),
            }),
        }
    }
}

fn unwrap_proxy(value: Value) -> Value {
    match value {
        Value::Proxy(proxy) => Value::Object(proxy.raw),
        other => other,
    }
}

fn create(target: Value, kind: ProxyKind) -> Value {
    match target {
        Value::Object(raw) => Value::Proxy(Reactive { raw, kind }),
        // Wrapping a readonly view mutably would grant write access.
        Value::Proxy(proxy) if kind == ProxyKind::Mutable && proxy.is_readonly() => {
            Value::Proxy(proxy)
        }
        Value::Proxy(proxy) => Value::Proxy(Reactive {
            raw: proxy.raw,
            kind,
        }),
        other => {
            warn!(found = other.type_name(), ?kind, "value cannot be wrapped: not an object");
            other
        }
    }
}

/// Wrap an object so that reads track and writes trigger.
///
/// Non-objects are returned unchanged after a warning.
pub fn reactive(target: impl Into<Value>) -> Value {
    create(target.into(), ProxyKind::Mutable)
}

/// Wrap an object so that writes are rejected at every depth.
pub fn readonly(target: impl Into<Value>) -> Value {
    create(target.into(), ProxyKind::Readonly)
}

/// Wrap an object so that top-level writes are rejected. Nested objects are
/// returned as stored.
pub fn shallow_readonly(target: impl Into<Value>) -> Value {
    create(target.into(), ProxyKind::ShallowReadonly)
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Proxy(proxy) if proxy.is_reactive())
}

pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Proxy(proxy) if proxy.is_readonly())
}

pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Proxy(_))
}

/// The object behind a wrapper; other values are returned as-is.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Proxy(proxy) => Value::Object(proxy.raw.clone()),
        other => other.clone(),
    }
}
