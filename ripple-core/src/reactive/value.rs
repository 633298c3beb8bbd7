//! Dynamic Values
//!
//! Reactive state in Ripple is dynamically shaped: component state, props and
//! nested records are all built from [`Value`]s. Records and lists live behind
//! a shared [`RawObject`] handle, so two values can point at the same object
//! and a write through one is visible through the other.
//!
//! # Identity
//!
//! Every raw object gets a process-unique [`ObjectId`] when it is created.
//! The dependency graph keys its entries by this ID, never by address.
//!
//! # Equality
//!
//! [`Value::same_value`] follows SameValue semantics: scalars compare by
//! value (NaN equals NaN, `0.0` and `-0.0` differ), everything else compares
//! by identity. `PartialEq` for `Value` uses the same rule.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};

use super::proxy::Reactive;
use super::refs::Ref;
use crate::error::{Error, Result};

/// Counter for generating unique object IDs.
static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Longest run of `Null`s a single list write may pad with.
pub const MAX_LIST_PADDING: usize = 1 << 16;

thread_local! {
    /// Objects and refs currently being printed or serialized.
    static VISITING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Marks a shared cell as being walked, so cycles stop at the second visit.
pub(crate) struct Visit(usize);

impl Visit {
    /// `None` when `ptr` is already being walked further up the stack.
    pub(crate) fn enter<T>(ptr: *const T) -> Option<Self> {
        let addr = ptr as usize;
        VISITING
            .with(|visiting| visiting.borrow_mut().insert(addr))
            .then_some(Self(addr))
    }
}

impl Drop for Visit {
    fn drop(&mut self) {
        VISITING.with(|visiting| {
            visiting.borrow_mut().remove(&self.0);
        });
    }
}

/// Unique identifier for a raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A property key on a reactive object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named field of a record.
    Field(Rc<str>),
    /// A position in a list.
    Index(usize),
    /// The number of entries. Tracked by `len()`, triggered when an
    /// object grows.
    Length,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Length => f.write_str("length"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(Rc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(Rc::from(name))
    }
}

impl From<Rc<str>> for Key {
    fn from(name: Rc<str>) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// The contents of a raw object.
#[derive(Debug, Clone)]
pub enum ObjectData {
    /// Named fields in insertion order.
    Record(IndexMap<Rc<str>, Value>),
    /// Positional entries.
    List(Vec<Value>),
}

impl ObjectData {
    fn kind(&self) -> &'static str {
        match self {
            ObjectData::Record(_) => "record",
            ObjectData::List(_) => "list",
        }
    }
}

pub(crate) struct ObjectCell {
    id: ObjectId,
    data: RefCell<ObjectData>,
}

/// A shared, mutable record or list.
///
/// Reads and writes on a `RawObject` never track or trigger. Wrap it in a
/// [`Reactive`] proxy to get the reactive contract.
#[derive(Clone)]
pub struct RawObject(Rc<ObjectCell>);

impl RawObject {
    fn from_data(data: ObjectData) -> Self {
        Self(Rc::new(ObjectCell {
            id: ObjectId::next(),
            data: RefCell::new(data),
        }))
    }

    /// Create an empty record.
    pub fn record() -> Self {
        Self::from_data(ObjectData::Record(IndexMap::new()))
    }

    /// Create an empty list.
    pub fn list() -> Self {
        Self::from_data(ObjectData::List(Vec::new()))
    }

    /// Create a record from `(name, value)` pairs.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Self::from_data(ObjectData::Record(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Create a list from values.
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::from_data(ObjectData::List(values.into_iter().map(Into::into).collect()))
    }

    /// Get the object's unique ID.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Check whether this object is a list.
    pub fn is_list(&self) -> bool {
        matches!(*self.0.data.borrow(), ObjectData::List(_))
    }

    /// Number of fields or entries.
    pub fn len(&self) -> usize {
        match &*self.0.data.borrow() {
            ObjectData::Record(fields) => fields.len(),
            ObjectData::List(items) => items.len(),
        }
    }

    /// Check whether the object has no fields or entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a property. Missing properties read as `Null`.
    pub fn get(&self, key: &Key) -> Value {
        match (&*self.0.data.borrow(), key) {
            (ObjectData::Record(fields), Key::Field(name)) => {
                fields.get(name).cloned().unwrap_or_default()
            }
            (ObjectData::List(items), Key::Index(index)) => {
                items.get(*index).cloned().unwrap_or_default()
            }
            (data, Key::Length) => Value::Int(match data {
                ObjectData::Record(fields) => fields.len() as i64,
                ObjectData::List(items) => items.len() as i64,
            }),
            _ => Value::Null,
        }
    }

    /// Check whether a property exists.
    pub fn contains_key(&self, key: &Key) -> bool {
        match (&*self.0.data.borrow(), key) {
            (ObjectData::Record(fields), Key::Field(name)) => fields.contains_key(name),
            (ObjectData::List(items), Key::Index(index)) => *index < items.len(),
            _ => false,
        }
    }

    /// Write a property.
    ///
    /// Writing past the end of a list pads it with `Null`, up to
    /// [`MAX_LIST_PADDING`] entries. Returns whether the write grew the
    /// object.
    pub fn set(&self, key: Key, value: Value) -> Result<bool> {
        let mut data = self.0.data.borrow_mut();
        match (&mut *data, key) {
            (ObjectData::Record(fields), Key::Field(name)) => {
                Ok(fields.insert(name, value).is_none())
            }
            (ObjectData::List(items), Key::Index(index)) => {
                if index < items.len() {
                    items[index] = value;
                    Ok(false)
                } else if index - items.len() > MAX_LIST_PADDING {
                    Err(Error::IndexOutOfRange {
                        index,
                        len: items.len(),
                    })
                } else {
                    items.resize(index, Value::Null);
                    items.push(value);
                    Ok(true)
                }
            }
            (data, key) => Err(Error::InvalidKey {
                key,
                container: data.kind(),
            }),
        }
    }

    /// Remove a record field, returning the old value.
    pub fn remove(&self, key: &Key) -> Option<Value> {
        match (&mut *self.0.data.borrow_mut(), key) {
            (ObjectData::Record(fields), Key::Field(name)) => fields.shift_remove(name),
            _ => None,
        }
    }

    /// Append to a list, returning the new entry's index.
    pub fn push(&self, value: Value) -> Result<usize> {
        match &mut *self.0.data.borrow_mut() {
            ObjectData::List(items) => {
                items.push(value);
                Ok(items.len() - 1)
            }
            data => Err(Error::InvalidKey {
                key: Key::Length,
                container: data.kind(),
            }),
        }
    }

    /// The object's keys in order.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.0.data.borrow() {
            ObjectData::Record(fields) => fields.keys().cloned().map(Key::Field).collect(),
            ObjectData::List(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    /// A copy of the object's contents.
    pub fn snapshot(&self) -> ObjectData {
        self.0.data.borrow().clone()
    }

    /// Check whether two handles point at the same object.
    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectCell> {
        Rc::downgrade(&self.0)
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Cyclic objects only print their ID when re-entered.
        let Some(_visit) = Visit::enter(Rc::as_ptr(&self.0)) else {
            return write!(f, "RawObject({})", self.0.id.0);
        };
        match self.0.data.try_borrow() {
            Ok(data) => match &*data {
                ObjectData::Record(fields) => f.debug_map().entries(fields.iter()).finish(),
                ObjectData::List(items) => f.debug_list().entries(items.iter()).finish(),
            },
            Err(_) => write!(f, "RawObject({})", self.0.id.0),
        }
    }
}

/// A callable value, used for event handlers and emitted events.
#[derive(Clone)]
pub struct Func(Rc<dyn Fn(&[Value]) -> Value>);

impl Func {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self(Rc::new(f))
    }

    /// Call the function.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Check whether two handles point at the same function.
    pub fn ptr_eq(&self, other: &Func) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Func({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// An unwrapped record or list.
    Object(RawObject),
    /// A reactive, readonly or shallow-readonly wrapper around an object.
    Proxy(Reactive),
    /// A reactive box.
    Ref(Ref),
    Func(Func),
}

impl Value {
    /// Compare two values with SameValue semantics.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            (Value::Func(a), Value::Func(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Name of the value's variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Proxy(_) => "proxy",
            Value::Ref(_) => "ref",
            Value::Func(_) => "function",
        }
    }

    /// Check whether the value is an object or a wrapper around one.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&RawObject> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Reactive> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_ref_value(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&Func> {
        match self {
            Value::Func(func) => Some(func),
            _ => None,
        }
    }

    /// Text shown when the value is interpolated into a text node.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Ref(r) => match Visit::enter(r.as_ptr()) {
                Some(_visit) => r.get_untracked().to_display_string(),
                None => String::new(),
            },
            // Cyclic objects fail to serialize and display as empty.
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

/// Check whether a write of `new` over `old` is a change.
pub fn has_changed(old: &Value, new: &Value) -> bool {
    !old.same_value(new)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(obj) => write!(f, "Object({obj:?})"),
            Value::Proxy(proxy) => write!(f, "{proxy:?}"),
            Value::Ref(r) => write!(f, "{r:?}"),
            Value::Func(func) => write!(f, "{func:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<RawObject> for Value {
    fn from(obj: RawObject) -> Self {
        Value::Object(obj)
    }
}

impl From<Reactive> for Value {
    fn from(proxy: Reactive) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<Func> for Value {
    fn from(func: Func) -> Self {
        Value::Func(func)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Object(RawObject::from_values(items))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Object(RawObject::from_values(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(fields) => Value::Object(RawObject::from_entries(
                fields.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

impl Serialize for RawObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let Some(_visit) = Visit::enter(Rc::as_ptr(&self.0)) else {
            return Err(S::Error::custom(format_args!(
                "object {} contains itself",
                self.0.id.0
            )));
        };
        match &*self.0.data.borrow() {
            ObjectData::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(&**k, v)?;
                }
                map.end()
            }
            ObjectData::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Func(_) => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Object(obj) => obj.serialize(serializer),
            Value::Proxy(proxy) => proxy.raw().serialize(serializer),
            Value::Ref(r) => {
                let Some(_visit) = Visit::enter(r.as_ptr()) else {
                    return Err(S::Error::custom("ref contains itself"));
                };
                r.get_untracked().serialize(serializer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_semantics() {
        assert!(Value::from(f64::NAN).same_value(&Value::from(f64::NAN)));
        assert!(!Value::from(0.0).same_value(&Value::from(-0.0)));
        assert!(Value::from("a").same_value(&Value::from("a")));
        assert!(!Value::from(1).same_value(&Value::from(1.0)));

        let obj = RawObject::record();
        let a = Value::from(obj.clone());
        assert!(a.same_value(&Value::from(obj)));
        assert!(!a.same_value(&Value::from(RawObject::record())));
    }

    #[test]
    fn object_ids_are_unique() {
        let a = RawObject::record();
        let b = RawObject::record();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn record_get_and_set() {
        let obj = RawObject::from_entries([("foo", 1)]);
        assert_eq!(obj.get(&"foo".into()), Value::from(1));
        assert!(obj.get(&"missing".into()).is_null());

        assert_eq!(obj.set("foo".into(), Value::from(2)), Ok(false));
        assert_eq!(obj.set("bar".into(), Value::from(3)), Ok(true));
        assert_eq!(obj.len(), 2);
        assert_eq!(obj.get(&Key::Length), Value::from(2));
    }

    #[test]
    fn list_writes_past_end_pad_with_null() {
        let list = RawObject::from_values([1]);
        assert_eq!(list.set(Key::Index(2), Value::from(3)), Ok(true));
        assert_eq!(list.len(), 3);
        assert!(list.get(&Key::Index(1)).is_null());
    }

    #[test]
    fn far_list_writes_are_rejected() {
        let list = RawObject::from_values([1]);
        let err = list.set(Key::Index(usize::MAX), Value::from(2)).unwrap_err();
        assert_eq!(
            err,
            Error::IndexOutOfRange {
                index: usize::MAX,
                len: 1
            }
        );
        assert!(list.set(Key::Index(MAX_LIST_PADDING + 2), Value::Null).is_err());
        assert_eq!(list.len(), 1);

        assert_eq!(list.set(Key::Index(MAX_LIST_PADDING + 1), Value::Null), Ok(true));
        assert_eq!(list.len(), MAX_LIST_PADDING + 2);
    }

    #[test]
    fn cyclic_objects_print_and_fail_to_serialize() {
        let obj = RawObject::from_entries([("n", 1)]);
        obj.set("self".into(), Value::Object(obj.clone())).unwrap();

        let printed = format!("{obj:?}");
        assert!(printed.contains(&format!("RawObject({})", obj.id().raw())));
        assert!(serde_json::to_string(&Value::Object(obj.clone())).is_err());
        assert_eq!(Value::Object(obj.clone()).to_display_string(), "");

        // The same object twice, side by side, is not a cycle.
        let inner = RawObject::from_values([1]);
        let pair = Value::from(RawObject::from_values([inner.clone(), inner]));
        assert_eq!(pair.to_display_string(), "[[1],[1]]");

        // Break the cycle so the object can be freed.
        obj.remove(&"self".into());
    }

    #[test]
    fn mismatched_keys_are_rejected() {
        let obj = RawObject::record();
        let err = obj.set(Key::Index(0), Value::Null).unwrap_err();
        assert!(matches!(err, Error::InvalidKey { container: "record", .. }));
        assert!(obj.push(Value::Null).is_err());
        assert!(obj.get(&Key::Index(0)).is_null());
    }

    #[test]
    fn json_conversion_builds_nested_objects() {
        let value = Value::from(json!({ "a": { "b": 1 }, "arr": [{ "x": 1.5 }] }));
        let obj = value.as_object().unwrap();
        let a = obj.get(&"a".into());
        assert_eq!(a.as_object().unwrap().get(&"b".into()), Value::from(1));

        let arr = obj.get(&"arr".into());
        assert!(arr.as_object().unwrap().is_list());

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({ "a": { "b": 1 }, "arr": [{ "x": 1.5 }] })
        );
    }

    #[test]
    fn display_strings() {
        assert_eq!(Value::Null.to_display_string(), "");
        assert_eq!(Value::from(3).to_display_string(), "3");
        assert_eq!(Value::from("hi").to_display_string(), "hi");
        assert_eq!(Value::from(json!([1, 2])).to_display_string(), "[1,2]");
    }
}
