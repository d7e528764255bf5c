//! Dynamic document value type.
//!
//! Documents are trees of [`Value`]s rooted at a [`DocMap`]. Containers are
//! shared and internally locked: the single writer mutates them in place while
//! other threads read or iterate them without ever observing a torn entry.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::sync::Arc;

/// A document value.
///
/// Scalars are stored inline. `List` and `Map` are handles to shared
/// containers, so cloning a `Value` is cheap and the clone observes later
/// mutations of the same container. Use [`Value::deep_clone`] for an
/// independent copy.
///
/// Equality is structural: two containers are equal when their contents are,
/// regardless of identity. Map equality ignores key order.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value. As a command value it means "delete".
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Double-precision float.
    Float(f64),
    /// Text string.
    String(String),
    /// Ordered list of values.
    List(DocList),
    /// Insertion-ordered map from string keys to values.
    Map(DocMap),
}

impl Value {
    /// Returns true if this is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this is an integer or a float.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Returns false if this value or anything nested in it is a NaN or
    /// infinite float. JSON has no encoding for those.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::List(list) => list.inner.read().iter().all(Value::is_finite),
            Value::Map(map) => map.inner.read().values().all(Value::is_finite),
            _ => true,
        }
    }

    /// Returns the boolean value, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an `Integer`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map handle, if this is a `Map`.
    #[must_use]
    pub fn as_map(&self) -> Option<&DocMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the list handle, if this is a `List`.
    #[must_use]
    pub fn as_list(&self) -> Option<&DocList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Copies the whole tree into freshly allocated containers.
    #[must_use]
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::List(l) => Value::List(l.deep_clone()),
            Value::Map(m) => Value::Map(m.deep_clone()),
            scalar => scalar.clone(),
        }
    }

    /// Encodes the value as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes a value from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid JSON.
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Value> {
        serde_json::from_slice(bytes)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DocMap> for Value {
    fn from(m: DocMap) -> Self {
        Value::Map(m)
    }
}

impl From<DocList> for Value {
    fn from(l: DocList) -> Self {
        Value::List(l)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(DocList::from_vec(values))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(DocList::from_vec(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(object) => {
                let map = DocMap::new();
                for (k, v) in object {
                    map.insert(k, Value::from(v));
                }
                Value::Map(map)
            }
        }
    }
}

/// A shared, internally locked, insertion-ordered map.
///
/// Every accessor takes the lock only for the duration of the call. Reads
/// return clones of the stored values, so iteration never holds a lock while
/// user code runs and a concurrent writer is never blocked by a reader for
/// longer than one copy.
#[derive(Clone, Default)]
pub struct DocMap {
    inner: Arc<RwLock<IndexMap<String, Value>>>,
}

impl DocMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Inserts a value. An existing key keeps its position.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.write().insert(key.into(), value.into())
    }

    /// Removes a key, preserving the order of the remaining entries.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().shift_remove(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns the keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Returns the values in insertion order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.inner.read().values().cloned().collect()
    }

    /// Returns the entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Calls `f` for every entry of a point-in-time copy of the map.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Value),
    {
        for (k, v) in self.entries() {
            f(&k, &v);
        }
    }

    /// Returns true if both handles point to the same container.
    #[must_use]
    pub fn ptr_eq(&self, other: &DocMap) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copies the map and everything below it into fresh containers.
    #[must_use]
    pub fn deep_clone(&self) -> DocMap {
        let copy: IndexMap<String, Value> = self
            .inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.deep_clone()))
            .collect();
        DocMap {
            inner: Arc::new(RwLock::new(copy)),
        }
    }

    /// Runs `f` with exclusive access to the entries.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut IndexMap<String, Value>) -> R) -> R {
        f(&mut self.inner.write())
    }
}

impl PartialEq for DocMap {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        *self.inner.read() == *other.inner.read()
    }
}

impl fmt::Debug for DocMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.read().iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DocMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map: IndexMap<String, Value> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        DocMap {
            inner: Arc::new(RwLock::new(map)),
        }
    }
}

/// A shared, internally locked list.
#[derive(Clone, Default)]
pub struct DocList {
    inner: Arc<RwLock<Vec<Value>>>,
}

impl DocList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an owned vector.
    #[must_use]
    pub fn from_vec(values: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(values)),
        }
    }

    /// Returns a clone of the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.read().get(index).cloned()
    }

    /// Returns a clone of the last element.
    #[must_use]
    pub fn last(&self) -> Option<Value> {
        self.inner.read().last().cloned()
    }

    /// Appends a value.
    pub fn push(&self, value: impl Into<Value>) {
        self.inner.write().push(value.into());
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns a point-in-time copy of the elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.read().clone()
    }

    /// Returns true if both handles point to the same container.
    #[must_use]
    pub fn ptr_eq(&self, other: &DocList) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copies the list and everything below it into fresh containers.
    #[must_use]
    pub fn deep_clone(&self) -> DocList {
        let copy = self.inner.read().iter().map(Value::deep_clone).collect();
        DocList::from_vec(copy)
    }

    /// Runs `f` with exclusive access to the elements.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        f(&mut self.inner.write())
    }
}

impl PartialEq for DocList {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        *self.inner.read() == *other.inner.read()
    }
}

impl fmt::Debug for DocList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.read().iter()).finish()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(l) => l.serialize(serializer),
            Value::Map(m) => m.serialize(serializer),
        }
    }
}

impl Serialize for DocMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.inner.read();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (k, v) in entries.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for DocList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let items = self.inner.read();
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Integer(n))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Value, E> {
        Ok(i64::try_from(n).map_or(Value::Float(n as f64), Value::Integer))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::String(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::List(DocList::from_vec(items)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut entries = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, Value>()? {
            entries.insert(k, v);
        }
        Ok(Value::Map(DocMap {
            inner: Arc::new(RwLock::new(entries)),
        }))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
