//! Plain-data value model.
//!
//! Wrapper backends never reflect on arbitrary host types. Instead, the data
//! they instrument is an explicit tagged tree: a [`Value`] is a primitive
//! leaf, an object (string-keyed map), or an array. The [`Shape`] of a value
//! is determined once, at wrap time, and drives backend dispatch.
//!
//! # Invariants
//!
//! 1. `Value` is plain owned data: cloning copies, equality is deep.
//! 2. `shape()` is total and constant-time.
//! 3. `Float` carries IEEE semantics: `NaN != NaN`, so an equality-checked
//!    write of NaN over NaN always counts as a change.

use std::collections::BTreeMap;
use std::fmt;

/// Classification of a [`Value`], computed once at wrap time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Not object-shaped; passes through wrapping unchanged.
    Primitive,
    /// String-keyed map; wrappable.
    Object,
    /// Ordered sequence; wrappable.
    Array,
}

/// A key addressing one child of an object or array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Named property of an object.
    Prop(String),
    /// Positional element of an array.
    Index(usize),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Prop(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Prop(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Prop(name) => write!(f, "{name}"),
            Key::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Plain data: the input and the source of truth for every wrapper backend.
///
/// JSON-shaped on purpose: primitives, arrays, and string-keyed objects cover
/// everything the binding layer observes. `PartialEq` is deep value equality
/// (`Eq` is precluded by floats).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Build an object from key/value pairs.
    #[must_use]
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build an array from a sequence of values.
    #[must_use]
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    /// Classify this value. Decided once at wrap time; backends never
    /// re-inspect a value's shape after that.
    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Value::Object(_) => Shape::Object,
            Value::Array(_) => Shape::Array,
            _ => Shape::Primitive,
        }
    }

    /// Whether this value passes through wrapping unchanged.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.shape() == Shape::Primitive
    }

    /// Borrow the child addressed by `key`, if present.
    ///
    /// An index key on an object addresses the property with the decimal
    /// name (the source host coerces index keys to strings); a property key
    /// on an array addresses the element at the parsed index, if the name
    /// parses.
    #[must_use]
    pub fn child(&self, key: &Key) -> Option<&Value> {
        match (self, key) {
            (Value::Object(map), Key::Prop(name)) => map.get(name),
            (Value::Object(map), Key::Index(index)) => map.get(&index.to_string()),
            (Value::Array(items), Key::Index(index)) => items.get(*index),
            (Value::Array(items), Key::Prop(name)) => {
                name.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        }
    }

    /// Mutably borrow the child addressed by `key`, if present.
    #[must_use]
    pub fn child_mut(&mut self, key: &Key) -> Option<&mut Value> {
        match (self, key) {
            (Value::Object(map), Key::Prop(name)) => map.get_mut(name),
            (Value::Object(map), Key::Index(index)) => map.get_mut(&index.to_string()),
            (Value::Array(items), Key::Index(index)) => items.get_mut(*index),
            (Value::Array(items), Key::Prop(name)) => {
                name.parse::<usize>().ok().and_then(|i| items.get_mut(i))
            }
            _ => None,
        }
    }

    /// Store `value` under `key`, inserting the key if absent.
    ///
    /// Writing past the end of an array fills the gap with `Null` (the
    /// sparse-extension behavior of the source host). Writes into a
    /// primitive are ignored — there is no child to address.
    pub fn set_child(&mut self, key: &Key, value: Value) {
        match (self, key) {
            (Value::Object(map), Key::Prop(name)) => {
                map.insert(name.clone(), value);
            }
            (Value::Object(map), Key::Index(index)) => {
                map.insert(index.to_string(), value);
            }
            (Value::Array(items), key) => {
                let index = match key {
                    Key::Index(index) => Some(*index),
                    Key::Prop(name) => name.parse::<usize>().ok(),
                };
                if let Some(index) = index {
                    if index < items.len() {
                        items[index] = value;
                    } else {
                        items.resize(index, Value::Null);
                        items.push(value);
                    }
                }
            }
            _ => {}
        }
    }

    /// Remove the child addressed by `key`, returning the prior value.
    ///
    /// Object keys are removed outright. Array elements are replaced with
    /// `Null` rather than shifted — deletion leaves a hole, it does not
    /// compact (matching delete-on-index in the source host).
    pub fn remove_child(&mut self, key: &Key) -> Option<Value> {
        match (self, key) {
            (Value::Object(map), Key::Prop(name)) => map.remove(name),
            (Value::Object(map), Key::Index(index)) => map.remove(&index.to_string()),
            (Value::Array(items), key) => {
                let index = match key {
                    Key::Index(index) => Some(*index),
                    Key::Prop(name) => name.parse::<usize>().ok(),
                };
                match index {
                    Some(index) if index < items.len() => {
                        Some(std::mem::replace(&mut items[index], Value::Null))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Object(v)
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

#[cfg(feature = "serde")]
impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
