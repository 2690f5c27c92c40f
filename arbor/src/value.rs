use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Key;

/// A dynamically typed raw value.
///
/// Containers have reference semantics: cloning an `Array` or `Object` value
/// clones the handle, not the contents, and `PartialEq` compares containers by
/// handle identity. Two structurally equal but distinct containers are never
/// equal. Scalars compare by value (`NaN != NaN`).
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value - what you get reading a key that isn't there.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Array),
    Object(Object),
}

/// A shared array of values. Cheap to clone; all clones see the same storage.
#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<Vec<Value>>>);

/// A shared insertion-ordered map of values.
#[derive(Clone, Default)]
pub struct Object(Arc<RwLock<IndexMap<Arc<str>, Value>>>);

/// Coarse type tag of a raw value. `Null` reports `Object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Undefined,
    Boolean,
    Number,
    String,
    Object,
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            TypeTag::Undefined => "undefined",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Object => "object",
        };
        write!(f, "{}", tag)
    }
}

impl Array {
    pub fn new(values: Vec<Value>) -> Self { Self(Arc::new(RwLock::new(values))) }

    pub fn len(&self) -> usize { self.0.read().unwrap().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn get(&self, index: usize) -> Value { self.0.read().unwrap().get(index).cloned().unwrap_or_default() }

    /// Shallow copy of the current contents (element handles, not deep clones).
    pub fn snapshot(&self) -> Vec<Value> { self.0.read().unwrap().clone() }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let mut values = self.0.write().unwrap();
        f(&mut values)
    }

    /// Writes `index`, extending with `Undefined` when the index is past the end.
    /// Returns true when the write grew the array.
    pub(crate) fn set_extend(&self, index: usize, value: Value) -> bool {
        let mut values = self.0.write().unwrap();
        let grew = index >= values.len();
        if grew {
            values.resize_with(index + 1, Value::default);
        }
        values[index] = value;
        grew
    }

    pub(crate) fn id(&self) -> usize { Arc::as_ptr(&self.0) as usize }
}

impl Object {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.0.read().unwrap().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn get(&self, key: &str) -> Value { self.0.read().unwrap().get(key).cloned().unwrap_or_default() }

    pub fn contains_key(&self, key: &str) -> bool { self.0.read().unwrap().contains_key(key) }

    pub fn insert(&self, key: impl Into<Arc<str>>, value: Value) { self.0.write().unwrap().insert(key.into(), value); }

    /// Removes `key` preserving the order of the remaining entries.
    /// Returns false when the key was not present.
    pub fn remove(&self, key: &str) -> bool { self.0.write().unwrap().shift_remove(key).is_some() }

    pub fn keys(&self) -> Vec<Arc<str>> { self.0.read().unwrap().keys().cloned().collect() }

    /// Shallow copy of the current entries.
    pub fn snapshot(&self) -> Vec<(Arc<str>, Value)> { self.0.read().unwrap().iter().map(|(k, v)| (k.clone(), v.clone())).collect() }

    pub(crate) fn id(&self) -> usize { Arc::as_ptr(&self.0) as usize }
}

impl FromIterator<(Arc<str>, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (Arc<str>, Value)>>(iter: I) -> Self {
        Self(Arc::new(RwLock::new(iter.into_iter().collect())))
    }
}

impl Value {
    pub fn type_of(&self) -> TypeTag {
        match self {
            Value::Undefined => TypeTag::Undefined,
            Value::Null => TypeTag::Object,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(_) => TypeTag::Number,
            Value::String(_) => TypeTag::String,
            Value::Array(_) | Value::Object(_) => TypeTag::Object,
        }
    }

    pub fn is_undefined(&self) -> bool { matches!(self, Value::Undefined) }

    /// True for arrays and objects - values that hold child paths.
    pub fn is_container(&self) -> bool { matches!(self, Value::Array(_) | Value::Object(_)) }

    /// Stable identity of the container handle, if this is a container.
    pub(crate) fn container_id(&self) -> Option<usize> {
        match self {
            Value::Array(array) => Some(array.id()),
            Value::Object(object) => Some(object.id()),
            _ => None,
        }
    }

    /// Reads one step down. Never fails: any mismatch yields `Undefined`.
    pub fn index(&self, key: &Key) -> Value {
        match (self, key) {
            (Value::Object(object), Key::Name(name)) => object.get(name),
            (Value::Object(object), Key::Index(index)) => object.get(&index.to_string()),
            (Value::Array(array), Key::Index(index)) => array.get(*index),
            (Value::String(string), Key::Index(index)) => match string.chars().nth(*index) {
                Some(ch) => Value::String(ch.to_string().into()),
                None => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }

    /// Loose equality: scalars coerce the way the `is` operation demands,
    /// containers compare by identity first and by coercion against scalars.
    /// Never panics, whatever the operand shapes.
    pub fn loose_eq(&self, other: &Value) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => *n == str_to_number(s),
            (Value::Bool(b), other) | (other, Value::Bool(b)) => Value::Number(*b as u8 as f64).loose_eq(other),
            (container, Value::Number(n)) | (Value::Number(n), container) if container.is_container() => container.as_number() == *n,
            (container, Value::String(s)) | (Value::String(s), container) if container.is_container() => *container.as_string() == **s,
            _ => false,
        }
    }

    /// The underlying value's own string coercion.
    pub fn as_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.to_string(),
            Value::Array(array) => {
                let parts: Vec<String> = array
                    .snapshot()
                    .iter()
                    .map(|element| match element {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.as_string(),
                    })
                    .collect();
                parts.join(",")
            }
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    /// The underlying value's own numeric coercion. `NaN` where not numeric.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => *b as u8 as f64,
            Value::Number(n) => *n,
            Value::String(s) => str_to_number(s),
            Value::Array(array) => match array.len() {
                0 => 0.0,
                1 => array.get(0).as_number(),
                _ => f64::NAN,
            },
            Value::Object(_) => f64::NAN,
        }
    }
}

fn str_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n.fract() == 0.0 && n.abs() < 9e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.as_string()) }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(array) => f.debug_list().entries(array.snapshot()).finish(),
            Value::Object(object) => {
                let mut map = f.debug_map();
                for (key, value) in object.snapshot() {
                    map.entry(&key, &value);
                }
                map.finish()
            }
        }
    }
}

// Conversions from plain Rust values

impl From<bool> for Value {
    fn from(b: bool) -> Value { Value::Bool(b) }
}
impl From<f64> for Value {
    fn from(n: f64) -> Value { Value::Number(n) }
}
impl From<f32> for Value {
    fn from(n: f32) -> Value { Value::Number(n as f64) }
}
impl From<i32> for Value {
    fn from(n: i32) -> Value { Value::Number(n as f64) }
}
impl From<i64> for Value {
    fn from(n: i64) -> Value { Value::Number(n as f64) }
}
impl From<u32> for Value {
    fn from(n: u32) -> Value { Value::Number(n as f64) }
}
impl From<usize> for Value {
    fn from(n: usize) -> Value { Value::Number(n as f64) }
}
impl From<&str> for Value {
    fn from(s: &str) -> Value { Value::String(s.into()) }
}
impl From<String> for Value {
    fn from(s: String) -> Value { Value::String(s.into()) }
}
impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Value { Value::String(s) }
}
impl From<Array> for Value {
    fn from(array: Array) -> Value { Value::Array(array) }
}
impl From<Object> for Value {
    fn from(object: Object) -> Value { Value::Object(object) }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Value { Value::Array(Array::new(values.into_iter().map(Into::into).collect())) }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Value {
        match value {
            Some(value) => value.into(),
            None => Value::Null,
        }
    }
}

// Comparisons against plain Rust values, mostly for assertions

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool { matches!(self, Value::String(s) if &**s == *other) }
}
impl PartialEq<f64> for Value {
    fn eq(&self, other: &f64) -> bool { matches!(self, Value::Number(n) if n == other) }
}
impl PartialEq<i32> for Value {
    fn eq(&self, other: &i32) -> bool { matches!(self, Value::Number(n) if *n == *other as f64) }
}
impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool { matches!(self, Value::Number(n) if *n == *other as f64) }
}
impl PartialEq<usize> for Value {
    fn eq(&self, other: &usize) -> bool { matches!(self, Value::Number(n) if *n == *other as f64) }
}
impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool { matches!(self, Value::Bool(b) if b == other) }
}

// serde: wrapped trees serialize exactly like their raw form

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(array) => {
                let values = array.snapshot();
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in &values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Value::Object(object) => {
                let entries = object.snapshot();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in &entries {
                    map.serialize_entry(&**key, value)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result { f.write_str("any value") }

            fn visit_bool<E>(self, b: bool) -> Result<Value, E> { Ok(Value::Bool(b)) }
            fn visit_i64<E>(self, n: i64) -> Result<Value, E> { Ok(Value::Number(n as f64)) }
            fn visit_u64<E>(self, n: u64) -> Result<Value, E> { Ok(Value::Number(n as f64)) }
            fn visit_f64<E>(self, n: f64) -> Result<Value, E> { Ok(Value::Number(n)) }
            fn visit_str<E>(self, s: &str) -> Result<Value, E> { Ok(Value::String(s.into())) }
            fn visit_unit<E>(self) -> Result<Value, E> { Ok(Value::Null) }
            fn visit_none<E>(self) -> Result<Value, E> { Ok(Value::Null) }

            fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element()? {
                    values.push(value);
                }
                Ok(Value::Array(Array::new(values)))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
                let mut entries: Vec<(Arc<str>, Value)> = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    entries.push((key.into(), value));
                }
                Ok(entries.into_iter().collect::<Object>().into())
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(values) => Value::Array(Array::new(values.into_iter().map(Into::into).collect())),
            serde_json::Value::Object(entries) => {
                Value::Object(entries.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> serde_json::Value {
        match value {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(array) => serde_json::Value::Array(array.snapshot().iter().map(Into::into).collect()),
            Value::Object(object) => serde_json::Value::Object(
                object.snapshot().iter().map(|(key, value)| (key.to_string(), value.into())).collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_compare_by_identity() {
        let a: Value = serde_json::json!({"x": 1}).into();
        let b: Value = serde_json::json!({"x": 1}).into();
        assert_ne!(a, b); // structurally equal, distinct handles
        assert_eq!(a, a.clone()); // clone shares the handle
    }

    #[test]
    fn scalars_compare_by_value() {
        assert_eq!(Value::from(1.5), Value::from(1.5));
        assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_eq!(Value::from("a"), Value::from("a"));
        assert_ne!(Value::Null, Value::Undefined);
    }

    #[test]
    fn loose_equality_coerces() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::from(5).loose_eq(&Value::from("5")));
        assert!(Value::from(true).loose_eq(&Value::from(1)));
        assert!(Value::from(vec![5]).loose_eq(&Value::from(5)));
        assert!(!Value::from("a").loose_eq(&Value::from("b")));
        assert!(!Value::from(f64::NAN).loose_eq(&Value::from(f64::NAN)));
    }

    #[test]
    fn coercions() {
        let list: Value = vec![1, 2, 3].into();
        assert_eq!(list.as_string(), "1,2,3");
        assert_eq!(Value::Undefined.as_string(), "undefined");
        assert_eq!(Value::from(1.5).as_string(), "1.5");
        assert_eq!(Value::from(2).as_string(), "2");
        assert_eq!(Value::from("12").as_number(), 12.0);
        assert!(Value::from("nope").as_number().is_nan());
        assert_eq!(Value::Null.as_number(), 0.0);
    }

    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({"drinks": ["coffee", "tea"], "count": 2, "none": null});
        let value: Value = json.clone().into();
        assert_eq!(serde_json::to_value(&value).unwrap(), json);
        let back: Value = serde_json::from_str(&serde_json::to_string(&value).unwrap()).unwrap();
        assert_eq!(serde_json::to_value(&back).unwrap(), json);
    }

    #[test]
    fn index_never_fails() {
        let value: Value = serde_json::json!({"a": [10, 20]}).into();
        assert_eq!(value.index(&Key::from("a")).index(&Key::Index(1)), 20);
        assert!(value.index(&Key::from("missing")).is_undefined());
        assert!(Value::Null.index(&Key::from("a")).is_undefined());
        assert_eq!(Value::from("abc").index(&Key::Index(1)), "b");
    }
}
