//! The closed value variant stored in item properties and plugin settings.
//!
//! Values serialize untagged, so a TOML table or JSON document maps onto
//! them without any wrapping. The only structured marker is the blob
//! reference, written as `{"$blob": "<uri>"}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Key marking a serialized [`BlobRef`].
pub const BLOB_KEY: &str = "$blob";

/// Opaque reference to binary content stored outside the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlobRef {
    /// Path or URI of the referenced content.
    #[serde(rename = "$blob")]
    pub uri: String,
}

impl BlobRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// A property or setting value.
///
/// Variant order matters for untagged deserialization: integers must be
/// tried before floats and blob references before plain maps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Blob(BlobRef),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Blob(_) => "blob",
            Value::Map(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&BlobRef> {
        match self {
            Value::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    /// Whether this value is an integer or float.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Whether this value is, or nests, a mapping whose only entry is a
    /// string under `"$blob"`.
    ///
    /// That shape is the serialized form of [`Value::Blob`] and would load
    /// back as a blob reference instead of a mapping.
    pub fn contains_reserved_map(&self) -> bool {
        match self {
            Value::Map(map) => {
                (map.len() == 1 && matches!(map.get(BLOB_KEY), Some(Value::String(_))))
                    || map.values().any(Value::contains_reserved_map)
            }
            Value::List(items) => items.iter().any(Value::contains_reserved_map),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Blob(blob) => f.write_str(&blob.uri),
            Value::List(_) | Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
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

impl From<&Path> for Value {
    fn from(path: &Path) -> Self {
        Value::String(path.to_string_lossy().into_owned())
    }
}

impl From<BlobRef> for Value {
    fn from(blob: BlobRef) -> Self {
        Value::Blob(blob)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
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
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(uri)) = map.get(BLOB_KEY) {
                        return Value::Blob(BlobRef::new(uri.clone()));
                    }
                }
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Value::from(f),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Blob(blob) => serde_json::json!({ "$blob": blob.uri }),
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_json_shapes() {
        let value: Value =
            serde_json::from_str(r#"{"n": 3, "f": 1.5, "s": "x", "b": true, "l": [1, "a"]}"#)
                .unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map["n"], Value::Int(3));
        assert_eq!(map["f"], Value::Float(1.5));
        assert_eq!(map["s"], Value::from("x"));
        assert_eq!(map["b"], Value::Bool(true));
        assert_eq!(map["l"], Value::List(vec![Value::Int(1), Value::from("a")]));
    }

    #[test]
    fn blob_marker_is_recognised() {
        let value: Value = serde_json::from_str(r#"{"$blob": "/tmp/thumb.png"}"#).unwrap();
        assert_eq!(value, Value::Blob(BlobRef::new("/tmp/thumb.png")));

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"$blob":"/tmp/thumb.png"}"#);
    }

    #[test]
    fn map_with_extra_keys_is_not_a_blob() {
        let value: Value = serde_json::from_str(r#"{"$blob": "a", "other": 1}"#).unwrap();
        assert!(value.as_map().is_some());
    }

    #[test]
    fn blob_shaped_maps_are_reserved() {
        let blob_shaped = Value::Map(BTreeMap::from([(BLOB_KEY.to_string(), Value::from("x"))]));
        assert!(blob_shaped.contains_reserved_map());
        assert!(Value::List(vec![Value::Int(1), blob_shaped.clone()]).contains_reserved_map());
        assert!(
            Value::Map(BTreeMap::from([("inner".to_string(), blob_shaped)])).contains_reserved_map()
        );

        assert!(!Value::Blob(BlobRef::new("x")).contains_reserved_map());
        let with_extra = Value::Map(BTreeMap::from([
            (BLOB_KEY.to_string(), Value::from("x")),
            ("other".to_string(), Value::Int(1)),
        ]));
        assert!(!with_extra.contains_reserved_map());
        let non_string = Value::Map(BTreeMap::from([(BLOB_KEY.to_string(), Value::Int(1))]));
        assert!(!non_string.contains_reserved_map());
    }

    #[test]
    fn whole_floats_keep_their_variant() {
        let json = serde_json::to_string(&Value::Float(2.0)).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Float(2.0));
    }

    #[test]
    fn display_coercion() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::from("plate").to_string(), "plate");
        assert_eq!(Value::from(vec![1, 2]).to_string(), "[1,2]");
    }

    #[test]
    fn json_conversion_round_trip() {
        let original = serde_json::json!({"a": [1, 2.5, null], "b": {"$blob": "x"}});
        let value = Value::from(original.clone());
        assert!(value.as_map().unwrap()["b"].as_blob().is_some());
        assert_eq!(serde_json::Value::from(value), original);
    }
}
