//! Decoded JSON values with domain-typed scalars.
//!
//! `Value` mirrors `serde_json::Value` with one extra leaf, `DateTime`, and
//! insertion-ordered objects so that patches and re-serialized payloads keep
//! the server's field order.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::datetime::{ParsedDatetime, ScalarHook};

/// Insertion-ordered JSON object.
pub type Map = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    DateTime(ParsedDatetime),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    /// Converts parsed JSON, passing every string leaf through `hook`.
    pub fn from_json_with(json: serde_json::Value, hook: &dyn ScalarHook) -> Self {
        convert(json, None, hook)
    }

    /// Plain JSON form; datetimes become strings in their source layout.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_string()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
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
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&ParsedDatetime> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Field of an object; `None` for other variants.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key)
    }
}

fn convert(json: serde_json::Value, key: Option<&str>, hook: &dyn ScalarHook) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n),
        serde_json::Value::String(s) => hook.decode(key, &s).unwrap_or(Value::String(s)),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| convert(v, key, hook)).collect())
        }
        serde_json::Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = convert(v, Some(&k), hook);
                    (k, v)
                })
                .collect(),
        ),
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json_with(json, &crate::datetime::NoopHook)
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<ParsedDatetime> for Value {
    fn from(dt: ParsedDatetime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => dt.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Compact JSON text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::DatetimeHook;
    use serde_json::json;

    #[test]
    fn hook_applies_to_nested_leaves() {
        let raw = json!({
            "stud_code": "S001",
            "dob": "2010-03-04",
            "notes": [{"note_date": "2026-02-11T10:45:12.557000"}],
            "tags": ["2026-01-01", "plain"]
        });
        let value = Value::from_json_with(raw, &DatetimeHook::new());
        assert_eq!(value.get("stud_code"), Some(&Value::from("S001")));
        assert!(value.get("dob").unwrap().as_datetime().is_some());
        let note = &value.get("notes").unwrap().as_array().unwrap()[0];
        assert_eq!(note.get("note_date").unwrap().as_datetime().unwrap().microsecond(), 557000);
        let tags = value.get("tags").unwrap().as_array().unwrap();
        assert!(tags[0].as_datetime().is_some());
        assert_eq!(tags[1].as_str(), Some("plain"));
    }

    #[test]
    fn array_elements_inherit_parent_key_for_restricted_hooks() {
        let raw = json!({"dob": ["2010-03-04"], "other": ["2010-03-04"]});
        let value = Value::from_json_with(raw, &DatetimeHook::for_fields(["dob"]));
        assert!(value.get("dob").unwrap().as_array().unwrap()[0].as_datetime().is_some());
        assert!(value.get("other").unwrap().as_array().unwrap()[0].as_str().is_some());
    }

    #[test]
    fn serializes_datetimes_in_source_layout_and_keeps_field_order() {
        let raw = json!({"z": 1, "a": "2026-02-11T10:45:12.557000", "m": [true, null]});
        let value = Value::from_json_with(raw, &DatetimeHook::new());
        assert_eq!(
            value.to_string(),
            r#"{"z":1,"a":"2026-02-11T10:45:12.557000","m":[true,null]}"#
        );
        assert_eq!(value.to_json()["a"], "2026-02-11T10:45:12.557000");
    }

    #[test]
    fn plain_conversion_leaves_strings_alone() {
        let value = Value::from(json!({"dob": "2010-03-04"}));
        assert_eq!(value.get("dob").unwrap().as_str(), Some("2010-03-04"));
    }
}
