//! Patch-trackable JSON document.
//!
//! A `Document` owns the current value and a frozen copy taken when it was
//! created (the baseline). Mutations only touch the current value; the patch
//! is computed by comparing the two, so nested edits made through
//! [`Document::get_mut`] are tracked the same way as [`Document::set`].
//! The baseline never moves on its own: call [`Document::rebaseline`] after a
//! patch has been applied server-side if the document is reused.

use std::fmt;

use crate::error::{ApiError, Result};
use crate::patch::{self, PatchOp};
use crate::value::{Map, Value};

/// Location inside a document as a sequence of keys.
///
/// Built from a dotted string (`"address.street"`), a slice of segments, or a
/// `Vec<String>`. Numeric segments index into arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// JSON pointer form, e.g. `/address/street`.
    pub fn pointer(&self) -> String {
        self.0
            .iter()
            .fold(String::new(), |acc, seg| patch::pointer_join(&acc, seg))
    }
}

impl From<&str> for KeyPath {
    fn from(dotted: &str) -> Self {
        KeyPath(dotted.split('.').map(str::to_string).collect())
    }
}

impl From<&String> for KeyPath {
    fn from(dotted: &String) -> Self {
        KeyPath::from(dotted.as_str())
    }
}

impl From<&[&str]> for KeyPath {
    fn from(segments: &[&str]) -> Self {
        KeyPath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for KeyPath {
    fn from(segments: [&str; N]) -> Self {
        KeyPath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(segments: Vec<String>) -> Self {
        KeyPath(segments)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    current: Value,
    baseline: Value,
}

impl Document {
    /// Wraps `root` and snapshots it as the baseline.
    pub fn new(root: impl Into<Value>) -> Self {
        let current = root.into();
        Self {
            baseline: current.clone(),
            current,
        }
    }

    /// An empty object document.
    pub fn empty() -> Self {
        Self::new(Map::new())
    }

    pub fn value(&self) -> &Value {
        &self.current
    }

    pub fn baseline(&self) -> &Value {
        &self.baseline
    }

    pub fn into_value(self) -> Value {
        self.current
    }

    pub fn get(&self, path: impl Into<KeyPath>) -> Option<&Value> {
        let path = path.into();
        path.0
            .iter()
            .try_fold(&self.current, |node, seg| child(node, seg))
    }

    /// Mutable access for in-place nested edits.
    pub fn get_mut(&mut self, path: impl Into<KeyPath>) -> Option<&mut Value> {
        let path = path.into();
        path.0
            .iter()
            .try_fold(&mut self.current, |node, seg| child_mut(node, seg))
    }

    pub fn contains_key(&self, path: impl Into<KeyPath>) -> bool {
        self.get(path).is_some()
    }

    /// Top-level keys in order; empty when the root is not an object.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.current
            .as_object()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    /// Assigns `value` at `path`, creating missing intermediate objects.
    ///
    /// Returns the previous value. Fails when an intermediate segment is a
    /// scalar, or indexes past the end of an array.
    pub fn set(&mut self, path: impl Into<KeyPath>, value: impl Into<Value>) -> Result<Option<Value>> {
        let path = path.into();
        let Some((last, parents)) = path.0.split_last() else {
            return Err(ApiError::InvalidPath("empty path".to_string()));
        };

        let mut node = &mut self.current;
        for seg in parents {
            node = match node {
                Value::Object(map) => map
                    .entry(seg.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => {
                    let index = array_index(seg, items.len())
                        .ok_or_else(|| ApiError::InvalidPath(path.to_string()))?;
                    &mut items[index]
                }
                _ => return Err(ApiError::InvalidPath(path.to_string())),
            };
        }

        let value = value.into();
        match node {
            Value::Object(map) => Ok(map.insert(last.clone(), value)),
            Value::Array(items) => match last.parse::<usize>() {
                Ok(index) if index < items.len() => Ok(Some(std::mem::replace(&mut items[index], value))),
                Ok(index) if index == items.len() => {
                    items.push(value);
                    Ok(None)
                }
                _ => Err(ApiError::InvalidPath(path.to_string())),
            },
            _ => Err(ApiError::InvalidPath(path.to_string())),
        }
    }

    /// Deletes the value at `path`, returning it. Object keys keep the
    /// relative order of the remaining entries.
    pub fn remove(&mut self, path: impl Into<KeyPath>) -> Option<Value> {
        let path = path.into();
        let (last, parents) = path.0.split_last()?;
        let parent = parents
            .iter()
            .try_fold(&mut self.current, |node, seg| child_mut(node, seg))?;
        match parent {
            Value::Object(map) => map.shift_remove(last),
            Value::Array(items) => {
                let index = array_index(last, items.len())?;
                Some(items.remove(index))
            }
            _ => None,
        }
    }

    pub fn is_modified(&self) -> bool {
        !self.compute_patch().is_empty()
    }

    /// Operations that turn the baseline into the current value.
    pub fn compute_patch(&self) -> Vec<PatchOp> {
        patch::diff(&self.baseline, &self.current)
    }

    /// [`Document::compute_patch`] with `test` guards before every `remove`
    /// and `replace`.
    pub fn compute_guarded_patch(&self) -> Vec<PatchOp> {
        patch::diff_guarded(&self.baseline, &self.current)
    }

    /// The patch as a JSON string, ready to send as a PATCH body.
    pub fn patch_string(&self) -> Result<String> {
        serde_json::to_string(&self.compute_patch()).map_err(|e| ApiError::Serialization(e.to_string()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&self.current).map_err(|e| ApiError::Serialization(e.to_string()))
    }

    /// Makes the current value the new baseline.
    pub fn rebaseline(&mut self) {
        self.baseline = self.current.clone();
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Document::new(value)
    }
}

fn child<'a>(node: &'a Value, seg: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => items.get(seg.parse::<usize>().ok()?),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, seg: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(seg),
        Value::Array(items) => items.get_mut(seg.parse::<usize>().ok()?),
        _ => None,
    }
}

fn array_index(seg: &str, len: usize) -> Option<usize> {
    seg.parse::<usize>().ok().filter(|i| *i < len)
}
