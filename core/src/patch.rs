//! JSON Patch (RFC 6902) generation by structural comparison.
//!
//! Objects are compared key by key and recursed into; every other pair of
//! differing values, arrays included, is replaced whole. Array elements are
//! never diffed individually.
//!
//! Ordering is deterministic: keys of the `from` object in their order
//! (`remove` or a recursive diff), then keys only present in `to` in their
//! insertion order (`add`).

use serde::Serialize;

use crate::value::Value;

/// One JSON Patch operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Test { path: String, value: Value },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path }
            | PatchOp::Replace { path, .. }
            | PatchOp::Test { path, .. } => path,
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            PatchOp::Add { .. } => "add",
            PatchOp::Remove { .. } => "remove",
            PatchOp::Replace { .. } => "replace",
            PatchOp::Test { .. } => "test",
        }
    }
}

/// Operations turning `from` into `to`.
pub fn diff(from: &Value, to: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    walk(from, to, "", false, &mut ops);
    ops
}

/// Like [`diff`], with a `test` op guarding every `remove` and `replace` so
/// the server rejects the patch if the resource changed underneath.
pub fn diff_guarded(from: &Value, to: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    walk(from, to, "", true, &mut ops);
    ops
}

fn walk(from: &Value, to: &Value, path: &str, guarded: bool, ops: &mut Vec<PatchOp>) {
    if from == to || same_text(from, to) {
        return;
    }

    if let (Value::Object(a), Value::Object(b)) = (from, to) {
        for (key, old) in a {
            let child = pointer_join(path, key);
            match b.get(key) {
                Some(new) => walk(old, new, &child, guarded, ops),
                None => {
                    if guarded {
                        ops.push(PatchOp::Test {
                            path: child.clone(),
                            value: old.clone(),
                        });
                    }
                    ops.push(PatchOp::Remove { path: child });
                }
            }
        }
        for (key, new) in b {
            if !a.contains_key(key) {
                ops.push(PatchOp::Add {
                    path: pointer_join(path, key),
                    value: new.clone(),
                });
            }
        }
        return;
    }

    if guarded {
        ops.push(PatchOp::Test {
            path: path.to_string(),
            value: from.clone(),
        });
    }
    ops.push(PatchOp::Replace {
        path: path.to_string(),
        value: to.clone(),
    });
}

/// A decoded datetime and a string that serialize identically.
fn same_text(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::DateTime(dt), Value::String(text)) | (Value::String(text), Value::DateTime(dt)) => {
            dt.to_string() == *text
        }
        _ => false,
    }
}

/// RFC 6901 reference token escaping.
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Appends one escaped reference token to a JSON pointer.
pub fn pointer_join(base: &str, token: &str) -> String {
    format!("{base}/{}", escape_token(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn identical_values_produce_no_ops() {
        let a = v(json!({"a": 1, "b": {"c": [1, 2]}}));
        assert!(diff(&a, &a.clone()).is_empty());
    }

    #[test]
    fn removals_and_replacements_follow_baseline_order() {
        let ops = diff(&v(json!({"a": 1, "b": 2})), &v(json!({"b": 3})));
        assert_eq!(
            ops,
            vec![
                PatchOp::Remove { path: "/a".to_string() },
                PatchOp::Replace {
                    path: "/b".to_string(),
                    value: Value::from(3i64)
                },
            ]
        );
    }

    #[test]
    fn additions_come_after_baseline_keys_in_insertion_order() {
        let ops = diff(
            &v(json!({"a": 1})),
            &v(json!({"a": 2, "z": true, "m": null})),
        );
        let summary: Vec<_> = ops.iter().map(|o| (o.op(), o.path())).collect();
        assert_eq!(summary, vec![("replace", "/a"), ("add", "/z"), ("add", "/m")]);
    }

    #[test]
    fn nested_objects_are_recursed() {
        let ops = diff(
            &v(json!({"address": {"street": "1 Main", "town": "X"}})),
            &v(json!({"address": {"street": "2 Main", "town": "X"}})),
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path(), "/address/street");
    }

    #[test]
    fn arrays_are_replaced_whole() {
        let ops = diff(&v(json!({"tags": [1, 2, 3]})), &v(json!({"tags": [1, 2, 4]})));
        assert_eq!(
            ops,
            vec![PatchOp::Replace {
                path: "/tags".to_string(),
                value: v(json!([1, 2, 4]))
            }]
        );
    }

    #[test]
    fn type_mismatch_replaces_and_root_uses_empty_pointer() {
        let ops = diff(&v(json!([1])), &v(json!({"a": 1})));
        assert_eq!(ops[0].path(), "");
        assert_eq!(ops[0].op(), "replace");
    }

    #[test]
    fn guarded_diff_adds_test_before_remove_and_replace() {
        let ops = diff_guarded(&v(json!({"a": 1, "b": 2})), &v(json!({"b": 3, "c": 4})));
        let summary: Vec<_> = ops.iter().map(|o| (o.op(), o.path())).collect();
        assert_eq!(
            summary,
            vec![
                ("test", "/a"),
                ("remove", "/a"),
                ("test", "/b"),
                ("replace", "/b"),
                ("add", "/c"),
            ]
        );
    }

    #[test]
    fn datetime_and_matching_text_are_equal() {
        let stamp = crate::datetime::ParsedDatetime::parse("2026-01-02T03:04:05.557Z").unwrap();
        let mut map = crate::value::Map::new();
        map.insert("update_on".to_string(), Value::DateTime(stamp));
        let decoded = Value::Object(map);
        assert!(diff(&decoded, &v(json!({"update_on": "2026-01-02T03:04:05.557Z"}))).is_empty());
        assert_eq!(diff(&decoded, &v(json!({"update_on": "2026-01-02T03:04:05Z"}))).len(), 1);
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        assert_eq!(pointer_join("", "a/b~c"), "/a~1b~0c");
        let ops = diff(&v(json!({})), &v(json!({"x/y": 1})));
        assert_eq!(ops[0].path(), "/x~1y");
    }

    #[test]
    fn ops_serialize_in_json_patch_form() {
        let ops = diff(&v(json!({"a": 1, "b": 2})), &v(json!({"b": 3})));
        let text = serde_json::to_string(&ops).unwrap();
        assert_eq!(
            text,
            r#"[{"op":"remove","path":"/a"},{"op":"replace","path":"/b","value":3}]"#
        );
    }
}
