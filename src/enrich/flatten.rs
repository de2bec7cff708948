//! Nested-to-flat key transform.

use serde_json::{Map, Value};

const SEPARATOR: &str = "_";

/// Flattens nested objects into one level, joining key paths with `_`.
///
/// Objects are descended into; every other value (scalars and arrays) is a
/// leaf. An empty nested object contributes nothing. Keys are not escaped,
/// so `{"a": {"b": 1}}` and `{"a_b": 2}` both produce `a_b`; the entry
/// visited last wins.
pub fn flatten(map: &Map<String, Value>, prefix: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    let mut path: Vec<&str> = prefix.to_vec();
    flatten_into(map, &mut path, &mut out);
    out
}

fn flatten_into<'a>(
    map: &'a Map<String, Value>,
    path: &mut Vec<&'a str>,
    out: &mut Map<String, Value>,
) {
    for (key, value) in map {
        path.push(key.as_str());
        match value {
            Value::Object(nested) => flatten_into(nested, path, out),
            leaf => {
                out.insert(path.join(SEPARATOR), leaf.clone());
            }
        }
        path.pop();
    }
}
