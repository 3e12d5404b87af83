//! Layered configuration document.
//!
//! A [`Document`] is an immutable snapshot of four layers (schema defaults,
//! file, environment, programmatic overrides) plus their merge. Every
//! mutation produces a new snapshot; managers publish snapshots whole.

use crate::sources::EnvOverlay;
use serde_json::{Map, Value};

/// Separator between segments of a key path.
pub const KEY_SEPARATOR: char = '.';

/// Look up a dotted key. Numeric segments index into lists.
pub fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return Some(root);
    }
    key.split(KEY_SEPARATOR).try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Insert `value` at a dotted key, creating intermediate tables.
///
/// Non-table values on the way are replaced by tables.
pub fn insert(root: &mut Value, key: &str, value: Value) {
    let mut node = root;
    let mut segments = key.split(KEY_SEPARATOR).peekable();
    while let Some(segment) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            unreachable!("node was just made a table")
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Deep-merge `overlay` into `base`. Tables merge key by key; anything else
/// in the overlay replaces what is below it.
pub fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Every leaf of the tree as `(dotted key, value)`. Lists are leaves.
pub fn leaf_paths(root: &Value) -> Vec<(String, &Value)> {
    fn walk<'a>(prefix: &str, node: &'a Value, out: &mut Vec<(String, &'a Value)>) {
        match node {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}{}{}", prefix, KEY_SEPARATOR, key)
                    };
                    walk(&path, child, out);
                }
            }
            Value::Object(_) if prefix.is_empty() => {}
            leaf => out.push((prefix.to_string(), leaf)),
        }
    }

    let mut out = Vec::new();
    walk("", root, &mut out);
    out
}

fn empty() -> Value {
    Value::Object(Map::new())
}

/// Immutable snapshot of a configuration kind's layered values.
#[derive(Debug, Clone)]
pub struct Document {
    defaults: Value,
    file: Value,
    env: Value,
    overrides: Value,
    merged: Value,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            defaults: empty(),
            file: empty(),
            env: empty(),
            overrides: empty(),
            merged: empty(),
        }
    }
}

impl Document {
    /// Snapshot holding only `defaults` (plus whatever the environment overrides).
    pub fn new(defaults: Value, env: &EnvOverlay) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
        .rebuild(env)
    }

    /// Copy of this snapshot with the defaults layer replaced.
    pub fn with_defaults(&self, defaults: Value, env: &EnvOverlay) -> Self {
        Self {
            defaults,
            ..self.clone()
        }
        .rebuild(env)
    }

    /// Copy of this snapshot with the file layer replaced.
    pub fn with_file(&self, file: Value, env: &EnvOverlay) -> Self {
        Self {
            file,
            ..self.clone()
        }
        .rebuild(env)
    }

    /// Copy of this snapshot with one override added.
    pub fn with_override(&self, key: &str, value: Value, env: &EnvOverlay) -> Self {
        let mut next = self.clone();
        insert(&mut next.overrides, key, value);
        next.rebuild(env)
    }

    fn rebuild(mut self, env: &EnvOverlay) -> Self {
        let mut merged = self.defaults.clone();
        merge(&mut merged, &self.file);
        self.env = env.overlay(&merged);
        merge(&mut merged, &self.env);
        merge(&mut merged, &self.overrides);
        self.merged = merged;
        self
    }

    /// Effective value at a dotted key. `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.merged, key).filter(|v| !v.is_null())
    }

    /// Whether the key has a value from the file, environment, or an override.
    pub fn is_set(&self, key: &str) -> bool {
        [&self.file, &self.env, &self.overrides]
            .into_iter()
            .any(|layer| lookup(layer, key).is_some_and(|v| !v.is_null()))
    }

    /// The fully merged tree.
    pub fn merged(&self) -> &Value {
        &self.merged
    }

    /// Only the schema defaults.
    pub fn defaults(&self) -> &Value {
        &self.defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_paths() {
        let root = json!({"a": {"b": [10, {"c": true}]}});
        assert_eq!(lookup(&root, "a.b.0"), Some(&json!(10)));
        assert_eq!(lookup(&root, "a.b.1.c"), Some(&json!(true)));
        assert_eq!(lookup(&root, "a.x"), None);
        assert_eq!(lookup(&root, "a.b.c"), None);
    }

    #[test]
    fn test_insert_creates_tables() {
        let mut root = json!({"a": 1});
        insert(&mut root, "a.b.c", json!("x"));
        assert_eq!(root, json!({"a": {"b": {"c": "x"}}}));
    }

    #[test]
    fn test_merge_is_deep() {
        let mut base = json!({"server": {"port": 1, "host": "h"}, "list": [1, 2]});
        merge(&mut base, &json!({"server": {"port": 2}, "list": [3]}));
        assert_eq!(base, json!({"server": {"port": 2, "host": "h"}, "list": [3]}));
    }

    #[test]
    fn test_leaf_paths() {
        let root = json!({"a": {"b": 1, "c": [1]}, "d": {}});
        let mut keys: Vec<String> = leaf_paths(&root).into_iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, vec!["a.b", "a.c", "d"]);
    }

    #[test]
    fn test_layer_precedence() {
        let env = EnvOverlay::disabled();
        let doc = Document::new(json!({"host": "localhost", "port": 8080}), &env)
            .with_file(json!({"port": 8081}), &env)
            .with_override("port", json!(9090), &env);

        assert_eq!(doc.get("port"), Some(&json!(9090)));
        assert_eq!(doc.get("host"), Some(&json!("localhost")));
        assert!(doc.is_set("port"));
        assert!(!doc.is_set("host"));
    }

    #[test]
    fn test_file_replacement_keeps_overrides() {
        let env = EnvOverlay::disabled();
        let doc = Document::new(json!({"a": 1, "b": 1}), &env)
            .with_file(json!({"a": 2}), &env)
            .with_override("b", json!(5), &env)
            .with_file(json!({"a": 3}), &env);

        assert_eq!(doc.get("a"), Some(&json!(3)));
        assert_eq!(doc.get("b"), Some(&json!(5)));
    }

    #[test]
    fn test_default_replacement_keeps_overrides() {
        let env = EnvOverlay::disabled();
        let doc = Document::default()
            .with_override("port", json!(1), &env)
            .with_defaults(json!({"host": "localhost", "port": 8080}), &env);

        assert_eq!(doc.get("port"), Some(&json!(1)));
        assert_eq!(doc.get("host"), Some(&json!("localhost")));
        assert!(!doc.is_set("host"));
    }

    #[test]
    fn test_null_is_absent() {
        let env = EnvOverlay::disabled();
        let doc = Document::new(json!({"a": null}), &env);
        assert!(doc.get("a").is_none());
        assert!(!doc.is_set("a"));
    }
}
