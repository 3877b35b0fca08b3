//! Per-installable output registries and the rules for propagating them
//! between dependent nodes.
//!
//! A local registry is a nested key-value tree addressed by dot-paths
//! (`outputs.cluster.endpoint`). Each node's registry is assembled from its
//! direct parents' registries plus its own freshly computed outputs, so
//! outputs flow down the dependency graph without ever leaking sideways.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Namespace under which node outputs are registered.
pub const OUTPUTS_KEY: &str = "outputs";

/// Reserved key for a node's own outputs. Never inherited by descendants.
pub const THIS_KEY: &str = "this";

/// Nested key-value store holding the outputs visible to one installable.
///
/// Treated as immutable once attached to an installable; concurrent reads by
/// multiple children are safe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalRegistry {
    root: Map<String, Value>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Set a value at a dot-path, creating intermediate objects as needed.
    /// A non-object value sitting on an intermediate segment is replaced.
    pub fn set(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        set_path(&mut self.root, &segments, value);
    }

    /// Look up a value at a dot-path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Remove the value at a dot-path, returning it if present.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let (parent_path, key) = match path.rsplit_once('.') {
            Some((parent, key)) => (Some(parent), key),
            None => (None, path),
        };
        let parent = match parent_path {
            None => &mut self.root,
            Some(parent_path) => {
                let mut current = &mut self.root;
                for segment in parent_path.split('.') {
                    current = current.get_mut(segment)?.as_object_mut()?;
                }
                current
            }
        };
        parent.remove(key)
    }

    /// Deep-merge another registry into this one. Objects merge recursively;
    /// any other value from `other` overwrites the existing entry.
    pub fn merge(&mut self, other: &LocalRegistry) {
        merge_objects(&mut self.root, &other.root);
    }

    /// Drop every key directly under the outputs namespace that is not a
    /// fully-qualified id (`manifestId:unitId`). Applied to a parent's
    /// contribution when it crosses a manifest boundary, so short-form keys
    /// never become ambiguous in another manifest.
    pub fn retain_fully_qualified_outputs(&mut self) {
        if let Some(Value::Object(outputs)) = self.root.get_mut(OUTPUTS_KEY) {
            outputs.retain(|key, _| key.contains(':'));
        }
    }

    /// The whole registry as a JSON value, for handing to templating.
    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }
}

/// Merge one direct parent's registry into a node's registry being assembled.
///
/// `crosses_manifest` is true when the parent belongs to a different manifest
/// than the node; in that case only fully-qualified output keys survive.
/// The parent's `outputs.this` entry is never inherited.
pub fn merge_parent_registry(
    registry: &mut LocalRegistry,
    parent: &LocalRegistry,
    crosses_manifest: bool,
) {
    let mut contribution = parent.clone();
    if crosses_manifest {
        contribution.retain_fully_qualified_outputs();
    }
    contribution.remove(&format!("{OUTPUTS_KEY}.{THIS_KEY}"));
    registry.merge(&contribution);
}

/// Register a node's own outputs under the three consumer-facing prefixes:
/// `outputs.this` (the node itself), `outputs.<shortId>` (same-manifest
/// siblings) and `outputs.<fullyQualifiedId>` (everyone downstream).
pub fn register_outputs(
    registry: &mut LocalRegistry,
    short_id: &str,
    fully_qualified_id: &str,
    outputs: &Map<String, Value>,
) {
    let short_id = normalize_key(short_id);
    let fq_id = normalize_key(fully_qualified_id);
    for (key, value) in outputs {
        registry.set(&format!("{OUTPUTS_KEY}.{THIS_KEY}.{key}"), value.clone());
        registry.set(&format!("{OUTPUTS_KEY}.{short_id}.{key}"), value.clone());
        registry.set(&format!("{OUTPUTS_KEY}.{fq_id}.{key}"), value.clone());
    }
}

/// Normalise an id for use as a registry key. The templating key syntax
/// can't address hyphenated map keys, so hyphens become underscores.
pub fn normalize_key(id: &str) -> String {
    id.replace('-', "_")
}

fn set_path(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(next) = entry {
                set_path(next, rest, value);
            } else {
                let mut next = Map::new();
                set_path(&mut next, rest, value);
                *entry = Value::Object(next);
            }
        }
    }
}

fn merge_objects(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, value) in src {
        match (dst.get_mut(key), value) {
            (Some(Value::Object(dst_obj)), Value::Object(src_obj)) => {
                merge_objects(dst_obj, src_obj);
            }
            _ => {
                dst.insert(key.clone(), value.clone());
            }
        }
    }
}
