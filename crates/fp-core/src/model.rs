//! Engine-side view of the selected diagram element, plus the live value
//! snapshot.
//!
//! The diagramming toolkit owns the real model; what the panel engine works
//! with is a per-selection `Element` capture: id, type, the persisted
//! business data as a JSON object, the raw attribute bag, and the parent
//! chain up to the process root. Hosts rebuild it on every selection or
//! content change — nothing here is live.
//!
//! `Snapshot` is the mutable side: property key → current value for the
//! duration of one selection. Values are `serde_json::Value` throughout —
//! the schema does not know at compile time what element types exist, so
//! the value layer stays dynamic while everything around it is typed.

use crate::key::PropKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

// ─── Element ─────────────────────────────────────────────────────────────

/// A captured diagram element: the unit of selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Stable element id (`Task_1`, `StartEvent_2`, ...).
    pub id: String,
    /// Fully-qualified type id (`bpmn:UserTask`, `bpmn:SequenceFlow`, ...).
    pub element_type: String,
    /// Persisted semantic attributes, independent of geometry. Always an
    /// object for well-formed captures.
    pub business: Value,
    /// Raw attribute bag (`$attrs` in the source model): extension
    /// attributes that never made it into the typed business data.
    pub attrs: Map<String, Value>,
    /// Containment chain toward the process root, innermost first.
    pub parent: Option<Box<Element>>,
}

impl Element {
    pub fn new(id: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            business: Value::Object(Map::new()),
            attrs: Map::new(),
            parent: None,
        }
    }

    #[must_use]
    pub fn with_business(mut self, business: Value) -> Self {
        self.business = business;
        self
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: Element) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// The outermost element of the parent chain (`self` when detached).
    pub fn root(&self) -> &Element {
        let mut cur = self;
        while let Some(p) = &cur.parent {
            cur = p;
        }
        cur
    }

    /// Business data as an object map, when well-formed.
    pub fn business_object(&self) -> Option<&Map<String, Value>> {
        self.business.as_object()
    }

    /// Mutable business data, coercing a malformed capture to an object.
    pub fn business_object_mut(&mut self) -> &mut Map<String, Value> {
        if !self.business.is_object() {
            self.business = Value::Object(Map::new());
        }
        match &mut self.business {
            Value::Object(map) => map,
            _ => unreachable!("business coerced to object above"),
        }
    }
}

// ─── Snapshot ────────────────────────────────────────────────────────────

/// Live property key → value mapping for the current selection.
///
/// Built by the binder when an element is selected (see `bind::snapshot`),
/// updated in place as the user edits, discarded on the next selection.
/// Carries `id` and `type` pseudo-entries so conditions can match on
/// element identity through the default lookup context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    values: HashMap<PropKey, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: PropKey) -> Option<&Value> {
        self.values.get(&key)
    }

    pub fn set(&mut self, key: PropKey, value: Value) {
        self.values.insert(key, value);
    }

    pub fn remove(&mut self, key: PropKey) -> Option<Value> {
        self.values.remove(&key)
    }

    pub fn contains(&self, key: PropKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropKey, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

// ─── Dot-path access ─────────────────────────────────────────────────────

/// Read a nested value by dot-separated path. A plain key (no dots) is a
/// direct object lookup. Traversal through anything that is not an object
/// resolves to `None`.
pub fn path_get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for part in path.split('.') {
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

/// Write a nested value by dot-separated path, creating intermediate
/// objects as needed. An intermediate that exists but is not an object is
/// replaced by one — the write wins over a malformed shape.
pub fn path_set(root: &mut Value, path: &str, value: Value) {
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    let mut cur = root;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        let map = match cur {
            Value::Object(map) => map,
            _ => unreachable!("intermediates coerced to objects below"),
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        let slot = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        cur = slot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn path_get_traverses_nested_objects() {
        let v = json!({"loopCharacteristics": {"isSequential": true}});
        assert_eq!(
            path_get(&v, "loopCharacteristics.isSequential"),
            Some(&json!(true))
        );
        assert_eq!(path_get(&v, "loopCharacteristics.missing"), None);
        assert_eq!(path_get(&v, "name"), None);
    }

    #[test]
    fn path_get_stops_at_non_objects() {
        let v = json!({"a": 5});
        assert_eq!(path_get(&v, "a.b"), None);
    }

    #[test]
    fn path_set_builds_intermediates() {
        let mut v = json!({});
        path_set(&mut v, "a.b.c", json!("deep"));
        assert_eq!(v, json!({"a": {"b": {"c": "deep"}}}));
    }

    #[test]
    fn path_set_replaces_scalar_intermediate() {
        let mut v = json!({"a": 1});
        path_set(&mut v, "a.b", json!(2));
        assert_eq!(v, json!({"a": {"b": 2}}));
    }

    #[test]
    fn path_set_preserves_siblings() {
        let mut v = json!({"a": {"keep": "me"}});
        path_set(&mut v, "a.b", json!(true));
        assert_eq!(v, json!({"a": {"keep": "me", "b": true}}));
    }

    #[test]
    fn root_walks_parent_chain() {
        let process = Element::new("Process_1", "bpmn:Process");
        let sub = Element::new("SubProcess_1", "bpmn:SubProcess").with_parent(process);
        let task = Element::new("Task_1", "bpmn:UserTask").with_parent(sub);
        assert_eq!(task.root().id, "Process_1");
        assert_eq!(task.parent.as_ref().map(|p| p.id.as_str()), Some("SubProcess_1"));
    }

    #[test]
    fn business_object_mut_coerces_malformed_capture() {
        let mut el = Element::new("Task_1", "bpmn:Task").with_business(json!("oops"));
        el.business_object_mut().insert("name".into(), json!("Review"));
        assert_eq!(el.business, json!({"name": "Review"}));
    }
}
