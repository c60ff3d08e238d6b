//! Reading and writing property values on the element.
//!
//! The binder maps semantic field keys to the element's persisted business
//! data. Regular fields are dot-path lookups/assignments; fields whose
//! stored shape is not a flat scalar register a `FieldStrategy` that
//! reconstructs the logical value on read and plans a shape-preserving
//! update on write.
//!
//! Writes are mutations-as-data: a strategy *plans* a set of top-level
//! attribute updates, and the binder applies the whole plan through one
//! `ModelPort::update_properties` call — one call, one undoable step in
//! the toolkit's command system. The binder is a thin adapter, not a
//! transaction manager.

use crate::key::PropKey;
use crate::model::{Element, Snapshot, path_get, path_set};
use crate::schema::{PanelSchema, PropertyDef};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ─── Ports ───────────────────────────────────────────────────────────────

/// Constructs auxiliary structured values (a documentation entry, an event
/// definition) before they are attached to the element. The toolkit's
/// factory service, behind a trait.
pub trait ValueFactory {
    fn create(&mut self, type_name: &str, attrs: Map<String, Value>) -> Result<Value, String>;
}

/// The diagramming toolkit's mutation surface, as the binder needs it.
/// Implemented differently by each host environment; `MemoryPort` is the
/// in-process reference used by demos and tests.
pub trait ModelPort: ValueFactory {
    /// Apply a set of top-level attribute updates to an element as a
    /// single undoable step. A `null` value removes the attribute.
    fn update_properties(
        &mut self,
        element_id: &str,
        updates: Vec<(String, Value)>,
    ) -> Result<(), String>;
}

/// Mirror a plan's effect onto a captured element: top-level set, `null`
/// removes. The same semantics every port implementation must apply.
pub fn apply_updates(element: &mut Element, updates: &[(String, Value)]) {
    let business = element.business_object_mut();
    for (key, value) in updates {
        if value.is_null() {
            business.remove(key);
        } else {
            business.insert(key.clone(), value.clone());
        }
    }
}

// ─── Strategies ──────────────────────────────────────────────────────────

/// Read/write behavior for one special-cased field.
pub trait FieldStrategy: Send + Sync {
    /// Reconstruct the logical value from the stored shape.
    fn read(&self, element: &Element) -> Value;

    /// Plan the top-level updates that store `value`, preserving whatever
    /// sibling data the shape carries. The factory is for constructing new
    /// structured values only — the binder issues the actual mutation.
    fn plan_write(
        &self,
        element: &Element,
        value: &Value,
        factory: &mut dyn ValueFactory,
    ) -> Result<Vec<(String, Value)>, String>;
}

/// Dot-path behavior used by every field without a registered strategy.
/// A nested key rewrites its top-level subtree (cloned, then patched) so
/// the update stays a single top-level assignment.
fn plan_default_write(element: &Element, key: PropKey, value: &Value) -> Vec<(String, Value)> {
    let path = key.as_str();
    match path.split_once('.') {
        None => vec![(path.to_string(), value.clone())],
        Some((head, rest)) => {
            let mut subtree = element
                .business_object()
                .and_then(|b| b.get(head))
                .cloned()
                .unwrap_or(Value::Object(Map::new()));
            path_set(&mut subtree, rest, value.clone());
            vec![(head.to_string(), subtree)]
        }
    }
}

// ─── Binder ──────────────────────────────────────────────────────────────

/// Per-field read/write dispatch: the finite strategy table plus the
/// dot-path default.
#[derive(Clone, Default)]
pub struct Binder {
    strategies: HashMap<PropKey, Arc<dyn FieldStrategy>>,
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.strategies.keys().map(|k| k.as_str()).collect();
        f.debug_struct("Binder").field("strategies", &keys).finish()
    }
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_strategy(
        mut self,
        key: impl Into<PropKey>,
        strategy: impl FieldStrategy + 'static,
    ) -> Self {
        self.strategies.insert(key.into(), Arc::new(strategy));
        self
    }

    pub fn has_strategy(&self, key: PropKey) -> bool {
        self.strategies.contains_key(&key)
    }

    /// Read a field's logical value. `None` means the field is absent on
    /// the element (strategies always produce a value, absence included).
    pub fn read(&self, element: &Element, key: PropKey) -> Option<Value> {
        match self.strategies.get(&key) {
            Some(strategy) => Some(strategy.read(element)),
            None => path_get(&element.business, key.as_str()).cloned(),
        }
    }

    /// Write a field through the port and mirror the effect onto the
    /// capture. Read-only fields are silent no-ops.
    pub fn write(
        &self,
        element: &mut Element,
        def: &PropertyDef,
        value: &Value,
        port: &mut dyn ModelPort,
    ) -> Result<(), String> {
        if def.read_only {
            log::debug!("ignoring write to read-only field {}", def.key);
            return Ok(());
        }
        let plan = match self.strategies.get(&def.key) {
            Some(strategy) => strategy.plan_write(element, value, port)?,
            None => plan_default_write(element, def.key, value),
        };
        if plan.is_empty() {
            return Ok(());
        }
        port.update_properties(&element.id, plan.clone())
            .map_err(|e| format!("updating {} failed: {e}", def.key))?;
        apply_updates(element, &plan);
        Ok(())
    }

    /// Build the value snapshot for a fresh selection: every schema
    /// property read off the element (falling back to its default), plus
    /// the `id`/`type` pseudo-entries conditions match on.
    pub fn snapshot(&self, schema: &PanelSchema, element: &Element) -> Snapshot {
        let mut snap = Snapshot::new();
        for def in schema.all_properties() {
            let value = self
                .read(element, def.key)
                .or_else(|| def.default_value.as_ref().map(|d| d.resolve(element)));
            if let Some(value) = value {
                snap.set(def.key, value);
            }
        }
        snap.set(PropKey::intern("id"), Value::String(element.id.clone()));
        snap.set(
            PropKey::intern("type"),
            Value::String(element.element_type.clone()),
        );
        snap
    }
}

// ─── Reference port ──────────────────────────────────────────────────────

/// In-memory port applying plans to a captured element. The reference
/// implementation for demos and tests; real hosts adapt the toolkit's
/// modeling and factory services instead.
#[derive(Debug, Clone, Default)]
pub struct MemoryPort {
    pub element: Option<Element>,
    pub update_calls: usize,
}

impl MemoryPort {
    pub fn for_element(element: Element) -> Self {
        Self {
            element: Some(element),
            update_calls: 0,
        }
    }
}

impl ValueFactory for MemoryPort {
    fn create(&mut self, type_name: &str, attrs: Map<String, Value>) -> Result<Value, String> {
        let mut obj = Map::new();
        obj.insert("$type".to_string(), Value::String(type_name.to_string()));
        obj.extend(attrs);
        Ok(Value::Object(obj))
    }
}

impl ModelPort for MemoryPort {
    fn update_properties(
        &mut self,
        element_id: &str,
        updates: Vec<(String, Value)>,
    ) -> Result<(), String> {
        self.update_calls += 1;
        let element = self
            .element
            .as_mut()
            .ok_or_else(|| "no element selected".to_string())?;
        if element.id != element_id {
            return Err(format!("unknown element {element_id}"));
        }
        apply_updates(element, &updates);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValueKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn def(key: &str) -> PropertyDef {
        PropertyDef::new(key, ValueKind::String)
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut el = Element::new("Task_1", "bpmn:UserTask");
        let mut port = MemoryPort::for_element(el.clone());
        let binder = Binder::new();
        binder
            .write(&mut el, &def("assignee"), &json!("ada"), &mut port)
            .unwrap();
        assert_eq!(binder.read(&el, PropKey::intern("assignee")), Some(json!("ada")));
        // The port's model saw the same single-step update.
        assert_eq!(port.update_calls, 1);
        assert_eq!(
            port.element.as_ref().unwrap().business,
            json!({"assignee": "ada"})
        );
    }

    #[test]
    fn nested_write_is_one_top_level_update() {
        let mut el = Element::new("Task_1", "bpmn:UserTask")
            .with_business(json!({"loopCharacteristics": {"collection": "orders"}}));
        let mut port = MemoryPort::for_element(el.clone());
        let binder = Binder::new();
        binder
            .write(
                &mut el,
                &def("loopCharacteristics.isSequential"),
                &json!(true),
                &mut port,
            )
            .unwrap();
        assert_eq!(port.update_calls, 1);
        assert_eq!(
            el.business,
            json!({"loopCharacteristics": {"collection": "orders", "isSequential": true}})
        );
    }

    #[test]
    fn read_only_write_is_a_no_op() {
        let mut el = Element::new("Task_1", "bpmn:UserTask")
            .with_business(json!({"id": "Task_1"}));
        let mut port = MemoryPort::for_element(el.clone());
        let binder = Binder::new();
        let id_def = def("id").read_only();
        binder
            .write(&mut el, &id_def, &json!("Task_99"), &mut port)
            .unwrap();
        assert_eq!(port.update_calls, 0);
        assert_eq!(binder.read(&el, PropKey::intern("id")), Some(json!("Task_1")));
    }

    #[test]
    fn null_write_removes_the_attribute() {
        let mut el = Element::new("Task_1", "bpmn:UserTask")
            .with_business(json!({"assignee": "ada"}));
        let mut port = MemoryPort::for_element(el.clone());
        let binder = Binder::new();
        binder
            .write(&mut el, &def("assignee"), &Value::Null, &mut port)
            .unwrap();
        assert_eq!(binder.read(&el, PropKey::intern("assignee")), None);
    }

    #[test]
    fn snapshot_reads_defaults_and_pseudo_entries() {
        struct Upper;
        impl FieldStrategy for Upper {
            fn read(&self, element: &Element) -> Value {
                let name = path_get(&element.business, "name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Value::String(name.to_uppercase())
            }
            fn plan_write(
                &self,
                _element: &Element,
                value: &Value,
                _factory: &mut dyn ValueFactory,
            ) -> Result<Vec<(String, Value)>, String> {
                Ok(vec![("name".to_string(), value.clone())])
            }
        }

        let el = Element::new("Task_1", "bpmn:UserTask").with_business(json!({"name": "review"}));
        let schema = PanelSchema::new()
            .property(def("shoutedName"))
            .property(def("priority").default_value(json!("normal")))
            .property(def("assignee"));
        let binder = Binder::new().with_strategy("shoutedName", Upper);

        let snap = binder.snapshot(&schema, &el);
        assert_eq!(snap.get(PropKey::intern("shoutedName")), Some(&json!("REVIEW")));
        assert_eq!(snap.get(PropKey::intern("priority")), Some(&json!("normal")));
        // Absent without a default stays absent — isEmpty still sees it.
        assert_eq!(snap.get(PropKey::intern("assignee")), None);
        assert_eq!(snap.get(PropKey::intern("id")), Some(&json!("Task_1")));
        assert_eq!(snap.get(PropKey::intern("type")), Some(&json!("bpmn:UserTask")));
    }
}
