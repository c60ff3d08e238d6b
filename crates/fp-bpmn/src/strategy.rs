//! Field strategies for the BPMN shapes the dot-path default cannot bind:
//! the one-element documentation collection and the event-definition
//! classification.

use fp_core::bind::{FieldStrategy, ValueFactory};
use fp_core::model::Element;
use serde_json::{Map, Value, json};

// ─── Documentation ───────────────────────────────────────────────────────

/// Logical string ⟷ `documentation: [{ $type, text, ... }]`.
///
/// Reads `documentation[0].text`, `""` when the collection is absent.
/// Writes keep the collection at exactly one entry: created through the
/// factory when absent, rewritten in place (sibling attributes preserved)
/// when present.
pub struct DocumentationField;

impl DocumentationField {
    fn entry(element: &Element) -> Option<&Value> {
        element
            .business_object()?
            .get("documentation")?
            .as_array()?
            .first()
    }
}

impl FieldStrategy for DocumentationField {
    fn read(&self, element: &Element) -> Value {
        let text = Self::entry(element)
            .and_then(|e| e.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("");
        Value::String(text.to_string())
    }

    fn plan_write(
        &self,
        element: &Element,
        value: &Value,
        factory: &mut dyn ValueFactory,
    ) -> Result<Vec<(String, Value)>, String> {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        let entry = match Self::entry(element) {
            None => {
                let mut attrs = Map::new();
                attrs.insert("text".to_string(), Value::String(text));
                factory.create("bpmn:Documentation", attrs)?
            }
            Some(existing) => {
                let mut entry = existing.clone();
                match &mut entry {
                    Value::Object(map) => {
                        map.insert("text".to_string(), Value::String(text));
                    }
                    malformed => {
                        log::warn!("replacing malformed documentation entry on {}", element.id);
                        *malformed = json!({ "text": text });
                    }
                }
                entry
            }
        };
        Ok(vec![("documentation".to_string(), json!([entry]))])
    }
}

// ─── Event definition ────────────────────────────────────────────────────

/// Logical kind ⟷ definition type id, in classification order.
pub(crate) const EVENT_DEFINITION_KINDS: &[(&str, &str)] = &[
    ("Message", "bpmn:MessageEventDefinition"),
    ("Timer", "bpmn:TimerEventDefinition"),
    ("Conditional", "bpmn:ConditionalEventDefinition"),
    ("Signal", "bpmn:SignalEventDefinition"),
    ("Error", "bpmn:ErrorEventDefinition"),
    ("Escalation", "bpmn:EscalationEventDefinition"),
    ("Compensate", "bpmn:CompensateEventDefinition"),
    ("Link", "bpmn:LinkEventDefinition"),
    ("Cancel", "bpmn:CancelEventDefinition"),
    ("Terminate", "bpmn:TerminateEventDefinition"),
];

/// Logical enum (`None`, `Message`, `Timer`, ...) ⟷ which
/// `eventDefinitions[0].$type` is present.
///
/// Reads classify the first definition; unknown types and absent lists
/// read as `None`. Writes reconstruct: `None` clears the list, the current
/// kind is a no-op (the existing definition's data survives), any other
/// kind replaces the list with one fresh factory-built definition.
pub struct EventDefinitionTypeField;

impl EventDefinitionTypeField {
    fn current_type(element: &Element) -> Option<&str> {
        element
            .business_object()?
            .get("eventDefinitions")?
            .as_array()?
            .first()?
            .get("$type")?
            .as_str()
    }

    fn kind_of(type_id: &str) -> Option<&'static str> {
        EVENT_DEFINITION_KINDS
            .iter()
            .find(|(_, t)| *t == type_id)
            .map(|(kind, _)| *kind)
    }

    fn type_of(kind: &str) -> Option<&'static str> {
        EVENT_DEFINITION_KINDS
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, type_id)| *type_id)
    }
}

impl FieldStrategy for EventDefinitionTypeField {
    fn read(&self, element: &Element) -> Value {
        let kind = Self::current_type(element)
            .and_then(Self::kind_of)
            .unwrap_or("None");
        Value::String(kind.to_string())
    }

    fn plan_write(
        &self,
        element: &Element,
        value: &Value,
        factory: &mut dyn ValueFactory,
    ) -> Result<Vec<(String, Value)>, String> {
        let requested = value.as_str().unwrap_or("None");
        if requested == "None" {
            return Ok(match Self::current_type(element) {
                Some(_) => vec![("eventDefinitions".to_string(), Value::Null)],
                None => Vec::new(),
            });
        }
        let Some(type_id) = Self::type_of(requested) else {
            return Err(format!("unknown event definition kind `{requested}`"));
        };
        if Self::current_type(element) == Some(type_id) {
            return Ok(Vec::new());
        }
        let definition = factory.create(type_id, Map::new())?;
        Ok(vec![("eventDefinitions".to_string(), json!([definition]))])
    }
}
