//! The BPMN element-type catalog.
//!
//! Fully-qualified type ids grouped the way panel conditions need them,
//! plus a `*` wildcard matcher and helpers that compile type checks into
//! conditions over the snapshot's `type` pseudo-entry.

use fp_core::condition::Condition;
use serde_json::Value;

pub const TASKS: &[&str] = &[
    "bpmn:Task",
    "bpmn:UserTask",
    "bpmn:ServiceTask",
    "bpmn:SendTask",
    "bpmn:ReceiveTask",
    "bpmn:ManualTask",
    "bpmn:BusinessRuleTask",
    "bpmn:ScriptTask",
    "bpmn:CallActivity",
];

pub const EVENTS: &[&str] = &[
    "bpmn:StartEvent",
    "bpmn:EndEvent",
    "bpmn:IntermediateThrowEvent",
    "bpmn:IntermediateCatchEvent",
    "bpmn:BoundaryEvent",
];

pub const GATEWAYS: &[&str] = &[
    "bpmn:ExclusiveGateway",
    "bpmn:ParallelGateway",
    "bpmn:InclusiveGateway",
    "bpmn:EventBasedGateway",
    "bpmn:ComplexGateway",
];

pub const FLOWS: &[&str] = &["bpmn:SequenceFlow", "bpmn:MessageFlow", "bpmn:Association"];

pub const DATA: &[&str] = &["bpmn:DataObjectReference", "bpmn:DataStoreReference"];

pub const CONTAINERS: &[&str] = &[
    "bpmn:Process",
    "bpmn:Participant",
    "bpmn:SubProcess",
    "bpmn:Lane",
];

/// Match a type id against a pattern: exact, or glob-style with `*`
/// standing for any run of characters (`bpmn:*Task`, `bpmn:*Event*`).
pub fn matches(pattern: &str, element_type: &str) -> bool {
    let Some((prefix, rest)) = pattern.split_once('*') else {
        return pattern == element_type;
    };
    let Some(mut hay) = element_type.strip_prefix(prefix) else {
        return false;
    };
    let mut segments: Vec<&str> = rest.split('*').collect();
    let tail = segments.pop().unwrap_or("");
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        match hay.find(segment) {
            Some(at) => hay = &hay[at + segment.len()..],
            None => return false,
        }
    }
    tail.is_empty() || hay.ends_with(tail)
}

/// Human-facing name for a type id, for panel headers.
pub fn display_name(element_type: &str) -> &str {
    match element_type {
        "bpmn:Task" => "Task",
        "bpmn:UserTask" => "User Task",
        "bpmn:ServiceTask" => "Service Task",
        "bpmn:SendTask" => "Send Task",
        "bpmn:ReceiveTask" => "Receive Task",
        "bpmn:ManualTask" => "Manual Task",
        "bpmn:BusinessRuleTask" => "Business Rule Task",
        "bpmn:ScriptTask" => "Script Task",
        "bpmn:CallActivity" => "Call Activity",
        "bpmn:StartEvent" => "Start Event",
        "bpmn:EndEvent" => "End Event",
        "bpmn:IntermediateThrowEvent" => "Intermediate Throw Event",
        "bpmn:IntermediateCatchEvent" => "Intermediate Catch Event",
        "bpmn:BoundaryEvent" => "Boundary Event",
        "bpmn:ExclusiveGateway" => "Exclusive Gateway",
        "bpmn:ParallelGateway" => "Parallel Gateway",
        "bpmn:InclusiveGateway" => "Inclusive Gateway",
        "bpmn:EventBasedGateway" => "Event-Based Gateway",
        "bpmn:ComplexGateway" => "Complex Gateway",
        "bpmn:SequenceFlow" => "Sequence Flow",
        "bpmn:MessageFlow" => "Message Flow",
        "bpmn:SubProcess" => "Subprocess",
        "bpmn:Process" => "Process",
        "bpmn:Participant" => "Participant",
        other => other.strip_prefix("bpmn:").unwrap_or(other),
    }
}

// ─── Condition helpers ───────────────────────────────────────────────────

/// `type == element_type`, via the snapshot's `type` pseudo-entry.
pub fn type_is(element_type: &str) -> Condition {
    Condition::equals("type", Value::String(element_type.to_string()))
}

/// `type ∈ types`.
pub fn type_in(types: &[&str]) -> Condition {
    Condition::one_of(
        "type",
        types.iter().map(|t| Value::String((*t).to_string())).collect(),
    )
}
