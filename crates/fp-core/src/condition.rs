//! Visibility and enablement predicates.
//!
//! A `Condition` is a structured predicate over the selected element and the
//! live value snapshot. The shape is a small tagged union — field
//! comparisons at the leaves, AND/OR composition above them, and an opaque
//! `Func` escape hatch for anything not expressible declaratively. There is
//! no string-compiled condition language: what the schema author writes is
//! what the evaluator walks.
//!
//! Evaluation never fails. A type-mismatched comparison, an invalid regex,
//! a lookup into a missing structure — all degrade to `false` (hiding the
//! field) and at most a debug log line. A misconfigured panel hides a
//! field; it does not take the editor down.

use crate::key::PropKey;
use crate::model::{Element, Snapshot, path_get};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

// ─── Shapes ──────────────────────────────────────────────────────────────

/// Where a leaf condition's `field` is looked up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldContext {
    /// The live value snapshot (default). Also resolves the `id`/`type`
    /// pseudo-entries.
    #[default]
    Values,
    /// The element's persisted business data, dot-path addressable.
    Business,
    /// The parent element's business data.
    Parent,
    /// The root element's business data.
    Root,
    /// The element's raw attribute bag (flat keys, no dot traversal).
    Attrs,
}

/// Leaf comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
    Matches,
    Exists,
    HasProperty,
    HasAttribute,
}

/// Opaque predicate signature for `Condition::Func`. Captures whatever host
/// handles the schema author closed over at build time.
pub type PredicateFn = dyn Fn(&Element, &Snapshot) -> bool + Send + Sync;

/// A named escape-hatch predicate. The name exists for diagnostics only;
/// the evaluator never interprets the body.
#[derive(Clone)]
pub struct FuncCondition {
    pub name: String,
    pub eval: Arc<PredicateFn>,
}

impl fmt::Debug for FuncCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncCondition({})", self.name)
    }
}

/// A visibility/enablement predicate over (element, values).
#[derive(Debug, Clone)]
pub enum Condition {
    /// Compare one looked-up field against a literal.
    Leaf {
        field: PropKey,
        operator: Operator,
        value: Value,
        context: FieldContext,
    },
    /// Every child must hold. Empty is vacuously true — the `always` shape.
    All(Vec<Condition>),
    /// At least one child must hold. Empty is vacuously false — `never`.
    Any(Vec<Condition>),
    /// Author-supplied predicate, invoked as-is.
    Func(FuncCondition),
}

impl Default for Condition {
    fn default() -> Self {
        Condition::always()
    }
}

impl Condition {
    pub fn always() -> Self {
        Condition::All(Vec::new())
    }

    pub fn never() -> Self {
        Condition::Any(Vec::new())
    }

    /// Leaf against the value snapshot (the default context).
    pub fn field(field: impl Into<PropKey>, operator: Operator, value: Value) -> Self {
        Condition::Leaf {
            field: field.into(),
            operator,
            value,
            context: FieldContext::Values,
        }
    }

    /// Leaf with an explicit lookup context.
    pub fn field_in(
        field: impl Into<PropKey>,
        operator: Operator,
        value: Value,
        context: FieldContext,
    ) -> Self {
        Condition::Leaf {
            field: field.into(),
            operator,
            value,
            context,
        }
    }

    pub fn equals(field: impl Into<PropKey>, value: Value) -> Self {
        Self::field(field, Operator::Equals, value)
    }

    pub fn not_equals(field: impl Into<PropKey>, value: Value) -> Self {
        Self::field(field, Operator::NotEquals, value)
    }

    pub fn is_empty(field: impl Into<PropKey>) -> Self {
        Self::field(field, Operator::IsEmpty, Value::Null)
    }

    pub fn is_not_empty(field: impl Into<PropKey>) -> Self {
        Self::field(field, Operator::IsNotEmpty, Value::Null)
    }

    /// Membership in a literal list.
    pub fn one_of(field: impl Into<PropKey>, values: Vec<Value>) -> Self {
        Self::field(field, Operator::In, Value::Array(values))
    }

    pub fn all(children: Vec<Condition>) -> Self {
        Condition::All(children)
    }

    pub fn any(children: Vec<Condition>) -> Self {
        Condition::Any(children)
    }

    pub fn func(
        name: impl Into<String>,
        eval: impl Fn(&Element, &Snapshot) -> bool + Send + Sync + 'static,
    ) -> Self {
        Condition::Func(FuncCondition {
            name: name.into(),
            eval: Arc::new(eval),
        })
    }

    /// Collect every snapshot field this condition reads. Used to derive a
    /// property's dependency set: structured conditions make the read set
    /// statically known, so authors only declare `depends_on` by hand for
    /// `Func` predicates.
    pub fn collect_value_deps(&self, out: &mut SmallVec<[PropKey; 4]>) {
        match self {
            Condition::Leaf { field, context, .. } => {
                if *context == FieldContext::Values && !out.contains(field) {
                    out.push(*field);
                }
            }
            Condition::All(children) | Condition::Any(children) => {
                for child in children {
                    child.collect_value_deps(out);
                }
            }
            Condition::Func(_) => {}
        }
    }
}

// ─── Evaluation ──────────────────────────────────────────────────────────

/// Evaluate a condition against the selection. Total: never panics, never
/// errors — degradations resolve to `false`.
pub fn evaluate(condition: &Condition, element: &Element, values: &Snapshot) -> bool {
    match condition {
        Condition::All(children) => children.iter().all(|c| evaluate(c, element, values)),
        Condition::Any(children) => children.iter().any(|c| evaluate(c, element, values)),
        Condition::Func(func) => (func.eval)(element, values),
        Condition::Leaf {
            field,
            operator,
            value,
            context,
        } => evaluate_leaf(*field, *operator, value, *context, element, values),
    }
}

fn evaluate_leaf(
    field: PropKey,
    operator: Operator,
    expected: &Value,
    context: FieldContext,
    element: &Element,
    values: &Snapshot,
) -> bool {
    // Attribute presence is a question about the element, not a looked-up
    // field value.
    if operator == Operator::HasAttribute {
        return expected
            .as_str()
            .is_some_and(|name| element.attrs.contains_key(name));
    }

    let found = lookup(field, context, element, values);

    match operator {
        Operator::Exists => found.is_some(),
        Operator::IsEmpty => is_empty_value(found),
        Operator::IsNotEmpty => !is_empty_value(found),
        Operator::Equals => found.is_some_and(|v| values_equal(v, expected)),
        Operator::NotEquals => !found.is_some_and(|v| values_equal(v, expected)),
        Operator::Contains => found.is_some_and(|v| contains(v, expected)),
        Operator::NotContains => !found.is_some_and(|v| contains(v, expected)),
        Operator::StartsWith => str_pair(found, expected).is_some_and(|(a, b)| a.starts_with(b)),
        Operator::EndsWith => str_pair(found, expected).is_some_and(|(a, b)| a.ends_with(b)),
        Operator::GreaterThan => num_pair(found, expected).is_some_and(|(a, b)| a > b),
        Operator::GreaterThanOrEqual => num_pair(found, expected).is_some_and(|(a, b)| a >= b),
        Operator::LessThan => num_pair(found, expected).is_some_and(|(a, b)| a < b),
        Operator::LessThanOrEqual => num_pair(found, expected).is_some_and(|(a, b)| a <= b),
        Operator::In => expected
            .as_array()
            .is_some_and(|list| found.is_some_and(|v| list.iter().any(|e| values_equal(v, e)))),
        Operator::NotIn => !expected
            .as_array()
            .is_some_and(|list| found.is_some_and(|v| list.iter().any(|e| values_equal(v, e)))),
        Operator::Matches => matches_regex(found, expected, field),
        Operator::HasProperty => {
            let target = if field.as_str().is_empty() {
                Some(&element.business)
            } else {
                found
            };
            target
                .and_then(Value::as_object)
                .zip(expected.as_str())
                .is_some_and(|(obj, key)| obj.contains_key(key))
        }
        Operator::HasAttribute => unreachable!("handled before lookup"),
    }
}

/// Resolve `field` under `context`. `None` means the field is absent — the
/// operators decide what absence means.
fn lookup<'a>(
    field: PropKey,
    context: FieldContext,
    element: &'a Element,
    values: &'a Snapshot,
) -> Option<&'a Value> {
    match context {
        FieldContext::Values => values.get(field),
        FieldContext::Business => path_get(&element.business, field.as_str()),
        FieldContext::Parent => element
            .parent
            .as_deref()
            .and_then(|p| path_get(&p.business, field.as_str())),
        FieldContext::Root => path_get(&element.root().business, field.as_str()),
        FieldContext::Attrs => element.attrs.get(field.as_str()),
    }
}

/// Missing, null, empty string, empty array, empty object. The same set
/// drives the `isEmpty` operator and the `Required` validation rule.
pub fn is_empty_value(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Strict equality, except numbers compare numerically across the
/// integer/float representations serde_json keeps apart.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Substring on strings, membership on arrays. Anything else does not
/// contain anything.
fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        _ => false,
    }
}

fn str_pair<'a>(found: Option<&'a Value>, expected: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((found?.as_str()?, expected.as_str()?))
}

fn num_pair(found: Option<&Value>, expected: &Value) -> Option<(f64, f64)> {
    Some((found?.as_f64()?, expected.as_f64()?))
}

fn matches_regex(found: Option<&Value>, pattern: &Value, field: PropKey) -> bool {
    let (Some(subject), Some(pattern)) = (found.and_then(Value::as_str), pattern.as_str()) else {
        return false;
    };
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(subject),
        Err(err) => {
            log::debug!("invalid matches pattern on {field}: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot(pairs: &[(&str, Value)]) -> Snapshot {
        let mut snap = Snapshot::new();
        for (k, v) in pairs {
            snap.set(PropKey::intern(k), v.clone());
        }
        snap
    }

    fn task() -> Element {
        Element::new("Task_1", "bpmn:UserTask")
            .with_business(json!({
                "name": "Review order",
                "loopCharacteristics": {"isSequential": true}
            }))
            .with_attr("custom:priority", json!("high"))
    }

    #[test]
    fn empty_all_is_true_empty_any_is_false() {
        let el = task();
        let snap = Snapshot::new();
        assert!(evaluate(&Condition::always(), &el, &snap));
        assert!(!evaluate(&Condition::never(), &el, &snap));
    }

    #[test]
    fn missing_field_is_empty() {
        let el = task();
        let snap = Snapshot::new();
        assert!(evaluate(&Condition::is_empty("assignee"), &el, &snap));
        assert!(!evaluate(&Condition::is_not_empty("assignee"), &el, &snap));
    }

    #[test]
    fn equals_unifies_integer_and_float() {
        let el = task();
        let snap = snapshot(&[("retries", json!(3))]);
        assert!(evaluate(&Condition::equals("retries", json!(3.0)), &el, &snap));
    }

    #[test]
    fn not_equals_holds_for_missing_field() {
        let el = task();
        let snap = Snapshot::new();
        assert!(evaluate(
            &Condition::not_equals("implementation", json!("java")),
            &el,
            &snap
        ));
    }

    #[test]
    fn contains_on_strings_and_arrays() {
        let el = task();
        let snap = snapshot(&[
            ("topic", json!("order-fulfilment")),
            ("groups", json!(["sales", "support"])),
        ]);
        assert!(evaluate(
            &Condition::field("topic", Operator::Contains, json!("fulfil")),
            &el,
            &snap
        ));
        assert!(evaluate(
            &Condition::field("groups", Operator::Contains, json!("sales")),
            &el,
            &snap
        ));
        assert!(!evaluate(
            &Condition::field("retries", Operator::Contains, json!("x")),
            &el,
            &snapshot(&[("retries", json!(7))])
        ));
    }

    #[test]
    fn ordering_is_numeric_only() {
        let el = task();
        let snap = snapshot(&[("retries", json!("many"))]);
        assert!(!evaluate(
            &Condition::field("retries", Operator::GreaterThan, json!(1)),
            &el,
            &snap
        ));
        let snap = snapshot(&[("retries", json!(5))]);
        assert!(evaluate(
            &Condition::field("retries", Operator::GreaterThanOrEqual, json!(5)),
            &el,
            &snap
        ));
    }

    #[test]
    fn membership_operators() {
        let el = task();
        let snap = snapshot(&[("slaCategory", json!("urgent"))]);
        assert!(evaluate(
            &Condition::one_of("slaCategory", vec![json!("urgent"), json!("soon")]),
            &el,
            &snap
        ));
        assert!(evaluate(
            &Condition::field("slaCategory", Operator::NotIn, json!(["normal"])),
            &el,
            &snap
        ));
        assert!(evaluate(
            &Condition::field("missing", Operator::NotIn, json!(["normal"])),
            &el,
            &snap
        ));
    }

    #[test]
    fn matches_with_invalid_pattern_is_false() {
        let el = task();
        let snap = snapshot(&[("name", json!("Review"))]);
        assert!(evaluate(
            &Condition::field("name", Operator::Matches, json!("^Rev")),
            &el,
            &snap
        ));
        assert!(!evaluate(
            &Condition::field("name", Operator::Matches, json!("(unclosed")),
            &el,
            &snap
        ));
    }

    #[test]
    fn business_context_traverses_dot_paths() {
        let el = task();
        let snap = Snapshot::new();
        let cond = Condition::field_in(
            "loopCharacteristics.isSequential",
            Operator::Equals,
            json!(true),
            FieldContext::Business,
        );
        assert!(evaluate(&cond, &el, &snap));
    }

    #[test]
    fn parent_and_root_contexts() {
        let process = Element::new("Process_1", "bpmn:Process")
            .with_business(json!({"isExecutable": true}));
        let el = Element::new("Task_1", "bpmn:Task").with_parent(process);
        let snap = Snapshot::new();
        let on_parent = Condition::field_in(
            "isExecutable",
            Operator::Equals,
            json!(true),
            FieldContext::Parent,
        );
        let on_root = Condition::field_in(
            "isExecutable",
            Operator::Exists,
            Value::Null,
            FieldContext::Root,
        );
        assert!(evaluate(&on_parent, &el, &snap));
        assert!(evaluate(&on_root, &el, &snap));
    }

    #[test]
    fn has_property_and_has_attribute() {
        let el = task();
        let snap = Snapshot::new();
        let has_loop = Condition::field_in(
            "",
            Operator::HasProperty,
            json!("loopCharacteristics"),
            FieldContext::Business,
        );
        let has_attr = Condition::field_in(
            "",
            Operator::HasAttribute,
            json!("custom:priority"),
            FieldContext::Values,
        );
        assert!(evaluate(&has_loop, &el, &snap));
        assert!(evaluate(&has_attr, &el, &snap));
        assert!(!evaluate(
            &Condition::field_in("", Operator::HasAttribute, json!("nope"), FieldContext::Values),
            &el,
            &snap
        ));
    }

    #[test]
    fn any_short_circuits_on_first_true() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = Arc::clone(&calls);
            Condition::func("count", move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
        };
        let cond = Condition::any(vec![Condition::always(), counted]);
        assert!(evaluate(&cond, &task(), &Snapshot::new()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn collect_value_deps_sees_through_composition() {
        let cond = Condition::all(vec![
            Condition::equals("type", json!("bpmn:UserTask")),
            Condition::any(vec![
                Condition::is_not_empty("assignee"),
                Condition::field_in("owner", Operator::Exists, Value::Null, FieldContext::Business),
            ]),
        ]);
        let mut deps = SmallVec::new();
        cond.collect_value_deps(&mut deps);
        let names: Vec<&str> = deps.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["type", "assignee"]);
    }
}
