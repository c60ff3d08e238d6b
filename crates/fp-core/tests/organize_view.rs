//! Integration tests: element → snapshot → organized panel view.
//!
//! Exercises the full `fp-core` pipeline the way a host drives it: capture
//! a selection, snapshot it through the binder, organize against the
//! schema, edit, and organize again.

use fp_core::bind::{Binder, MemoryPort};
use fp_core::condition::Condition;
use fp_core::key::PropKey;
use fp_core::model::Element;
use fp_core::options::OptionEntry;
use fp_core::organize::organize;
use fp_core::schema::{InputKind, PanelSchema, PropertyDef, PropertyGroup, PropertyTab, ValueKind};
use fp_core::validate::{ValidationCtx, validate_value};
use serde_json::json;

fn task_schema() -> PanelSchema {
    PanelSchema::new()
        .group(PropertyGroup::new("general", "General").order(10))
        .group(PropertyGroup::new("implementation", "Implementation").order(20))
        .group(PropertyGroup::new("advanced", "Advanced").order(30).collapsible())
        .tab(PropertyTab::new("general", "General").order(10).with_groups(&["general", "implementation"]))
        .tab(PropertyTab::new("advanced", "Advanced").order(20).with_groups(&["advanced"]))
        .default_tab("general")
        .property(
            PropertyDef::new("name", ValueKind::String)
                .label("Name")
                .group("general")
                .rule(fp_core::validate::ValidationRule::required())
                .order(10),
        )
        .property(
            PropertyDef::new("implementation", ValueKind::Enum)
                .label("Implementation")
                .group("implementation")
                .options(vec![
                    OptionEntry::of("java", "Java class"),
                    OptionEntry::of("delegate", "Delegate expression"),
                    OptionEntry::of("external", "External worker"),
                ])
                .order(10),
        )
        .property(
            PropertyDef::new("javaClass", ValueKind::String)
                .label("Java class")
                .group("implementation")
                .visible_when(Condition::equals("implementation", json!("java")))
                .order(20),
        )
        .property(
            PropertyDef::new("delegateExpression", ValueKind::Expression)
                .label("Delegate expression")
                .group("implementation")
                .visible_when(Condition::equals("implementation", json!("delegate")))
                .order(30),
        )
        .property(
            PropertyDef::new("retries", ValueKind::Number)
                .label("Retries")
                .group("advanced")
                .default_value(json!(3)),
        )
}

fn service_task() -> Element {
    Element::new("ServiceTask_1", "bpmn:ServiceTask")
        .with_business(json!({
            "name": "Charge card",
            "implementation": "external",
        }))
}

// ─── Selection → view ────────────────────────────────────────────────────

#[test]
fn selection_produces_organized_view() {
    let schema = task_schema();
    let binder = Binder::new();
    let element = service_task();
    let snapshot = binder.snapshot(&schema, &element);

    let view = organize(&schema, &element, &snapshot);

    assert_eq!(view.active_tab.as_deref(), Some("general"));
    let tab_ids: Vec<&str> = view.tabs.iter().map(|t| t.id).collect();
    assert_eq!(tab_ids, vec!["general", "advanced"], "both tabs have content");

    assert!(view.contains_property(PropKey::intern("name")));
    assert!(view.contains_property(PropKey::intern("implementation")));
    assert!(
        !view.contains_property(PropKey::intern("javaClass")),
        "javaClass requires implementation == java"
    );
    assert!(!view.contains_property(PropKey::intern("delegateExpression")));
}

#[test]
fn snapshot_carries_defaults_and_pseudo_entries() {
    let schema = task_schema();
    let binder = Binder::new();
    let element = service_task();
    let snapshot = binder.snapshot(&schema, &element);

    assert_eq!(snapshot.get(PropKey::intern("retries")), Some(&json!(3)));
    assert_eq!(snapshot.get(PropKey::intern("id")), Some(&json!("ServiceTask_1")));
    assert_eq!(snapshot.get(PropKey::intern("type")), Some(&json!("bpmn:ServiceTask")));
}

// ─── Edit → re-organize ──────────────────────────────────────────────────

#[test]
fn edit_reveals_dependent_field() {
    let schema = task_schema();
    let binder = Binder::new();
    let mut element = service_task();
    let mut port = MemoryPort::for_element(element.clone());

    let def = schema.find_property(PropKey::intern("implementation")).unwrap();
    binder
        .write(&mut element, def, &json!("java"), &mut port)
        .expect("write must succeed");

    let snapshot = binder.snapshot(&schema, &element);
    let view = organize(&schema, &element, &snapshot);

    assert!(view.contains_property(PropKey::intern("javaClass")));
    assert!(
        !view.contains_property(PropKey::intern("delegateExpression")),
        "only the matching branch is revealed"
    );
    assert_eq!(port.update_calls, 1, "one edit, one undoable model call");
}

#[test]
fn port_and_capture_agree_after_write() {
    let schema = task_schema();
    let binder = Binder::new();
    let mut element = service_task();
    let mut port = MemoryPort::for_element(element.clone());

    let def = schema.find_property(PropKey::intern("name")).unwrap();
    binder
        .write(&mut element, def, &json!("Refund card"), &mut port)
        .unwrap();

    let ported = port.element.as_ref().unwrap();
    assert_eq!(
        binder.read(&element, PropKey::intern("name")),
        binder.read(ported, PropKey::intern("name")),
    );
}

// ─── Tab fallback ────────────────────────────────────────────────────────

#[test]
fn active_tab_falls_back_when_first_is_empty() {
    // Hide the whole general tab's content behind an unmet condition.
    let schema = PanelSchema::new()
        .group(
            PropertyGroup::new("general", "General")
                .visible_when(Condition::equals("mode", json!("expert"))),
        )
        .group(PropertyGroup::new("advanced", "Advanced"))
        .tab(PropertyTab::new("general", "General").order(10).with_groups(&["general"]))
        .tab(PropertyTab::new("advanced", "Advanced").order(20).with_groups(&["advanced"]))
        .default_tab("general")
        .property(PropertyDef::new("mode", ValueKind::String).group("general"))
        .property(PropertyDef::new("retries", ValueKind::Number).group("advanced"));

    let element = service_task();
    let binder = Binder::new();
    let snapshot = binder.snapshot(&schema, &element);
    let view = organize(&schema, &element, &snapshot);

    assert!(view.find_tab("general").is_none(), "empty tab is pruned");
    assert_eq!(view.active_tab.as_deref(), Some("advanced"));
}

// ─── Validation over the view ────────────────────────────────────────────

#[test]
fn visible_required_field_reports_when_cleared() {
    let schema = task_schema();
    let binder = Binder::new();
    let element = Element::new("Task_2", "bpmn:UserTask").with_business(json!({ "name": "" }));
    let snapshot = binder.snapshot(&schema, &element);
    let view = organize(&schema, &element, &snapshot);

    let ctx = ValidationCtx::default();
    let issues: Vec<_> = view
        .flat_properties()
        .iter()
        .flat_map(|p| {
            validate_value(p.def.key, &p.def.validation, snapshot.get(p.def.key), &ctx)
        })
        .collect();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].key, PropKey::intern("name"));
    assert_eq!(issues[0].rule, "required");
}

// ─── Widget derivation in the view ───────────────────────────────────────

#[test]
fn view_exposes_derived_input_kinds() {
    let schema = task_schema();
    let binder = Binder::new();
    let element = service_task();
    let snapshot = binder.snapshot(&schema, &element);
    let view = organize(&schema, &element, &snapshot);

    let kind_of = |key: &str| {
        view.flat_properties()
            .iter()
            .find(|p| p.def.key == PropKey::intern(key))
            .map(|p| p.input_kind)
    };
    assert_eq!(kind_of("name"), Some(InputKind::Text));
    assert_eq!(kind_of("implementation"), Some(InputKind::Select));
    assert_eq!(kind_of("retries"), Some(InputKind::Number));
}
