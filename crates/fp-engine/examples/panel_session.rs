//! A scripted properties-panel session: select a task, watch remote
//! options load, edit fields, and see visibility and debounce react.
//!
//! Run with `cargo run -p fp-engine --example panel_session`. The
//! transport is canned; swap `fake_transport` for `fp_engine::execute`
//! with a reqwest client to hit a real options service.

use fp_core::bind::{Binder, MemoryPort};
use fp_core::condition::Condition;
use fp_core::key::PropKey;
use fp_core::model::Element;
use fp_core::options::{OptionEntry, OptionsRequest, OptionsSource, RemoteOptions, ResponseMapping};
use fp_core::schema::{
    ChangeListener, PanelSchema, PropertyDef, PropertyGroup, PropertyTab, ValueKind,
};
use fp_engine::{OptionsState, PanelEngine, RendererRegistry};
use serde_json::{Value, json};
use std::time::{Duration, Instant};

fn key(s: &str) -> PropKey {
    PropKey::intern(s)
}

fn schema() -> PanelSchema {
    let assignee_search = RemoteOptions::get("/api/users/search")
        .params_with(|_, values| {
            let q = values
                .get(PropKey::intern("search"))
                .and_then(Value::as_str)
                .unwrap_or("");
            vec![("q".to_string(), q.to_string())]
        })
        .depends_on(&["search"])
        .mapping(ResponseMapping::new("id", "name"));

    let classify = ChangeListener::new("classify-sla", &["dueDate"], |ctx| {
        let urgent = ctx.value.as_str().is_some_and(|d| d < "2026-09-01");
        vec![(
            PropKey::intern("slaCategory"),
            json!(if urgent { "urgent" } else { "normal" }),
        )]
    })
    .emits(&["slaCategory"]);

    let summarize = ChangeListener::new("summarize", &["description"], |ctx| {
        let text = ctx.value.as_str().unwrap_or("");
        vec![(PropKey::intern("summary"), json!(format!("{} chars", text.len())))]
    })
    .debounced_default()
    .emits(&["summary"]);

    PanelSchema::new()
        .group(PropertyGroup::new("general", "General").order(10))
        .group(PropertyGroup::new("implementation", "Implementation").order(20))
        .group(PropertyGroup::new("assignment", "Assignment").order(30))
        .tab(
            PropertyTab::new("general", "General")
                .order(10)
                .with_groups(&["general", "implementation"]),
        )
        .tab(
            PropertyTab::new("assignment", "Assignment")
                .order(20)
                .with_groups(&["assignment"]),
        )
        .property(PropertyDef::new("name", ValueKind::String).label("Name").group("general"))
        .property(
            PropertyDef::new("dueDate", ValueKind::Date)
                .label("Due date")
                .group("general")
                .on_change(classify),
        )
        .property(
            PropertyDef::new("slaCategory", ValueKind::String)
                .label("SLA")
                .group("general")
                .read_only(),
        )
        .property(
            PropertyDef::new("implementation", ValueKind::Enum)
                .label("Implementation")
                .group("implementation")
                .options(vec![
                    OptionEntry::of("java", "Java class"),
                    OptionEntry::of("expression", "Expression"),
                ]),
        )
        .property(
            PropertyDef::new("javaClass", ValueKind::String)
                .label("Java class")
                .group("implementation")
                .visible_when(Condition::equals("implementation", json!("java"))),
        )
        .property(
            PropertyDef::new("description", ValueKind::String)
                .label("Description")
                .group("general")
                .on_change(summarize),
        )
        .property(
            PropertyDef::new("summary", ValueKind::String)
                .label("Summary")
                .group("general")
                .read_only(),
        )
        .property(
            PropertyDef::new("search", ValueKind::String)
                .label("Search users")
                .group("assignment"),
        )
        .property(
            PropertyDef::new("assignee", ValueKind::String)
                .label("Assignee")
                .group("assignment")
                .options_source(OptionsSource::Remote(assignee_search)),
        )
}

/// Canned directory service. A real host calls `fp_engine::execute` here.
async fn fake_transport(request: &OptionsRequest) -> Result<Vec<Value>, String> {
    let directory = [
        json!({ "id": "u1", "name": "Ada Lovelace" }),
        json!({ "id": "u2", "name": "Alan Turing" }),
        json!({ "id": "u3", "name": "Grace Hopper" }),
    ];
    match request.endpoint.as_str() {
        "/api/users/search" => {
            let q = request
                .query
                .iter()
                .find(|(k, _)| k == "q")
                .map(|(_, v)| v.to_lowercase())
                .unwrap_or_default();
            Ok(directory
                .iter()
                .filter(|u| {
                    u["name"]
                        .as_str()
                        .is_some_and(|n| n.to_lowercase().contains(&q))
                })
                .cloned()
                .collect())
        }
        other => Err(format!("no canned response for {other}")),
    }
}

fn print_view(engine: &PanelEngine) {
    let view = engine.view();
    for tab in &view.tabs {
        let marker = if Some(tab.id) == engine.active_tab() { "▶" } else { " " };
        println!("{marker} [{}]", tab.label);
        for group in &tab.groups {
            println!("    {}", group.group.label);
            for prop in &group.properties {
                let value = engine
                    .values()
                    .get(prop.key())
                    .map(Value::to_string)
                    .unwrap_or_else(|| "—".to_string());
                println!("      {:<18} {value}", prop.def.label);
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), String> {
    env_logger::init();

    let mut engine = PanelEngine::new(schema(), Binder::new(), RendererRegistry::new())?;
    let task = Element::new("Task_42", "bpmn:UserTask").with_business(json!({
        "name": "Review contract",
        "dueDate": "2026-08-28",
    }));
    let mut port = MemoryPort::for_element(task.clone());
    let t0 = Instant::now();

    println!("── Select Task_42 ──────────────────────────────");
    let selection = engine.select(task);
    print_view(&engine);

    for ticket in &selection.fetches {
        let result = fake_transport(&ticket.request).await;
        engine.apply_fetch(ticket, result);
    }
    if let OptionsState::Ready(entries) = engine.options_state(key("assignee")) {
        println!("assignee options loaded: {} entries", entries.len());
    }

    println!("\n── Pick the Java implementation ────────────────");
    engine.set_value(key("implementation"), json!("java"), &mut port, t0)?;
    print_view(&engine);

    println!("\n── Type into the user search (two keystrokes) ──");
    let stale = engine.set_value(key("search"), json!("a"), &mut port, t0)?;
    let fresh = engine.set_value(key("search"), json!("ada"), &mut port, t0)?;

    // Answers arrive out of order; the engine keeps only the newest.
    let fresh_result = fake_transport(&fresh.fetches[0].request).await;
    engine.apply_fetch(&fresh.fetches[0], fresh_result);
    let stale_result = fake_transport(&stale.fetches[0].request).await;
    let applied = engine.apply_fetch(&stale.fetches[0], stale_result);
    println!("stale response applied: {applied}");
    if let OptionsState::Ready(entries) = engine.options_state(key("assignee")) {
        for entry in entries {
            println!("  ✓ {} ({})", entry.label, entry.value);
        }
    }

    println!("\n── Tighten the due date ────────────────────────");
    let outcome = engine.set_value(key("dueDate"), json!("2026-08-22"), &mut port, t0)?;
    for (k, v) in &outcome.updates {
        println!("cascade: {k} = {v}");
    }

    println!("\n── Draft the description (debounced) ───────────");
    engine.set_value(key("description"), json!("Check clause 4"), &mut port, t0)?;
    if let Some(due) = engine.next_due() {
        let in_ms = due.saturating_duration_since(t0).as_millis();
        println!("summarize due in {in_ms} ms");
    }
    for outcome in engine.tick(t0 + Duration::from_millis(500)) {
        for (k, v) in &outcome.updates {
            println!("debounced: {k} = {v}");
        }
    }
    print_view(&engine);

    Ok(())
}
