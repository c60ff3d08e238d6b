//! The shipped BPMN panel: default schema and binder.
//!
//! Four tabs. General carries identity plus the per-type implementation
//! and assignment fields, Advanced the multi-instance block, Events the
//! timer and message configuration (the tab only exists for event
//! elements), Documentation the free-text block. Conditions key on the
//! `type` pseudo-entry and on sibling values, so fields appear and
//! disappear as the user edits.

use crate::catalog::{self, EVENTS, GATEWAYS, TASKS};
use crate::strategy::{DocumentationField, EVENT_DEFINITION_KINDS, EventDefinitionTypeField};
use fp_core::bind::Binder;
use fp_core::condition::Condition;
use fp_core::key::PropKey;
use fp_core::options::{OptionEntry, OptionsSource, RemoteOptions, ResponseMapping};
use fp_core::schema::{
    ChangeListener, InputKind, PanelSchema, PropertyDef, PropertyGroup, PropertyTab, ValueKind,
};
use fp_core::validate::ValidationRule;
use serde_json::{Value, json};

/// A binder with the profile's special-cased fields registered.
pub fn binder() -> Binder {
    Binder::new()
        .with_strategy("documentation", DocumentationField)
        .with_strategy("eventDefinitionType", EventDefinitionTypeField)
}

/// The default panel configuration.
pub fn default_schema() -> PanelSchema {
    let schema = layout(PanelSchema::new());
    let schema = general_fields(schema);
    let schema = type_fields(schema);
    let schema = implementation_fields(schema);
    let schema = assignment_fields(schema);
    let schema = multi_instance_fields(schema);
    let schema = event_fields(schema);
    documentation_fields(schema)
}

// ─── Layout ──────────────────────────────────────────────────────────────

fn layout(schema: PanelSchema) -> PanelSchema {
    schema
        .group(PropertyGroup::new("general", "General").order(10))
        .group(PropertyGroup::new("details", "Details").order(20))
        .group(PropertyGroup::new("service-task", "Implementation").order(30).collapsible())
        .group(PropertyGroup::new("script-task", "Script").order(40).collapsible())
        .group(PropertyGroup::new("user-task", "Assignment").order(50).collapsible())
        .group(PropertyGroup::new("sla", "Service Level").order(60).collapsible())
        .group(PropertyGroup::new("multi-instance", "Multi-Instance").order(70).start_collapsed())
        .group(PropertyGroup::new("timer", "Timer").order(80))
        .group(PropertyGroup::new("message", "Message").order(90))
        .group(PropertyGroup::new("documentation", "Documentation").order(100))
        .tab(PropertyTab::new("general", "General").order(10).with_groups(&[
            "general",
            "details",
            "service-task",
            "script-task",
            "user-task",
            "sla",
        ]))
        .tab(
            PropertyTab::new("advanced", "Advanced")
                .order(20)
                .with_groups(&["multi-instance"]),
        )
        .tab(
            PropertyTab::new("events", "Events")
                .order(30)
                .with_groups(&["timer", "message"])
                .visible_when(catalog::type_in(EVENTS)),
        )
        .tab(
            PropertyTab::new("documentation", "Documentation")
                .order(40)
                .with_groups(&["documentation"]),
        )
        .default_tab("general")
        .default_group("general")
}

// ─── General ─────────────────────────────────────────────────────────────

fn general_fields(schema: PanelSchema) -> PanelSchema {
    schema
        .property(
            PropertyDef::new("id", ValueKind::String)
                .label("ID")
                .group("general")
                .order(10)
                .read_only()
                .rule(ValidationRule::required())
                .rule(ValidationRule::pattern("^[A-Za-z_][A-Za-z0-9_-]*$")),
        )
        .property(
            PropertyDef::new("name", ValueKind::String)
                .label("Name")
                .group("general")
                .order(20)
                .placeholder("Enter a name..."),
        )
        .property(
            PropertyDef::new("color", ValueKind::Color)
                .label("Color")
                .group("general")
                .order(30),
        )
}

/// Per-type basics: process flags, the event-definition selector, gateway
/// and flow configuration.
fn type_fields(schema: PanelSchema) -> PanelSchema {
    let mut kind_options = vec![OptionEntry::of("None", "None")];
    kind_options.extend(
        EVENT_DEFINITION_KINDS
            .iter()
            .map(|(kind, _)| OptionEntry::of(kind, kind)),
    );

    schema
        .property(
            PropertyDef::new("isExecutable", ValueKind::Boolean)
                .label("Executable")
                .group("details")
                .order(10)
                .visible_when(catalog::type_in(&["bpmn:Process", "bpmn:Participant"])),
        )
        .property(
            PropertyDef::new("eventDefinitionType", ValueKind::Enum)
                .label("Event definition")
                .group("details")
                .order(20)
                .options(kind_options)
                .visible_when(catalog::type_in(EVENTS)),
        )
        .property(
            PropertyDef::new("defaultFlow", ValueKind::String)
                .label("Default flow")
                .group("details")
                .order(30)
                .visible_when(catalog::type_in(GATEWAYS)),
        )
        .property(
            PropertyDef::new("conditionExpression", ValueKind::Expression)
                .label("Condition")
                .group("details")
                .order(40)
                .placeholder("${amount > 1000}")
                .visible_when(catalog::type_is("bpmn:SequenceFlow")),
        )
}

// ─── Implementation ──────────────────────────────────────────────────────

fn implementation_fields(schema: PanelSchema) -> PanelSchema {
    let service_task = catalog::type_is("bpmn:ServiceTask");
    let script_task = catalog::type_is("bpmn:ScriptTask");
    let implemented_as = |kind: &str| {
        Condition::all(vec![
            service_task.clone(),
            Condition::equals("implementation", json!(kind)),
        ])
    };

    schema
        .property(
            PropertyDef::new("implementation", ValueKind::Enum)
                .label("Implementation")
                .group("service-task")
                .order(10)
                .options(vec![
                    OptionEntry::of("java", "Java Class"),
                    OptionEntry::of("expression", "Expression"),
                    OptionEntry::of("delegateExpression", "Delegate Expression"),
                    OptionEntry::of("external", "External"),
                ])
                .visible_when(service_task.clone()),
        )
        .property(
            PropertyDef::new("javaClass", ValueKind::String)
                .label("Java class")
                .group("service-task")
                .order(20)
                .placeholder("com.example.MyServiceTask")
                .rule(ValidationRule::pattern("^[a-zA-Z_$][a-zA-Z0-9_$.]*$"))
                .visible_when(implemented_as("java")),
        )
        .property(
            PropertyDef::new("expression", ValueKind::Expression)
                .label("Expression")
                .group("service-task")
                .order(30)
                .placeholder("${myService.execute()}")
                .visible_when(implemented_as("expression")),
        )
        .property(
            PropertyDef::new("delegateExpression", ValueKind::Expression)
                .label("Delegate expression")
                .group("service-task")
                .order(40)
                .placeholder("${myServiceFactory.createService()}")
                .visible_when(implemented_as("delegateExpression")),
        )
        .property(
            PropertyDef::new("topic", ValueKind::String)
                .label("Topic")
                .group("service-task")
                .order(50)
                .placeholder("my-external-task-topic")
                .rule(ValidationRule::required())
                .visible_when(implemented_as("external")),
        )
        .property(
            PropertyDef::new("scriptFormat", ValueKind::Enum)
                .label("Script format")
                .group("script-task")
                .order(10)
                .options(vec![
                    OptionEntry::of("javascript", "JavaScript"),
                    OptionEntry::of("groovy", "Groovy"),
                    OptionEntry::of("python", "Python"),
                    OptionEntry::of("ruby", "Ruby"),
                    OptionEntry::of("java", "Java"),
                ])
                .rule(ValidationRule::required())
                .visible_when(script_task.clone()),
        )
        .property(
            PropertyDef::new("script", ValueKind::Script)
                .label("Script")
                .group("script-task")
                .order(20)
                .placeholder("Enter script code...")
                .visible_when(script_task),
        )
}

// ─── Assignment & SLA ────────────────────────────────────────────────────

fn assignment_fields(schema: PanelSchema) -> PanelSchema {
    let user_task = catalog::type_is("bpmn:UserTask");
    let classify = ChangeListener::new("classify-sla", &["dueDate"], |ctx| {
        vec![(PropKey::intern("slaCategory"), json!(classify_sla(ctx.value)))]
    })
    .emits(&["slaCategory"]);

    schema
        .property(
            PropertyDef::new("assignee", ValueKind::String)
                .label("Assignee")
                .group("user-task")
                .order(10)
                .placeholder("${currentUser.id}")
                .visible_when(user_task.clone()),
        )
        .property(
            PropertyDef::new("candidateUsers", ValueKind::Array)
                .label("Candidate users")
                .group("user-task")
                .order(20)
                .options_source(OptionsSource::Remote(
                    RemoteOptions::get("/api/users/search")
                        .mapping(ResponseMapping::new("id", "name")),
                ))
                .visible_when(user_task.clone()),
        )
        .property(
            PropertyDef::new("candidateGroups", ValueKind::Array)
                .label("Candidate groups")
                .group("user-task")
                .order(30)
                .options_source(OptionsSource::Remote(
                    RemoteOptions::get("/api/roles").mapping(ResponseMapping::new("id", "name")),
                ))
                .visible_when(user_task.clone()),
        )
        .property(
            PropertyDef::new("dueDate", ValueKind::String)
                .label("Due in")
                .group("user-task")
                .order(40)
                .placeholder("P1D")
                .description("ISO-8601 duration until the task is due.")
                .on_change(classify)
                .visible_when(user_task.clone()),
        )
        .property(
            PropertyDef::new("priority", ValueKind::Number)
                .label("Priority")
                .group("user-task")
                .order(50)
                .default_value(json!(50))
                .rule(ValidationRule::min(0.0))
                .rule(ValidationRule::max(100.0))
                .visible_when(user_task.clone()),
        )
        .property(
            PropertyDef::new("slaCategory", ValueKind::String)
                .label("SLA")
                .group("sla")
                .order(10)
                .read_only()
                .visible_when(user_task.clone()),
        )
        .property(
            PropertyDef::new("escalationContact", ValueKind::String)
                .label("Escalation contact")
                .group("sla")
                .order(20)
                .placeholder("ops@example.com")
                .visible_when(Condition::all(vec![
                    user_task,
                    Condition::one_of("slaCategory", vec![json!("urgent"), json!("soon")]),
                ])),
        )
}

// ─── Multi-instance ──────────────────────────────────────────────────────

fn multi_instance_fields(schema: PanelSchema) -> PanelSchema {
    let loop_capable = Condition::any(vec![
        catalog::type_in(TASKS),
        catalog::type_is("bpmn:SubProcess"),
    ]);
    let looping = Condition::equals("isMultiInstance", json!(true));

    schema
        .property(
            PropertyDef::new("isMultiInstance", ValueKind::Boolean)
                .label("Multi-instance")
                .group("multi-instance")
                .order(10)
                .visible_when(loop_capable),
        )
        .property(
            PropertyDef::new("multiInstanceType", ValueKind::Enum)
                .label("Execution")
                .group("multi-instance")
                .order(20)
                .options(vec![
                    OptionEntry::of("sequential", "Sequential"),
                    OptionEntry::of("parallel", "Parallel"),
                ])
                .rule(ValidationRule::required())
                .visible_when(looping.clone()),
        )
        .property(
            PropertyDef::new("loopCardinality", ValueKind::Expression)
                .label("Loop cardinality")
                .group("multi-instance")
                .order(30)
                .placeholder("${numberOfItems}")
                .visible_when(looping.clone()),
        )
        .property(
            PropertyDef::new("collection", ValueKind::String)
                .label("Collection")
                .group("multi-instance")
                .order(40)
                .placeholder("${itemCollection}")
                .visible_when(looping.clone()),
        )
        .property(
            PropertyDef::new("elementVariable", ValueKind::String)
                .label("Element variable")
                .group("multi-instance")
                .order(50)
                .placeholder("item")
                .visible_when(looping),
        )
}

// ─── Events ──────────────────────────────────────────────────────────────

fn event_fields(schema: PanelSchema) -> PanelSchema {
    let timer = Condition::equals("eventDefinitionType", json!("Timer"));
    let message = Condition::equals("eventDefinitionType", json!("Message"));
    let timer_kind = |kind: &str| {
        Condition::all(vec![
            timer.clone(),
            Condition::equals("timerDefinitionType", json!(kind)),
        ])
    };

    schema
        .property(
            PropertyDef::new("timerDefinitionType", ValueKind::Enum)
                .label("Timer type")
                .group("timer")
                .order(10)
                .options(vec![
                    OptionEntry::of("timeDate", "Date"),
                    OptionEntry::of("timeDuration", "Duration"),
                    OptionEntry::of("timeCycle", "Cycle"),
                ])
                .rule(ValidationRule::required())
                .visible_when(timer.clone()),
        )
        .property(
            PropertyDef::new("timerDefinition", ValueKind::String)
                .label("Date")
                .group("timer")
                .order(20)
                .placeholder("2026-12-31T23:59:59Z")
                .rule(ValidationRule::required())
                .visible_when(timer_kind("timeDate")),
        )
        .property(
            PropertyDef::new("timerDuration", ValueKind::String)
                .label("Duration")
                .group("timer")
                .order(30)
                .placeholder("P1D")
                .description("ISO-8601 duration: P[nY][nM][nD]T[nH][nM][nS]")
                .rule(ValidationRule::required())
                .visible_when(timer_kind("timeDuration")),
        )
        .property(
            PropertyDef::new("timerCycle", ValueKind::String)
                .label("Cycle")
                .group("timer")
                .order(40)
                .placeholder("R3/PT10M")
                .description("ISO-8601 repeating interval: R[n]/PT[time]")
                .rule(ValidationRule::required())
                .visible_when(timer_kind("timeCycle")),
        )
        .property(
            PropertyDef::new("messageRef", ValueKind::String)
                .label("Message")
                .group("message")
                .order(10)
                .placeholder("myMessage")
                .rule(ValidationRule::required())
                .visible_when(message.clone()),
        )
        .property(
            PropertyDef::new("messageExpression", ValueKind::Expression)
                .label("Message expression")
                .group("message")
                .order(20)
                .placeholder("${execution.getVariable('messageName')}")
                .visible_when(message),
        )
}

// ─── Documentation ───────────────────────────────────────────────────────

fn documentation_fields(schema: PanelSchema) -> PanelSchema {
    schema.property(
        PropertyDef::new("documentation", ValueKind::String)
            .label("Documentation")
            .group("documentation")
            .order(10)
            .input(InputKind::Textarea)
            .placeholder("Add documentation..."),
    )
}

// ─── SLA classification ──────────────────────────────────────────────────

/// Immediate-listener classifier behind the `slaCategory` field. Due
/// horizons are ISO-8601 durations; absolute dates and expressions cannot
/// be classified without a clock and count as `normal`.
fn classify_sla(value: &Value) -> &'static str {
    let text = value.as_str().unwrap_or("").trim();
    if text.is_empty() {
        return "none";
    }
    match horizon_days(text) {
        Some(days) if days <= 1.0 => "urgent",
        Some(days) if days <= 7.0 => "soon",
        _ => "normal",
    }
}

/// Days covered by an ISO-8601 duration (`P3D`, `PT4H`, `P1W`, `P1DT12H`).
/// Calendar units use the 365/30-day approximations.
fn horizon_days(text: &str) -> Option<f64> {
    let rest = text.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) => (date, time),
        None => (rest, ""),
    };
    let date_parts = components(date)?;
    let time_parts = components(time)?;
    if date_parts.is_empty() && time_parts.is_empty() {
        return None;
    }

    let mut days = 0.0;
    for (amount, unit) in date_parts {
        days += match unit {
            'Y' => amount * 365.0,
            'M' => amount * 30.0,
            'W' => amount * 7.0,
            'D' => amount,
            _ => return None,
        };
    }
    for (amount, unit) in time_parts {
        days += match unit {
            'H' => amount / 24.0,
            'M' => amount / 1_440.0,
            'S' => amount / 86_400.0,
            _ => return None,
        };
    }
    Some(days)
}

fn components(part: &str) -> Option<Vec<(f64, char)>> {
    let mut out = Vec::new();
    let mut digits = String::new();
    for ch in part.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            digits.push(ch);
        } else {
            let amount: f64 = digits.parse().ok()?;
            digits.clear();
            out.push((amount, ch));
        }
    }
    if digits.is_empty() { Some(out) } else { None }
}
