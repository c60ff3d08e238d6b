//! Lint diagnostics for panel schemas.
//!
//! Reports configuration mistakes without modifying the schema. Runs once
//! at load: the engine refuses to construct on any `Error` finding, so a
//! dangling reference or a listener cycle surfaces immediately instead of
//! as a field that silently never renders.

use crate::key::PropKey;
use crate::schema::PanelSchema;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

// ─── Diagnostics ─────────────────────────────────────────────────────────

/// How seriously a finding should be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// Configuration the engine refuses to load.
    Error,
    /// Loads, but almost certainly a mistake.
    Warning,
    /// Worth knowing about; the schema may well be intentional.
    Info,
}

/// A single lint finding against a schema node.
#[derive(Debug, Clone)]
pub struct LintDiagnostic {
    /// The property this finding refers to, when there is one.
    pub key: Option<PropKey>,
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "dangling-reference", "listener-cycle").
    pub rule: &'static str,
}

// ─── Public API ──────────────────────────────────────────────────────────

/// Run all lint rules over a schema and return diagnostics.
/// `known_renderers` is the set of names the renderer registry can resolve.
#[must_use]
pub fn lint_schema(schema: &PanelSchema, known_renderers: &HashSet<String>) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_duplicate_keys(schema, &mut diags);
    lint_group_references(schema, &mut diags);
    lint_tab_group_references(schema, &mut diags);
    lint_dangling_references(schema, &mut diags);
    lint_default_tab(schema, &mut diags);
    lint_unreferenced_groups(schema, &mut diags);
    lint_renderers(schema, known_renderers, &mut diags);
    lint_listener_cycles(schema, &mut diags);
    lint_remote_dependencies(schema, &mut diags);
    diags
}

/// Whether any finding is load-blocking.
pub fn has_errors(diags: &[LintDiagnostic]) -> bool {
    diags.iter().any(|d| d.severity == LintSeverity::Error)
}

/// The `id`/`type` pseudo-entries every snapshot carries; legal targets
/// for dependency references even though no property declares them.
fn is_pseudo_key(key: PropKey) -> bool {
    matches!(key.as_str(), "id" | "type")
}

// ─── Rules ───────────────────────────────────────────────────────────────

/// Property keys must be unique across the whole schema, nesting included.
fn lint_duplicate_keys(schema: &PanelSchema, diags: &mut Vec<LintDiagnostic>) {
    let mut seen = HashSet::new();
    for def in schema.all_properties() {
        if !seen.insert(def.key) {
            diags.push(LintDiagnostic {
                key: Some(def.key),
                message: format!("Property `{}` is declared more than once.", def.key),
                severity: LintSeverity::Error,
                rule: "duplicate-key",
            });
        }
    }
}

/// Every top-level property must land in a declared group.
fn lint_group_references(schema: &PanelSchema, diags: &mut Vec<LintDiagnostic>) {
    for def in &schema.properties {
        match schema.effective_group(def) {
            None => diags.push(LintDiagnostic {
                key: Some(def.key),
                message: format!(
                    "Property `{}` has no group and the schema declares no default group.",
                    def.key
                ),
                severity: LintSeverity::Error,
                rule: "ungrouped-property",
            }),
            Some(gid) if schema.find_group(gid).is_none() => diags.push(LintDiagnostic {
                key: Some(def.key),
                message: format!("Property `{}` references undeclared group `{gid}`.", def.key),
                severity: LintSeverity::Error,
                rule: "unknown-group",
            }),
            Some(_) => {}
        }
    }
}

/// Tabs may only reference declared groups.
fn lint_tab_group_references(schema: &PanelSchema, diags: &mut Vec<LintDiagnostic>) {
    for tab in &schema.tabs {
        for gid in &tab.groups {
            if schema.find_group(gid).is_none() {
                diags.push(LintDiagnostic {
                    key: None,
                    message: format!("Tab `{}` references undeclared group `{gid}`.", tab.id),
                    severity: LintSeverity::Error,
                    rule: "unknown-tab-group",
                });
            }
        }
    }
}

/// `depends_on`, `watch`, `emits`, and remote `dependencies` must name
/// schema properties (the `id`/`type` pseudo-entries count).
fn lint_dangling_references(schema: &PanelSchema, diags: &mut Vec<LintDiagnostic>) {
    let declared: HashSet<PropKey> = schema.all_properties().iter().map(|d| d.key).collect();
    let check = |owner: PropKey, what: &str, key: PropKey, diags: &mut Vec<LintDiagnostic>| {
        if !declared.contains(&key) && !is_pseudo_key(key) {
            diags.push(LintDiagnostic {
                key: Some(owner),
                message: format!(
                    "Property `{owner}` {what} `{key}`, which no property declares."
                ),
                severity: LintSeverity::Error,
                rule: "dangling-reference",
            });
        }
    };
    for def in schema.all_properties() {
        for dep in &def.visibility.depends_on {
            check(def.key, "depends on", *dep, diags);
        }
        for listener in &def.change_listeners {
            for w in &listener.watch {
                check(def.key, "watches", *w, diags);
            }
            for e in &listener.emits {
                check(def.key, "emits", *e, diags);
            }
        }
        if let Some(remote) = def.options.as_ref().and_then(|s| s.as_remote()) {
            for dep in &remote.dependencies {
                check(def.key, "refreshes options on", *dep, diags);
            }
        }
    }
}

/// `default_tab` should name a declared tab.
fn lint_default_tab(schema: &PanelSchema, diags: &mut Vec<LintDiagnostic>) {
    if let Some(id) = &schema.default_tab
        && schema.find_tab(id).is_none()
    {
        diags.push(LintDiagnostic {
            key: None,
            message: format!("Default tab `{id}` is not declared."),
            severity: LintSeverity::Warning,
            rule: "unknown-default-tab",
        });
    }
}

/// When tabs exist, a group no tab references can never render. A tab
/// declaring no group ids shows every group, so it references them all.
fn lint_unreferenced_groups(schema: &PanelSchema, diags: &mut Vec<LintDiagnostic>) {
    if schema.tabs.is_empty() || schema.tabs.iter().any(|t| t.groups.is_empty()) {
        return;
    }
    let referenced: HashSet<&str> = schema
        .tabs
        .iter()
        .flat_map(|t| t.groups.iter().map(String::as_str))
        .collect();
    for group in &schema.groups {
        if !referenced.contains(group.id.as_str()) {
            diags.push(LintDiagnostic {
                key: None,
                message: format!("Group `{}` is referenced by no tab.", group.id),
                severity: LintSeverity::Warning,
                rule: "unreferenced-group",
            });
        }
    }
}

/// Custom renderer names must resolve in the registry.
fn lint_renderers(
    schema: &PanelSchema,
    known_renderers: &HashSet<String>,
    diags: &mut Vec<LintDiagnostic>,
) {
    for def in schema.all_properties() {
        if let Some(name) = &def.renderer
            && !known_renderers.contains(name)
        {
            diags.push(LintDiagnostic {
                key: Some(def.key),
                message: format!(
                    "Property `{}` uses renderer `{name}`, which is not registered.",
                    def.key
                ),
                severity: LintSeverity::Error,
                rule: "unknown-renderer",
            });
        }
    }
}

/// Cycles over the declared watch→emits graph re-trigger forever at
/// runtime; reject them at load. Self-loops are the degenerate case.
fn lint_listener_cycles(schema: &PanelSchema, diags: &mut Vec<LintDiagnostic>) {
    let mut graph: DiGraph<PropKey, ()> = DiGraph::new();
    let mut index: HashMap<PropKey, NodeIndex> = HashMap::new();
    let node = |graph: &mut DiGraph<PropKey, ()>,
                index: &mut HashMap<PropKey, NodeIndex>,
                key: PropKey| {
        *index.entry(key).or_insert_with(|| graph.add_node(key))
    };
    for (_, listener) in schema.listeners() {
        for w in &listener.watch {
            for e in &listener.emits {
                let from = node(&mut graph, &mut index, *w);
                let to = node(&mut graph, &mut index, *e);
                graph.add_edge(from, to, ());
            }
        }
    }
    for component in tarjan_scc(&graph) {
        let cyclic = component.len() > 1
            || (component.len() == 1 && graph.contains_edge(component[0], component[0]));
        if cyclic {
            let mut names: Vec<&str> = component.iter().map(|n| graph[*n].as_str()).collect();
            names.sort_unstable();
            diags.push(LintDiagnostic {
                key: Some(graph[component[0]]),
                message: format!(
                    "Change listeners form a cycle over {{{}}}; a cascade must not re-trigger its own watched fields.",
                    names.join(", ")
                ),
                severity: LintSeverity::Error,
                rule: "listener-cycle",
            });
        }
    }
}

/// A remote source whose request depends on live values but declares no
/// dependencies will never refresh after the first fetch.
fn lint_remote_dependencies(schema: &PanelSchema, diags: &mut Vec<LintDiagnostic>) {
    for def in schema.all_properties() {
        if let Some(remote) = def.options.as_ref().and_then(|s| s.as_remote())
            && remote.is_value_sensitive()
            && remote.dependencies.is_empty()
        {
            diags.push(LintDiagnostic {
                key: Some(def.key),
                message: format!(
                    "Property `{}` computes its options request from values but declares no dependencies; the options will never refresh on edits.",
                    def.key
                ),
                severity: LintSeverity::Info,
                rule: "remote-no-dependencies",
            });
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::options::{OptionsSource, RemoteOptions};
    use crate::schema::{ChangeListener, PanelSchema, PropertyDef, PropertyGroup, PropertyTab, ValueKind};

    fn renderers() -> HashSet<String> {
        HashSet::new()
    }

    fn grouped(key: &str) -> PropertyDef {
        PropertyDef::new(key, ValueKind::String).group("general")
    }

    fn base() -> PanelSchema {
        PanelSchema::new().group(PropertyGroup::new("general", "General"))
    }

    #[test]
    fn clean_schema_has_no_diags() {
        let schema = base()
            .tab(PropertyTab::new("general", "General").with_groups(&["general"]))
            .default_tab("general")
            .property(
                grouped("timerDefinition")
                    .visible_when(Condition::equals("eventDefinitionType", serde_json::json!("Timer"))),
            )
            .property(grouped("eventDefinitionType"));
        let diags = lint_schema(&schema, &renderers());
        assert!(diags.is_empty(), "clean schema should have no diagnostics: {diags:?}");
    }

    #[test]
    fn duplicate_keys_are_errors() {
        let schema = base().property(grouped("name")).property(grouped("name"));
        let diags = lint_schema(&schema, &renderers());
        assert!(diags.iter().any(|d| d.rule == "duplicate-key"));
    }

    #[test]
    fn unknown_and_missing_groups_are_errors() {
        let schema = PanelSchema::new()
            .group(PropertyGroup::new("general", "General"))
            .property(PropertyDef::new("a", ValueKind::String).group("ghost"))
            .property(PropertyDef::new("b", ValueKind::String));
        let diags = lint_schema(&schema, &renderers());
        assert!(diags.iter().any(|d| d.rule == "unknown-group"));
        assert!(diags.iter().any(|d| d.rule == "ungrouped-property"));
    }

    #[test]
    fn dangling_depends_on_is_an_error() {
        let schema = base().property(
            grouped("timerDefinition")
                .visible_when(Condition::equals("eventDefinitionType", serde_json::json!("Timer"))),
        );
        let diags = lint_schema(&schema, &renderers());
        assert!(
            diags
                .iter()
                .any(|d| d.rule == "dangling-reference" && d.message.contains("eventDefinitionType"))
        );
    }

    #[test]
    fn pseudo_keys_are_legal_dependencies() {
        let schema = base().property(
            grouped("serviceTopic")
                .visible_when(Condition::equals("type", serde_json::json!("bpmn:ServiceTask"))),
        );
        let diags = lint_schema(&schema, &renderers());
        assert!(diags.iter().all(|d| d.rule != "dangling-reference"));
    }

    #[test]
    fn tab_and_default_tab_references_are_checked() {
        let schema = base()
            .tab(PropertyTab::new("main", "Main").with_groups(&["ghost"]))
            .default_tab("missing")
            .property(grouped("name"));
        let diags = lint_schema(&schema, &renderers());
        assert!(diags.iter().any(|d| d.rule == "unknown-tab-group"));
        assert!(diags.iter().any(|d| d.rule == "unknown-default-tab"));
    }

    #[test]
    fn unreferenced_group_is_a_warning() {
        let schema = base()
            .group(PropertyGroup::new("orphan", "Orphan"))
            .tab(PropertyTab::new("main", "Main").with_groups(&["general"]))
            .property(grouped("name"));
        let diags = lint_schema(&schema, &renderers());
        assert!(
            diags
                .iter()
                .any(|d| d.rule == "unreferenced-group" && d.severity == LintSeverity::Warning)
        );
    }

    #[test]
    fn unknown_renderer_is_an_error() {
        let schema = base().property(grouped("name").renderer("fancy-input"));
        let diags = lint_schema(&schema, &renderers());
        assert!(diags.iter().any(|d| d.rule == "unknown-renderer"));

        let known: HashSet<String> = ["fancy-input".to_string()].into();
        let schema = base().property(grouped("name").renderer("fancy-input"));
        assert!(!lint_schema(&schema, &known).iter().any(|d| d.rule == "unknown-renderer"));
    }

    #[test]
    fn listener_self_loop_is_a_cycle() {
        let schema = base().property(
            grouped("dueDate").on_change(
                ChangeListener::new("echo", &["dueDate"], |_| Vec::new()).emits(&["dueDate"]),
            ),
        );
        let diags = lint_schema(&schema, &renderers());
        assert!(diags.iter().any(|d| d.rule == "listener-cycle"));
        assert!(has_errors(&diags));
    }

    #[test]
    fn two_listener_cycle_is_detected() {
        let schema = base()
            .property(grouped("a").on_change(
                ChangeListener::new("a-to-b", &["a"], |_| Vec::new()).emits(&["b"]),
            ))
            .property(grouped("b").on_change(
                ChangeListener::new("b-to-a", &["b"], |_| Vec::new()).emits(&["a"]),
            ));
        let diags = lint_schema(&schema, &renderers());
        assert!(
            diags
                .iter()
                .any(|d| d.rule == "listener-cycle" && d.message.contains("a, b"))
        );
    }

    #[test]
    fn acyclic_listener_chain_passes() {
        let schema = base()
            .property(grouped("dueDate").on_change(
                ChangeListener::new("classify", &["dueDate"], |_| Vec::new()).emits(&["slaCategory"]),
            ))
            .property(grouped("slaCategory"));
        let diags = lint_schema(&schema, &renderers());
        assert!(diags.iter().all(|d| d.rule != "listener-cycle"));
    }

    #[test]
    fn value_sensitive_remote_without_dependencies_is_flagged() {
        let remote = RemoteOptions::get("/api/users").params_with(|_, _| Vec::new());
        let schema = base().property(grouped("assignee").options_source(OptionsSource::Remote(remote)));
        let diags = lint_schema(&schema, &renderers());
        assert!(
            diags
                .iter()
                .any(|d| d.rule == "remote-no-dependencies" && d.severity == LintSeverity::Info)
        );
    }
}
