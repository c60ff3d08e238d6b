//! Organizing the flat schema into the tab/group/property tree for the
//! current selection.
//!
//! The organizer is a pure function from (schema, element, values) to a
//! `PanelView`: properties filtered by visibility, partitioned into groups,
//! groups resolved into visible tabs, everything ordered. The view borrows
//! the schema — it is a projection, not a copy, and carries no mutable
//! state of its own. Empty groups and empty tabs never survive.

use crate::condition::evaluate;
use crate::key::PropKey;
use crate::model::{Element, Snapshot};
use crate::schema::{
    InputKind, MAX_NESTING_DEPTH, PanelSchema, PropertyDef, PropertyGroup, PropertyTab,
};
use std::collections::HashMap;

/// Tab id/label used when a schema declares no tabs at all.
pub const IMPLICIT_TAB_ID: &str = "default";
pub const IMPLICIT_TAB_LABEL: &str = "Properties";

// ─── View tree ───────────────────────────────────────────────────────────

/// One visible property, with its resolved widget and surviving children.
#[derive(Debug, Clone)]
pub struct PropView<'a> {
    pub def: &'a PropertyDef,
    pub input_kind: InputKind,
    pub children: Vec<PropView<'a>>,
}

impl PropView<'_> {
    pub fn key(&self) -> PropKey {
        self.def.key
    }
}

/// One visible, non-empty group.
#[derive(Debug)]
pub struct GroupView<'a> {
    pub group: &'a PropertyGroup,
    pub properties: Vec<PropView<'a>>,
}

impl GroupView<'_> {
    pub fn id(&self) -> &str {
        &self.group.id
    }
}

/// One visible, non-empty tab. Synthesized for schemas without tabs.
#[derive(Debug)]
pub struct TabView<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub groups: Vec<GroupView<'a>>,
}

/// The organized panel for one (element, values) pair.
#[derive(Debug)]
pub struct PanelView<'a> {
    pub tabs: Vec<TabView<'a>>,
    /// Initially-active tab id: first surviving tab, else the schema's
    /// `default_tab`, else the first declared tab. `None` only when the
    /// schema declares no tabs and nothing is visible.
    pub active_tab: Option<String>,
}

impl<'a> PanelView<'a> {
    pub fn find_tab(&self, id: &str) -> Option<&TabView<'a>> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// Whether a property (nested included) survived into the view.
    pub fn contains_property(&self, key: PropKey) -> bool {
        self.flat_properties().iter().any(|p| p.def.key == key)
    }

    /// Every surviving property, nested ones included, in view order.
    pub fn flat_properties(&self) -> Vec<&PropView<'a>> {
        fn walk<'v, 'a>(props: &'v [PropView<'a>], out: &mut Vec<&'v PropView<'a>>) {
            for p in props {
                out.push(p);
                walk(&p.children, out);
            }
        }
        let mut out = Vec::new();
        for tab in &self.tabs {
            for group in &tab.groups {
                walk(&group.properties, &mut out);
            }
        }
        out
    }
}

// ─── Organization ────────────────────────────────────────────────────────

/// Produce the organized view for the current selection.
pub fn organize<'a>(schema: &'a PanelSchema, element: &Element, values: &Snapshot) -> PanelView<'a> {
    // 1–2: visibility-filter top-level properties, bucket them by group.
    let mut buckets: HashMap<&str, Vec<PropView<'a>>> = HashMap::new();
    for def in &schema.properties {
        if !evaluate(&def.visibility.condition, element, values) {
            continue;
        }
        let Some(group_id) = schema.effective_group(def) else {
            log::debug!("property {} has no group and no default group", def.key);
            continue;
        };
        buckets
            .entry(group_id)
            .or_default()
            .push(prop_view(def, element, values, 0));
    }

    // 6: order within each group — declaration order unless layout hints
    // say otherwise (stable sort keeps ties declared).
    for bucket in buckets.values_mut() {
        bucket.sort_by_key(|p| p.def.layout_order());
    }

    let mut tabs = if schema.tabs.is_empty() {
        implicit_tab(schema, element, values, &buckets)
    } else {
        declared_tabs(schema, element, values, &buckets)
    };
    tabs.retain(|t| !t.groups.is_empty());

    // 7: active-tab fallback chain.
    let active_tab = tabs
        .first()
        .map(|t| t.id.to_string())
        .or_else(|| {
            schema
                .default_tab
                .as_ref()
                .filter(|id| schema.find_tab(id).is_some())
                .cloned()
        })
        .or_else(|| schema.tabs.first().map(|t| t.id.clone()));

    PanelView { tabs, active_tab }
}

/// 3–4: visible declared tabs in order, each resolving its group ids. A
/// tab declaring no group ids shows every surviving group; a group
/// referenced by several visible tabs renders in each of them.
fn declared_tabs<'a>(
    schema: &'a PanelSchema,
    element: &Element,
    values: &Snapshot,
    buckets: &HashMap<&str, Vec<PropView<'a>>>,
) -> Vec<TabView<'a>> {
    let mut visible: Vec<(usize, &'a PropertyTab)> = schema
        .tabs
        .iter()
        .enumerate()
        .filter(|(_, t)| evaluate(&t.visibility.condition, element, values))
        .collect();
    visible.sort_by_key(|(idx, t)| (t.order, *idx));

    visible
        .into_iter()
        .map(|(_, tab)| {
            let mut groups: Vec<GroupView<'a>> = if tab.groups.is_empty() {
                schema
                    .groups
                    .iter()
                    .filter_map(|g| resolve_group(schema, &g.id, element, values, buckets))
                    .collect()
            } else {
                tab.groups
                    .iter()
                    .filter_map(|gid| resolve_group(schema, gid, element, values, buckets))
                    .collect()
            };
            groups.sort_by_key(|g| g.group.order);
            TabView {
                id: &tab.id,
                label: &tab.label,
                groups,
            }
        })
        .collect()
}

/// 5: no declared tabs — one synthesized tab holding every surviving group.
fn implicit_tab<'a>(
    schema: &'a PanelSchema,
    element: &Element,
    values: &Snapshot,
    buckets: &HashMap<&str, Vec<PropView<'a>>>,
) -> Vec<TabView<'a>> {
    let mut groups: Vec<GroupView<'a>> = schema
        .groups
        .iter()
        .filter_map(|g| resolve_group(schema, &g.id, element, values, buckets))
        .collect();
    groups.sort_by_key(|g| g.group.order);
    vec![TabView {
        id: IMPLICIT_TAB_ID,
        label: IMPLICIT_TAB_LABEL,
        groups,
    }]
}

/// A group survives only if declared, visible, and non-empty.
fn resolve_group<'a>(
    schema: &'a PanelSchema,
    group_id: &str,
    element: &Element,
    values: &Snapshot,
    buckets: &HashMap<&str, Vec<PropView<'a>>>,
) -> Option<GroupView<'a>> {
    let group = schema.find_group(group_id)?;
    if !evaluate(&group.visibility.condition, element, values) {
        return None;
    }
    let properties = buckets.get(group_id)?;
    if properties.is_empty() {
        return None;
    }
    Some(GroupView {
        group,
        properties: properties.clone(),
    })
}

/// 8: recursive view over nested sub-properties, visibility-filtered,
/// depth-capped.
fn prop_view<'a>(
    def: &'a PropertyDef,
    element: &Element,
    values: &Snapshot,
    depth: usize,
) -> PropView<'a> {
    let children = if def.properties.is_empty() {
        Vec::new()
    } else if depth + 1 >= MAX_NESTING_DEPTH {
        log::debug!("nested properties under {} pruned at depth cap", def.key);
        Vec::new()
    } else {
        let mut children: Vec<PropView<'a>> = def
            .properties
            .iter()
            .filter(|c| evaluate(&c.visibility.condition, element, values))
            .map(|c| prop_view(c, element, values, depth + 1))
            .collect();
        children.sort_by_key(|p| p.def.layout_order());
        children
    };
    PropView {
        def,
        input_kind: def.effective_input_kind(),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::schema::ValueKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn element() -> Element {
        Element::new("Task_1", "bpmn:UserTask")
    }

    fn values(pairs: &[(&str, serde_json::Value)]) -> Snapshot {
        let mut snap = Snapshot::new();
        for (k, v) in pairs {
            snap.set(PropKey::intern(k), v.clone());
        }
        snap
    }

    fn two_tab_schema() -> PanelSchema {
        PanelSchema::new()
            .tab(PropertyTab::new("general", "General").order(10).with_groups(&["basics"]))
            .tab(
                PropertyTab::new("advanced", "Advanced")
                    .order(20)
                    .with_groups(&["tuning"])
                    .visible_when(Condition::equals("mode", json!("expert"))),
            )
            .group(PropertyGroup::new("basics", "Basics").order(10))
            .group(PropertyGroup::new("tuning", "Tuning").order(20))
            .property(PropertyDef::new("name", ValueKind::String).group("basics"))
            .property(
                PropertyDef::new("retries", ValueKind::Number)
                    .group("tuning")
                    .visible_when(Condition::equals("mode", json!("expert"))),
            )
    }

    #[test]
    fn hidden_properties_empty_groups_and_tabs_are_pruned() {
        let schema = two_tab_schema();
        let view = organize(&schema, &element(), &values(&[]));
        assert_eq!(view.tabs.len(), 1);
        assert_eq!(view.tabs[0].id, "general");
        assert!(!view.contains_property(PropKey::intern("retries")));

        let view = organize(&schema, &element(), &values(&[("mode", json!("expert"))]));
        assert_eq!(view.tabs.len(), 2);
        assert!(view.contains_property(PropKey::intern("retries")));
    }

    #[test]
    fn tabs_sort_by_order_with_declaration_ties() {
        let schema = PanelSchema::new()
            .tab(PropertyTab::new("b", "B").order(5).with_groups(&["g"]))
            .tab(PropertyTab::new("a", "A").order(5).with_groups(&["g"]))
            .group(PropertyGroup::new("g", "G"))
            .property(PropertyDef::new("p", ValueKind::String).group("g"));
        let view = organize(&schema, &element(), &values(&[]));
        // Equal order keeps declaration order; the shared group renders
        // in every tab that references it.
        assert_eq!(view.tabs.len(), 2);
        assert_eq!(view.tabs[0].id, "b");
        assert_eq!(view.tabs[1].id, "a");
        assert_eq!(view.tabs[0].groups[0].id(), "g");
        assert_eq!(view.tabs[1].groups[0].id(), "g");
    }

    #[test]
    fn tab_without_group_ids_shows_every_surviving_group() {
        let schema = PanelSchema::new()
            .tab(PropertyTab::new("all", "All"))
            .group(PropertyGroup::new("late", "Late").order(20))
            .group(PropertyGroup::new("early", "Early").order(10))
            .group(
                PropertyGroup::new("hidden", "Hidden")
                    .visible_when(Condition::never()),
            )
            .property(PropertyDef::new("a", ValueKind::String).group("late"))
            .property(PropertyDef::new("b", ValueKind::String).group("early"))
            .property(PropertyDef::new("c", ValueKind::String).group("hidden"));
        let view = organize(&schema, &element(), &values(&[]));
        assert_eq!(view.tabs.len(), 1);
        let ids: Vec<&str> = view.tabs[0].groups.iter().map(|g| g.id()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn properties_order_by_layout_hint_within_group() {
        let schema = PanelSchema::new()
            .group(PropertyGroup::new("g", "G"))
            .property(PropertyDef::new("third", ValueKind::String).group("g").order(30))
            .property(PropertyDef::new("first", ValueKind::String).group("g").order(10))
            .property(PropertyDef::new("second", ValueKind::String).group("g").order(20));
        let view = organize(&schema, &element(), &values(&[]));
        let keys: Vec<&str> = view.tabs[0].groups[0]
            .properties
            .iter()
            .map(|p| p.def.key.as_str())
            .collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[test]
    fn schema_without_tabs_synthesizes_one() {
        let schema = PanelSchema::new()
            .group(PropertyGroup::new("late", "Late").order(20))
            .group(PropertyGroup::new("early", "Early").order(10))
            .property(PropertyDef::new("a", ValueKind::String).group("late"))
            .property(PropertyDef::new("b", ValueKind::String).group("early"));
        let view = organize(&schema, &element(), &values(&[]));
        assert_eq!(view.tabs.len(), 1);
        assert_eq!(view.tabs[0].id, IMPLICIT_TAB_ID);
        assert_eq!(view.tabs[0].label, IMPLICIT_TAB_LABEL);
        let ids: Vec<&str> = view.tabs[0].groups.iter().map(|g| g.id()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(view.active_tab.as_deref(), Some(IMPLICIT_TAB_ID));
    }

    #[test]
    fn group_visibility_hides_all_members() {
        let schema = PanelSchema::new()
            .group(
                PropertyGroup::new("secret", "Secret")
                    .visible_when(Condition::equals("reveal", json!(true))),
            )
            .property(PropertyDef::new("hidden", ValueKind::String).group("secret"));
        let view = organize(&schema, &element(), &values(&[]));
        assert!(view.tabs.is_empty(), "empty implicit tab must be pruned");
        assert!(!view.contains_property(PropKey::intern("hidden")));
    }

    #[test]
    fn active_tab_falls_back_to_default_then_first_declared() {
        let schema = PanelSchema::new()
            .default_tab("second")
            .tab(PropertyTab::new("first", "First").visible_when(Condition::never()))
            .tab(PropertyTab::new("second", "Second").visible_when(Condition::never()));
        let view = organize(&schema, &element(), &values(&[]));
        assert!(view.tabs.is_empty());
        assert_eq!(view.active_tab.as_deref(), Some("second"));

        let schema = PanelSchema::new()
            .default_tab("missing")
            .tab(PropertyTab::new("first", "First").visible_when(Condition::never()));
        let view = organize(&schema, &element(), &values(&[]));
        assert_eq!(view.active_tab.as_deref(), Some("first"));
    }

    #[test]
    fn nested_properties_filter_and_cap() {
        fn nest(key: &str, child: Option<PropertyDef>) -> PropertyDef {
            let def = PropertyDef::new(key, ValueKind::Object);
            match child {
                Some(c) => def.child(c),
                None => def,
            }
        }
        // Depth 0..=4 chain; the cap prunes the deepest level.
        let leaf = nest("d4", None);
        let chain = nest("d0", Some(nest("d1", Some(nest("d2", Some(nest("d3", Some(leaf))))))));
        let schema = PanelSchema::new()
            .group(PropertyGroup::new("g", "G"))
            .property(chain.group("g").child(
                PropertyDef::new("hiddenChild", ValueKind::String)
                    .visible_when(Condition::never()),
            ));
        let view = organize(&schema, &element(), &values(&[]));
        assert!(view.contains_property(PropKey::intern("d3")));
        assert!(!view.contains_property(PropKey::intern("d4")));
        assert!(!view.contains_property(PropKey::intern("hiddenChild")));
    }

    #[test]
    fn view_with_no_tabs_and_no_default_has_no_active() {
        let schema = PanelSchema::new();
        let view = organize(&schema, &element(), &values(&[]));
        assert!(view.tabs.is_empty());
        assert_eq!(view.active_tab, None);
    }
}
