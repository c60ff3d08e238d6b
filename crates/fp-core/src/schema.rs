//! The declarative panel schema.
//!
//! A `PanelSchema` is static configuration built once at startup: every
//! property that could ever show up in the inspector, the groups and tabs
//! that arrange them, and the rules that decide visibility, options,
//! validation, and change propagation. The schema does not know what
//! element types exist — conditions over the selection decide everything
//! at organize time.
//!
//! Several shapes carry author-supplied closures (predicates, computed
//! options, listeners), so schemas are code-built values with a builder
//! API rather than a serialized file. The plain data parts keep their
//! serde derives.

use crate::condition::Condition;
use crate::key::PropKey;
use crate::model::Element;
use crate::options::{OptionEntry, OptionsSource};
use crate::validate::ValidationRule;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Debounce window used when a listener asks for `debounced()` without a
/// delay.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Recursion limit for nested sub-property organization.
pub const MAX_NESTING_DEPTH: usize = 4;

// ─── Kinds ───────────────────────────────────────────────────────────────

/// Semantic type of a property's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Date,
    Time,
    DateTime,
    Enum,
    Array,
    Object,
    Expression,
    Script,
    Color,
    Icon,
    File,
    Custom,
}

/// Concrete input widget the rendering layer should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
    Text,
    Textarea,
    Number,
    Checkbox,
    Select,
    Multiselect,
    Tags,
    Date,
    Time,
    DateTime,
    Color,
    Icon,
    File,
    Expression,
    Code,
    Card,
    Panel,
    Custom,
}

// ─── Visibility ──────────────────────────────────────────────────────────

/// A condition plus the snapshot fields it reads. The dependency set is
/// collected from the condition's structure; `Func` predicates are opaque,
/// so their reads must be declared by hand via `also_depends_on`.
#[derive(Debug, Clone, Default)]
pub struct Visibility {
    pub condition: Condition,
    pub depends_on: SmallVec<[PropKey; 4]>,
}

impl Visibility {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn when(condition: Condition) -> Self {
        let mut depends_on = SmallVec::new();
        condition.collect_value_deps(&mut depends_on);
        Self {
            condition,
            depends_on,
        }
    }

    #[must_use]
    pub fn also_depends_on(mut self, keys: &[&str]) -> Self {
        for k in keys {
            let key = PropKey::intern(k);
            if !self.depends_on.contains(&key) {
                self.depends_on.push(key);
            }
        }
        self
    }
}

// ─── Change listeners ────────────────────────────────────────────────────

/// When a listener runs relative to the edit that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    /// Synchronously, in schema declaration order, before the edit call
    /// returns.
    Immediate,
    /// Coalesced: repeated triggers within the window collapse into one
    /// execution with the last values.
    Debounced { delay_ms: u64 },
}

/// What a listener handler sees when it runs.
pub struct ListenerCtx<'a> {
    pub element: &'a Element,
    pub values: &'a crate::model::Snapshot,
    /// The watched key whose change fired this execution.
    pub changed: PropKey,
    pub value: &'a Value,
}

pub type ListenerFn = dyn Fn(&ListenerCtx<'_>) -> Vec<(PropKey, Value)> + Send + Sync;

/// Reacts to edits of the watched properties by producing follow-up value
/// updates.
#[derive(Clone)]
pub struct ChangeListener {
    /// Diagnostic name; shows up in cascade error reports.
    pub name: String,
    pub watch: SmallVec<[PropKey; 4]>,
    pub trigger: Trigger,
    /// Properties the handler may write. Declared so the schema lint can
    /// reject watch→emit cycles at load instead of at runtime.
    pub emits: SmallVec<[PropKey; 4]>,
    pub handler: Arc<ListenerFn>,
}

impl fmt::Debug for ChangeListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListener")
            .field("name", &self.name)
            .field("watch", &self.watch)
            .field("trigger", &self.trigger)
            .field("emits", &self.emits)
            .finish_non_exhaustive()
    }
}

impl ChangeListener {
    pub fn new(
        name: impl Into<String>,
        watch: &[&str],
        handler: impl Fn(&ListenerCtx<'_>) -> Vec<(PropKey, Value)> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            watch: watch.iter().map(|k| PropKey::intern(k)).collect(),
            trigger: Trigger::Immediate,
            emits: SmallVec::new(),
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn debounced(mut self, delay_ms: u64) -> Self {
        self.trigger = Trigger::Debounced { delay_ms };
        self
    }

    #[must_use]
    pub fn debounced_default(self) -> Self {
        self.debounced(DEFAULT_DEBOUNCE_MS)
    }

    #[must_use]
    pub fn emits(mut self, keys: &[&str]) -> Self {
        self.emits = keys.iter().map(|k| PropKey::intern(k)).collect();
        self
    }
}

// ─── Defaults & layout ───────────────────────────────────────────────────

pub type DefaultFn = dyn Fn(&Element) -> Value + Send + Sync;

/// Initial value when the element carries none.
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Computed(Arc<DefaultFn>),
}

impl DefaultValue {
    pub fn resolve(&self, element: &Element) -> Value {
        match self {
            DefaultValue::Static(v) => v.clone(),
            DefaultValue::Computed(f) => f(element),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(v) => f.debug_tuple("Static").field(v).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Per-property placement hints inside its group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub order: i32,
    pub section: Option<String>,
}

// ─── Property / group / tab ──────────────────────────────────────────────

/// A single configurable field.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    /// Unique key; doubles as the storage path on business data.
    pub key: PropKey,
    pub label: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub icon: Option<String>,
    pub value_kind: ValueKind,
    /// Explicit widget override; `effective_input_kind` derives one
    /// otherwise.
    pub input_kind: Option<InputKind>,
    /// Group id; falls back to the schema's `default_group` when absent.
    pub group: Option<String>,
    pub visibility: Visibility,
    pub options: Option<OptionsSource>,
    pub validation: Vec<ValidationRule>,
    pub default_value: Option<DefaultValue>,
    pub change_listeners: Vec<ChangeListener>,
    /// Never written through the binder; writes are silent no-ops.
    pub read_only: bool,
    /// Custom renderer name; must resolve in the registry at load.
    pub renderer: Option<String>,
    pub layout: Option<Layout>,
    /// Nested sub-properties for composite widgets (card/panel), organized
    /// recursively.
    pub properties: Vec<PropertyDef>,
}

impl PropertyDef {
    pub fn new(key: impl Into<PropKey>, value_kind: ValueKind) -> Self {
        let key = key.into();
        Self {
            key,
            label: key.as_str().to_string(),
            description: None,
            placeholder: None,
            icon: None,
            value_kind,
            input_kind: None,
            group: None,
            visibility: Visibility::always(),
            options: None,
            validation: Vec::new(),
            default_value: None,
            change_listeners: Vec::new(),
            read_only: false,
            renderer: None,
            layout: None,
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn input(mut self, input_kind: InputKind) -> Self {
        self.input_kind = Some(input_kind);
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn visible_when(mut self, condition: Condition) -> Self {
        self.visibility = Visibility::when(condition);
        self
    }

    #[must_use]
    pub fn depends_on(mut self, keys: &[&str]) -> Self {
        self.visibility = std::mem::take(&mut self.visibility).also_depends_on(keys);
        self
    }

    #[must_use]
    pub fn options(mut self, entries: Vec<OptionEntry>) -> Self {
        self.options = Some(OptionsSource::Static(entries));
        self
    }

    #[must_use]
    pub fn options_source(mut self, source: OptionsSource) -> Self {
        self.options = Some(source);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.validation.push(rule);
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(DefaultValue::Static(value));
        self
    }

    #[must_use]
    pub fn default_with(mut self, f: impl Fn(&Element) -> Value + Send + Sync + 'static) -> Self {
        self.default_value = Some(DefaultValue::Computed(Arc::new(f)));
        self
    }

    #[must_use]
    pub fn on_change(mut self, listener: ChangeListener) -> Self {
        self.change_listeners.push(listener);
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn renderer(mut self, name: impl Into<String>) -> Self {
        self.renderer = Some(name.into());
        self
    }

    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.layout.get_or_insert_with(Layout::default).order = order;
        self
    }

    #[must_use]
    pub fn child(mut self, child: PropertyDef) -> Self {
        self.properties.push(child);
        self
    }

    /// The widget to render: the explicit override, or the fixed
    /// value-kind table.
    pub fn effective_input_kind(&self) -> InputKind {
        if let Some(kind) = self.input_kind {
            return kind;
        }
        let has_options = self.options.is_some();
        match self.value_kind {
            ValueKind::String if has_options => InputKind::Select,
            ValueKind::String => InputKind::Text,
            ValueKind::Number => InputKind::Number,
            ValueKind::Boolean => InputKind::Checkbox,
            ValueKind::Date => InputKind::Date,
            ValueKind::Time => InputKind::Time,
            ValueKind::DateTime => InputKind::DateTime,
            ValueKind::Enum => InputKind::Select,
            ValueKind::Array if has_options => InputKind::Multiselect,
            ValueKind::Array => InputKind::Tags,
            ValueKind::Object => InputKind::Card,
            ValueKind::Expression => InputKind::Expression,
            ValueKind::Script => InputKind::Code,
            ValueKind::Color => InputKind::Color,
            ValueKind::Icon => InputKind::Icon,
            ValueKind::File => InputKind::File,
            ValueKind::Custom => InputKind::Custom,
        }
    }

    /// Declaration-order layout rank inside the group.
    pub fn layout_order(&self) -> i32 {
        self.layout.as_ref().map_or(0, |l| l.order)
    }
}

/// A labeled, orderable, optionally-collapsible container of properties.
/// Its visibility is independent of member properties' conditions — hiding
/// the group hides all members.
#[derive(Debug, Clone)]
pub struct PropertyGroup {
    pub id: String,
    pub label: String,
    pub order: i32,
    pub collapsible: bool,
    pub collapsed: bool,
    pub visibility: Visibility,
}

impl PropertyGroup {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            order: 0,
            collapsible: false,
            collapsed: false,
            visibility: Visibility::always(),
        }
    }

    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn collapsible(mut self) -> Self {
        self.collapsible = true;
        self
    }

    #[must_use]
    pub fn start_collapsed(mut self) -> Self {
        self.collapsible = true;
        self.collapsed = true;
        self
    }

    #[must_use]
    pub fn visible_when(mut self, condition: Condition) -> Self {
        self.visibility = Visibility::when(condition);
        self
    }
}

/// A labeled, orderable container referencing zero or more groups.
#[derive(Debug, Clone)]
pub struct PropertyTab {
    pub id: String,
    pub label: String,
    pub order: i32,
    pub groups: Vec<String>,
    pub visibility: Visibility,
}

impl PropertyTab {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            order: 0,
            groups: Vec::new(),
            visibility: Visibility::always(),
        }
    }

    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_groups(mut self, ids: &[&str]) -> Self {
        self.groups.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    #[must_use]
    pub fn visible_when(mut self, condition: Condition) -> Self {
        self.visibility = Visibility::when(condition);
        self
    }
}

// ─── Schema root ─────────────────────────────────────────────────────────

/// The root configuration: ordered properties, groups, tabs, and the
/// fallbacks used when nothing is explicitly visible-and-first.
#[derive(Debug, Clone, Default)]
pub struct PanelSchema {
    pub properties: Vec<PropertyDef>,
    pub groups: Vec<PropertyGroup>,
    pub tabs: Vec<PropertyTab>,
    pub default_tab: Option<String>,
    pub default_group: Option<String>,
}

impl PanelSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn property(mut self, def: PropertyDef) -> Self {
        self.properties.push(def);
        self
    }

    #[must_use]
    pub fn group(mut self, group: PropertyGroup) -> Self {
        self.groups.push(group);
        self
    }

    #[must_use]
    pub fn tab(mut self, tab: PropertyTab) -> Self {
        self.tabs.push(tab);
        self
    }

    #[must_use]
    pub fn default_tab(mut self, id: impl Into<String>) -> Self {
        self.default_tab = Some(id.into());
        self
    }

    #[must_use]
    pub fn default_group(mut self, id: impl Into<String>) -> Self {
        self.default_group = Some(id.into());
        self
    }

    /// All properties, nested ones included, in depth-first declaration
    /// order.
    pub fn all_properties(&self) -> Vec<&PropertyDef> {
        fn walk<'a>(props: &'a [PropertyDef], out: &mut Vec<&'a PropertyDef>) {
            for p in props {
                out.push(p);
                walk(&p.properties, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.properties, &mut out);
        out
    }

    /// Find a property (nested included) by key.
    pub fn find_property(&self, key: PropKey) -> Option<&PropertyDef> {
        self.all_properties().into_iter().find(|p| p.key == key)
    }

    pub fn find_group(&self, id: &str) -> Option<&PropertyGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn find_tab(&self, id: &str) -> Option<&PropertyTab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// The group a property lands in, after the `default_group` fallback.
    pub fn effective_group<'a>(&'a self, def: &'a PropertyDef) -> Option<&'a str> {
        def.group.as_deref().or(self.default_group.as_deref())
    }

    /// Every change listener with its owning property, in depth-first
    /// declaration order — the order immediate listeners execute in.
    pub fn listeners(&self) -> Vec<(PropKey, &ChangeListener)> {
        self.all_properties()
            .into_iter()
            .flat_map(|p| p.change_listeners.iter().map(move |l| (p.key, l)))
            .collect()
    }
}
