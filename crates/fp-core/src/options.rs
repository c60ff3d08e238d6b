//! Option sources and their resolution.
//!
//! A field's selectable choices come from one of three places: a literal
//! list declared in the schema, a synchronous computation, or a remote
//! endpoint returning a JSON array. The first two resolve here; the remote
//! one splits in half — request *building* and response *mapping* are pure
//! and live here, the HTTP exchange itself belongs to the engine's fetch
//! layer so this crate stays free of I/O.

use crate::key::PropKey;
use crate::model::{Element, Snapshot, path_get};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

// ─── Option entries ──────────────────────────────────────────────────────

/// One selectable choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub value: Value,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    /// Nested entries for grouped selects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OptionEntry>,
}

impl OptionEntry {
    pub fn new(value: Value, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
            icon: None,
            description: None,
            disabled: false,
            children: Vec::new(),
        }
    }

    /// Shorthand for the common string-valued case.
    pub fn of(value: &str, label: &str) -> Self {
        Self::new(Value::String(value.to_string()), label.to_string())
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<OptionEntry>) -> Self {
        self.children = children;
        self
    }
}

// ─── Remote descriptors ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// Dot-paths into each response item. Unset paths fall back to the
/// conventional keys (`value`/`id`, `label`/`name`/`title`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMapping {
    pub value: Option<String>,
    pub label: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub disabled: Option<String>,
}

impl ResponseMapping {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            label: Some(label.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_disabled(mut self, path: impl Into<String>) -> Self {
        self.disabled = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_icon(mut self, path: impl Into<String>) -> Self {
        self.icon = Some(path.into());
        self
    }
}

/// Request parameters: fixed pairs or computed from the live values.
#[derive(Clone)]
pub enum ParamSpec {
    Static(Vec<(String, String)>),
    Computed(Arc<ParamsFn>),
}

pub type ParamsFn = dyn Fn(&Element, &Snapshot) -> Vec<(String, String)> + Send + Sync;

impl ParamSpec {
    fn resolve(&self, element: &Element, values: &Snapshot) -> Vec<(String, String)> {
        match self {
            ParamSpec::Static(pairs) => pairs.clone(),
            ParamSpec::Computed(f) => f(element, values),
        }
    }

    fn is_computed(&self) -> bool {
        matches!(self, ParamSpec::Computed(_))
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSpec::Static(pairs) => f.debug_tuple("Static").field(pairs).finish(),
            ParamSpec::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

pub type TransformFn =
    dyn Fn(Vec<OptionEntry>, &Element, &Snapshot) -> Vec<OptionEntry> + Send + Sync;

/// A remote option lookup: endpoint, request shape, response mapping, and
/// the property keys whose edits invalidate the current result.
#[derive(Clone)]
pub struct RemoteOptions {
    pub endpoint: String,
    pub method: HttpMethod,
    pub params: ParamSpec,
    /// POST body override. When absent, POST sends `params` as the JSON
    /// body; GET ignores this entirely.
    pub body: Option<ParamSpec>,
    pub headers: Vec<(String, String)>,
    pub mapping: ResponseMapping,
    pub dependencies: SmallVec<[PropKey; 4]>,
    /// Post-processing over the mapped entries (filtering, defaults, ...).
    pub transform: Option<Arc<TransformFn>>,
}

impl fmt::Debug for RemoteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteOptions")
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .field("params", &self.params)
            .field("dependencies", &self.dependencies)
            .field("transform", &self.transform.as_ref().map(|_| ".."))
            .finish_non_exhaustive()
    }
}

impl RemoteOptions {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: HttpMethod::Get,
            params: ParamSpec::Static(Vec::new()),
            body: None,
            headers: Vec::new(),
            mapping: ResponseMapping::default(),
            dependencies: SmallVec::new(),
            transform: None,
        }
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(endpoint)
        }
    }

    #[must_use]
    pub fn param(mut self, name: &str, value: &str) -> Self {
        match &mut self.params {
            ParamSpec::Static(pairs) => pairs.push((name.to_string(), value.to_string())),
            ParamSpec::Computed(_) => {
                self.params = ParamSpec::Static(vec![(name.to_string(), value.to_string())]);
            }
        }
        self
    }

    #[must_use]
    pub fn params_with(
        mut self,
        f: impl Fn(&Element, &Snapshot) -> Vec<(String, String)> + Send + Sync + 'static,
    ) -> Self {
        self.params = ParamSpec::Computed(Arc::new(f));
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn mapping(mut self, mapping: ResponseMapping) -> Self {
        self.mapping = mapping;
        self
    }

    #[must_use]
    pub fn depends_on(mut self, keys: &[&str]) -> Self {
        for k in keys {
            self.dependencies.push(PropKey::intern(k));
        }
        self
    }

    #[must_use]
    pub fn transform(
        mut self,
        f: impl Fn(Vec<OptionEntry>, &Element, &Snapshot) -> Vec<OptionEntry>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(f));
        self
    }

    /// Whether edits can change the request this source would send.
    pub fn is_value_sensitive(&self) -> bool {
        self.params.is_computed() || self.body.as_ref().is_some_and(ParamSpec::is_computed)
    }
}

// ─── Sources ─────────────────────────────────────────────────────────────

pub type ComputeFn = dyn Fn(&Element, &Snapshot) -> Result<Vec<OptionEntry>, String> + Send + Sync;

/// A synchronous author-supplied computation. A returned `Err` degrades to
/// an empty list (logged); a panic inside the closure is an author bug and
/// is not caught.
#[derive(Clone)]
pub struct ComputedOptions {
    pub name: String,
    pub compute: Arc<ComputeFn>,
}

impl fmt::Debug for ComputedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComputedOptions({})", self.name)
    }
}

/// Where a field's choices come from.
#[derive(Debug, Clone)]
pub enum OptionsSource {
    /// Literal entries, served verbatim in declared order.
    Static(Vec<OptionEntry>),
    Computed(ComputedOptions),
    Remote(RemoteOptions),
}

impl OptionsSource {
    pub fn computed(
        name: impl Into<String>,
        f: impl Fn(&Element, &Snapshot) -> Result<Vec<OptionEntry>, String> + Send + Sync + 'static,
    ) -> Self {
        OptionsSource::Computed(ComputedOptions {
            name: name.into(),
            compute: Arc::new(f),
        })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, OptionsSource::Remote(_))
    }

    pub fn as_remote(&self) -> Option<&RemoteOptions> {
        match self {
            OptionsSource::Remote(r) => Some(r),
            _ => None,
        }
    }
}

/// Resolve the synchronous sources. `None` means the source is remote and
/// must go through the fetch lifecycle instead.
pub fn resolve_sync(
    source: &OptionsSource,
    element: &Element,
    values: &Snapshot,
) -> Option<Vec<OptionEntry>> {
    match source {
        OptionsSource::Static(entries) => Some(entries.clone()),
        OptionsSource::Computed(c) => Some(match (c.compute)(element, values) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("computed options '{}' failed: {err}", c.name);
                Vec::new()
            }
        }),
        OptionsSource::Remote(_) => None,
    }
}

// ─── Remote request building ─────────────────────────────────────────────

/// A fully-resolved request, ready for a transport. Query pairs stay
/// structured so the transport's client does the encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsRequest {
    pub endpoint: String,
    pub method: HttpMethod,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Build the request a remote source would send right now.
pub fn build_request(
    remote: &RemoteOptions,
    element: &Element,
    values: &Snapshot,
) -> OptionsRequest {
    let params = remote.params.resolve(element, values);
    let body = match remote.method {
        HttpMethod::Get => None,
        HttpMethod::Post => {
            let pairs = match &remote.body {
                Some(spec) => spec.resolve(element, values),
                None => params.clone(),
            };
            let mut obj = Map::new();
            for (k, v) in pairs {
                obj.insert(k, Value::String(v));
            }
            Some(Value::Object(obj))
        }
    };
    OptionsRequest {
        endpoint: remote.endpoint.clone(),
        method: remote.method,
        query: match remote.method {
            HttpMethod::Get => params,
            HttpMethod::Post => Vec::new(),
        },
        headers: remote.headers.clone(),
        body,
    }
}

// ─── Remote response mapping ─────────────────────────────────────────────

/// Map raw response items into option entries and run the source's
/// transform. Non-object items are skipped (logged at debug).
pub fn map_response(
    remote: &RemoteOptions,
    items: &[Value],
    element: &Element,
    values: &Snapshot,
) -> Vec<OptionEntry> {
    let mapped: Vec<OptionEntry> = items
        .iter()
        .filter_map(|item| {
            if !item.is_object() {
                log::debug!("skipping non-object option item from {}", remote.endpoint);
                return None;
            }
            Some(map_item(item, &remote.mapping))
        })
        .collect();
    match &remote.transform {
        Some(t) => t(mapped, element, values),
        None => mapped,
    }
}

fn map_item(item: &Value, mapping: &ResponseMapping) -> OptionEntry {
    let value = mapping
        .value
        .as_deref()
        .and_then(|p| path_get(item, p))
        .or_else(|| path_get(item, "value"))
        .or_else(|| path_get(item, "id"))
        .cloned()
        .unwrap_or(Value::Null);

    let label = mapping
        .label
        .as_deref()
        .and_then(|p| path_get(item, p))
        .or_else(|| path_get(item, "label"))
        .or_else(|| path_get(item, "name"))
        .or_else(|| path_get(item, "title"))
        .map(display_string)
        .unwrap_or_else(|| display_string(&value));

    OptionEntry {
        value,
        label,
        icon: mapping
            .icon
            .as_deref()
            .and_then(|p| path_get(item, p))
            .and_then(Value::as_str)
            .map(str::to_string),
        description: mapping
            .description
            .as_deref()
            .and_then(|p| path_get(item, p))
            .and_then(Value::as_str)
            .map(str::to_string),
        disabled: mapping
            .disabled
            .as_deref()
            .and_then(|p| path_get(item, p))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        children: Vec::new(),
    }
}

/// Human-facing rendering of a JSON value: strings verbatim, null empty,
/// everything else in JSON form.
fn display_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
