//! Custom renderer registry.
//!
//! Hosts register widget implementations under stable names before the
//! engine is constructed; schemas reference them via `PropertyDef::renderer`.
//! Every reference is checked by the schema lint at load, so lookup at
//! render time is infallible for a schema the engine accepted.

use fp_core::model::Element;
use fp_core::schema::PropertyDef;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// What a custom renderer sees for one field.
pub struct RenderCtx<'a> {
    pub def: &'a PropertyDef,
    pub value: Option<&'a Value>,
    pub element: &'a Element,
}

/// A host-supplied widget implementation.
pub trait CustomRenderer: Send + Sync {
    /// Stable name schemas reference.
    fn name(&self) -> &str;

    /// Produce the host-facing render payload for one field.
    fn render(&self, ctx: &RenderCtx<'_>) -> Value;
}

/// Name → renderer table. Populated by the host, then handed to the engine.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: HashMap<String, Arc<dyn CustomRenderer>>,
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.renderers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("RendererRegistry").field("renderers", &names).finish()
    }
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a renderer. Re-registering a name replaces the previous
    /// implementation (logged).
    pub fn register(&mut self, renderer: impl CustomRenderer + 'static) {
        let name = renderer.name().to_string();
        if self.renderers.insert(name.clone(), Arc::new(renderer)).is_some() {
            log::warn!("renderer `{name}` registered twice; replacing the earlier one");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn CustomRenderer>> {
        self.renderers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.renderers.contains_key(name)
    }

    /// The registered names, in the shape the schema lint consumes.
    pub fn names(&self) -> HashSet<String> {
        self.renderers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Badge(&'static str);

    impl CustomRenderer for Badge {
        fn name(&self) -> &str {
            "badge"
        }
        fn render(&self, ctx: &RenderCtx<'_>) -> Value {
            json!({ "widget": "badge", "variant": self.0, "key": ctx.def.key.as_str() })
        }
    }

    #[test]
    fn registered_renderer_is_resolvable() {
        let mut registry = RendererRegistry::new();
        registry.register(Badge("outline"));

        assert!(registry.contains("badge"));
        assert!(!registry.contains("sparkline"));
        assert_eq!(registry.names(), ["badge".to_string()].into());

        let def = PropertyDef::new("state", fp_core::schema::ValueKind::String);
        let element = Element::new("Task_1", "bpmn:Task");
        let ctx = RenderCtx {
            def: &def,
            value: None,
            element: &element,
        };
        let payload = registry.get("badge").unwrap().render(&ctx);
        assert_eq!(payload["variant"], json!("outline"));
        assert_eq!(payload["key"], json!("state"));
    }

    #[test]
    fn re_registration_replaces() {
        let mut registry = RendererRegistry::new();
        registry.register(Badge("outline"));
        registry.register(Badge("filled"));

        let def = PropertyDef::new("state", fp_core::schema::ValueKind::String);
        let element = Element::new("Task_1", "bpmn:Task");
        let ctx = RenderCtx {
            def: &def,
            value: None,
            element: &element,
        };
        let payload = registry.get("badge").unwrap().render(&ctx);
        assert_eq!(payload["variant"], json!("filled"));
        assert_eq!(registry.names().len(), 1);
    }
}
