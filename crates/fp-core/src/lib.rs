pub mod bind;
pub mod condition;
pub mod key;
pub mod lint;
pub mod model;
pub mod options;
pub mod organize;
pub mod schema;
pub mod validate;

pub use bind::{Binder, FieldStrategy, MemoryPort, ModelPort, ValueFactory};
pub use condition::{Condition, FieldContext, Operator, evaluate};
pub use key::PropKey;
pub use lint::{LintDiagnostic, LintSeverity, has_errors, lint_schema};
pub use model::{Element, Snapshot, path_get, path_set};
pub use options::{
    HttpMethod, OptionEntry, OptionsRequest, OptionsSource, RemoteOptions, ResponseMapping,
    build_request, map_response, resolve_sync,
};
pub use organize::{GroupView, PanelView, PropView, TabView, organize};
pub use schema::{
    ChangeListener, DEFAULT_DEBOUNCE_MS, InputKind, ListenerCtx, PanelSchema, PropertyDef,
    PropertyGroup, PropertyTab, Trigger, ValueKind, Visibility,
};
pub use validate::{ValidationCtx, ValidationIssue, ValidationRule, validate_value};
