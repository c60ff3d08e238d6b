//! The panel engine: one selected element, one live snapshot, one schema.
//!
//! `PanelEngine` is the host-facing orchestrator. The host wires the
//! diagramming toolkit's events into it:
//!
//! - **Selection** — `select` rebuilds the snapshot, invalidates every
//!   in-flight fetch, and reports which remote option fields to start
//!   loading.
//! - **Edits** — `set_value` writes through the binder (one undoable model
//!   call), runs the change cascade, and reports derived updates plus any
//!   dependent option fetches that must be re-issued.
//! - **Time** — `tick(now)` flushes due debounced listeners; the engine
//!   never owns a clock or an event loop.
//! - **Async results** — `apply_fetch` lands a completed options exchange,
//!   unless a newer request or a newer selection superseded it.
//!
//! Construction runs the schema lint and refuses configurations with
//! Error-severity findings, so everything past `new` can trust the schema.

use crate::cascade::CascadeDispatcher;
use crate::fetch::{FetchTicket, FetchTracker, OptionsState};
use crate::registry::RendererRegistry;
use fp_core::bind::{Binder, ModelPort};
use fp_core::key::PropKey;
use fp_core::lint::{LintSeverity, lint_schema};
use fp_core::model::{Element, Snapshot};
use fp_core::options::{build_request, map_response};
use fp_core::organize::{PanelView, organize};
use fp_core::schema::PanelSchema;
use serde_json::Value;
use std::time::Instant;

/// What a selection change asks of the host.
#[derive(Debug, Clone)]
pub struct SelectionUpdate {
    pub active_tab: Option<String>,
    /// Fetches to execute for the newly visible remote-option fields.
    pub fetches: Vec<FetchTicket>,
}

/// What one edit (or one flushed debounce run) did.
#[derive(Debug, Clone, Default)]
pub struct ChangeOutcome {
    /// Derived snapshot updates from listeners, in execution order.
    pub updates: Vec<(PropKey, Value)>,
    /// Configuration errors hit during the cascade.
    pub errors: Vec<String>,
    /// Fetches to execute because a dependency of a remote source changed.
    pub fetches: Vec<FetchTicket>,
    /// The active tab after revalidation against the fresh view.
    pub active_tab: Option<String>,
}

/// The stateful panel orchestrator.
pub struct PanelEngine {
    schema: PanelSchema,
    binder: Binder,
    registry: RendererRegistry,
    dispatcher: CascadeDispatcher,
    tracker: FetchTracker,
    element: Option<Element>,
    snapshot: Snapshot,
    active_tab: Option<String>,
}

impl PanelEngine {
    /// Lint-gated construction. Warnings and infos are logged; any
    /// Error-severity finding rejects the schema.
    pub fn new(
        schema: PanelSchema,
        binder: Binder,
        registry: RendererRegistry,
    ) -> Result<Self, String> {
        let mut errors = Vec::new();
        for diag in lint_schema(&schema, &registry.names()) {
            match diag.severity {
                LintSeverity::Error => errors.push(diag.message),
                LintSeverity::Warning => log::warn!("schema lint: {}", diag.message),
                LintSeverity::Info => log::info!("schema lint: {}", diag.message),
            }
        }
        if !errors.is_empty() {
            return Err(format!("schema rejected by lint: {}", errors.join(" ")));
        }

        let dispatcher = CascadeDispatcher::new(&schema);
        Ok(Self {
            schema,
            binder,
            registry,
            dispatcher,
            tracker: FetchTracker::new(),
            element: None,
            snapshot: Snapshot::new(),
            active_tab: None,
        })
    }

    // ─── Host events ─────────────────────────────────────────────────────

    /// A new element was selected. Rebuilds the snapshot, drops pending
    /// debounces, invalidates in-flight fetches, and starts loading every
    /// visible remote option field.
    pub fn select(&mut self, element: Element) -> SelectionUpdate {
        self.snapshot = self.binder.snapshot(&self.schema, &element);
        self.tracker.reset();
        self.dispatcher.clear_pending();

        let view = organize(&self.schema, &element, &self.snapshot);
        self.active_tab = view.active_tab.clone();
        let fetches = spawn_fetches(&mut self.tracker, &view, &element, &self.snapshot, None);
        drop(view);

        self.element = Some(element);
        SelectionUpdate {
            active_tab: self.active_tab.clone(),
            fetches,
        }
    }

    /// The user edited one field. Writes through the port (one undoable
    /// step), updates the snapshot, runs the cascade, re-issues dependent
    /// fetches, and revalidates the active tab.
    pub fn set_value(
        &mut self,
        key: PropKey,
        value: Value,
        port: &mut dyn ModelPort,
        now: Instant,
    ) -> Result<ChangeOutcome, String> {
        let element = self.element.as_mut().ok_or("no element selected")?;
        let def = self
            .schema
            .find_property(key)
            .ok_or_else(|| format!("unknown property `{key}`"))?;

        self.binder.write(element, def, &value, port)?;
        if def.read_only {
            return Ok(ChangeOutcome {
                active_tab: self.active_tab.clone(),
                ..ChangeOutcome::default()
            });
        }

        let cascade = self
            .dispatcher
            .on_change(element, &mut self.snapshot, key, &value, now);

        let mut changed: Vec<PropKey> = vec![key];
        changed.extend(cascade.updates.iter().map(|(k, _)| *k));

        let view = organize(&self.schema, element, &self.snapshot);
        retain_or_fallback(&mut self.active_tab, &view);
        let fetches = spawn_fetches(
            &mut self.tracker,
            &view,
            element,
            &self.snapshot,
            Some(&changed),
        );

        Ok(ChangeOutcome {
            updates: cascade.updates,
            errors: cascade.errors,
            fetches,
            active_tab: self.active_tab.clone(),
        })
    }

    /// Flush debounced listeners that have come due, one outcome per run.
    pub fn tick(&mut self, now: Instant) -> Vec<ChangeOutcome> {
        let Some(element) = self.element.as_mut() else {
            return Vec::new();
        };
        let runs = self.dispatcher.tick(element, &mut self.snapshot, now);
        if runs.is_empty() {
            return Vec::new();
        }

        let view = organize(&self.schema, element, &self.snapshot);
        retain_or_fallback(&mut self.active_tab, &view);
        runs.into_iter()
            .map(|run| {
                let changed: Vec<PropKey> = run.updates.iter().map(|(k, _)| *k).collect();
                let fetches = spawn_fetches(
                    &mut self.tracker,
                    &view,
                    element,
                    &self.snapshot,
                    Some(&changed),
                );
                ChangeOutcome {
                    updates: run.updates,
                    errors: run.errors,
                    fetches,
                    active_tab: self.active_tab.clone(),
                }
            })
            .collect()
    }

    /// Land a completed options exchange. Returns `false` when the result
    /// is stale (superseded request or a different selection).
    pub fn apply_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<Value>, String>,
    ) -> bool {
        if !self.tracker.is_current(ticket) {
            log::debug!("ignoring stale options result for {}", ticket.key);
            return false;
        }
        let Some(element) = self.element.as_ref() else {
            return false;
        };
        let outcome = match result {
            Ok(items) => {
                let Some(remote) = self
                    .schema
                    .find_property(ticket.key)
                    .and_then(|def| def.options.as_ref())
                    .and_then(|source| source.as_remote())
                else {
                    log::debug!("options result for {} has no remote source", ticket.key);
                    return false;
                };
                Ok(map_response(remote, &items, element, &self.snapshot))
            }
            Err(message) => Err(message),
        };
        self.tracker.apply(ticket, outcome)
    }

    /// The user switched tabs. Accepted only if the tab survives in the
    /// current view.
    pub fn set_active_tab(&mut self, id: &str) -> bool {
        let valid = match &self.element {
            Some(element) => organize(&self.schema, element, &self.snapshot)
                .find_tab(id)
                .is_some(),
            None => false,
        };
        if valid {
            self.active_tab = Some(id.to_string());
        }
        valid
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Organize the current selection on demand. Empty when nothing is
    /// selected.
    pub fn view(&self) -> PanelView<'_> {
        match &self.element {
            Some(element) => organize(&self.schema, element, &self.snapshot),
            None => PanelView {
                tabs: Vec::new(),
                active_tab: None,
            },
        }
    }

    /// Remote-option lifecycle for one field (Idle for non-remote fields).
    pub fn options_state(&self, key: PropKey) -> &OptionsState {
        self.tracker.state(key)
    }

    pub fn active_tab(&self) -> Option<&str> {
        self.active_tab.as_deref()
    }

    pub fn values(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn element(&self) -> Option<&Element> {
        self.element.as_ref()
    }

    pub fn schema(&self) -> &PanelSchema {
        &self.schema
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    /// When the earliest debounced listener comes due, for hosts that
    /// schedule wakeups instead of polling.
    pub fn next_due(&self) -> Option<Instant> {
        self.dispatcher.next_due()
    }
}

/// Keep the current active tab while it survives; fall back to the view's
/// initial pick otherwise.
fn retain_or_fallback(active: &mut Option<String>, view: &PanelView<'_>) {
    let keep = active
        .as_deref()
        .is_some_and(|id| view.find_tab(id).is_some());
    if !keep {
        *active = view.active_tab.clone();
    }
}

/// Issue tickets for the view's remote-option fields: all of them on
/// selection (`changed: None`), only dependency-hit ones on edits.
fn spawn_fetches(
    tracker: &mut FetchTracker,
    view: &PanelView<'_>,
    element: &Element,
    values: &Snapshot,
    changed: Option<&[PropKey]>,
) -> Vec<FetchTicket> {
    let mut tickets = Vec::new();
    for prop in view.flat_properties() {
        let Some(remote) = prop.def.options.as_ref().and_then(|s| s.as_remote()) else {
            continue;
        };
        let wanted = match changed {
            None => true,
            Some(keys) => keys.iter().any(|k| remote.dependencies.contains(k)),
        };
        if !wanted {
            continue;
        }
        let request = build_request(remote, element, values);
        tickets.push(tracker.begin(prop.def.key, request));
    }
    tickets
}
