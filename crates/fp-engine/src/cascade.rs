//! Change propagation.
//!
//! When a field value changes, every listener watching it reacts: immediate
//! listeners run synchronously in schema declaration order, debounced ones
//! are queued and coalesced so a burst of edits produces one execution with
//! the last value. The dispatcher has no clock of its own — the host drives
//! time through `tick(now)`, which keeps every test deterministic.
//!
//! Listener updates land on the snapshot and re-enter dispatch, capped at
//! `MAX_CASCADE_DEPTH` levels. A listener writing a field it watches is a
//! configuration mistake: the value is applied but not re-dispatched, and
//! the outcome reports it.

use fp_core::key::PropKey;
use fp_core::model::{Element, Snapshot};
use fp_core::schema::{ChangeListener, ListenerCtx, PanelSchema, Trigger};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cascade levels after which propagation stops with an error.
pub const MAX_CASCADE_DEPTH: usize = 8;

/// What one dispatch (or one debounce flush) did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeOutcome {
    /// Snapshot updates produced by listeners, in execution order. The
    /// triggering edit itself is not repeated here.
    pub updates: Vec<(PropKey, Value)>,
    /// Configuration errors hit during dispatch (depth cap, self-retrigger).
    pub errors: Vec<String>,
}

impl CascadeOutcome {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.errors.is_empty()
    }
}

struct OwnedListener {
    owner: PropKey,
    listener: ChangeListener,
}

struct Pending {
    listener: usize,
    /// Watched key whose change fired this entry; last one wins.
    key: PropKey,
    value: Value,
    due: Instant,
}

/// Dispatches change listeners for one schema.
pub struct CascadeDispatcher {
    listeners: Vec<OwnedListener>,
    /// Watched key → listener indices, in declaration order.
    watch_index: HashMap<PropKey, SmallVec<[usize; 4]>>,
    pending: Vec<Pending>,
}

impl CascadeDispatcher {
    pub fn new(schema: &PanelSchema) -> Self {
        let listeners: Vec<OwnedListener> = schema
            .listeners()
            .into_iter()
            .map(|(owner, listener)| OwnedListener {
                owner,
                listener: listener.clone(),
            })
            .collect();
        let mut watch_index: HashMap<PropKey, SmallVec<[usize; 4]>> = HashMap::new();
        for (idx, entry) in listeners.iter().enumerate() {
            for key in &entry.listener.watch {
                watch_index.entry(*key).or_default().push(idx);
            }
        }
        Self {
            listeners,
            watch_index,
            pending: Vec::new(),
        }
    }

    /// Record an edit and run its cascade. Updates the snapshot at `key`
    /// first, then dispatches watchers.
    pub fn on_change(
        &mut self,
        element: &Element,
        snapshot: &mut Snapshot,
        key: PropKey,
        value: &Value,
        now: Instant,
    ) -> CascadeOutcome {
        snapshot.set(key, value.clone());
        let mut outcome = CascadeOutcome::default();
        self.dispatch(element, snapshot, key, value, now, 0, &mut outcome);
        outcome
    }

    /// Flush debounced work that has come due. One outcome per flushed
    /// listener execution, in scheduling order.
    pub fn tick(
        &mut self,
        element: &Element,
        snapshot: &mut Snapshot,
        now: Instant,
    ) -> Vec<CascadeOutcome> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].due <= now {
                due.push(self.pending.remove(i));
            } else {
                i += 1;
            }
        }

        due.into_iter()
            .map(|run| {
                let mut outcome = CascadeOutcome::default();
                self.execute(
                    run.listener,
                    element,
                    snapshot,
                    run.key,
                    &run.value,
                    now,
                    0,
                    &mut outcome,
                );
                outcome
            })
            .collect()
    }

    /// Whether any debounced work is queued.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// When the earliest queued work comes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }

    /// Drop queued work. Called on selection change; a debounce scheduled
    /// against one element must not fire against the next.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &mut self,
        element: &Element,
        snapshot: &mut Snapshot,
        key: PropKey,
        value: &Value,
        now: Instant,
        depth: usize,
        outcome: &mut CascadeOutcome,
    ) {
        if depth >= MAX_CASCADE_DEPTH {
            let message = format!(
                "change cascade exceeded {MAX_CASCADE_DEPTH} levels at `{key}`; propagation stopped"
            );
            log::warn!("{message}");
            outcome.errors.push(message);
            return;
        }
        let Some(indices) = self.watch_index.get(&key).cloned() else {
            return;
        };
        for idx in indices {
            match self.listeners[idx].listener.trigger {
                Trigger::Immediate => {
                    self.execute(idx, element, snapshot, key, value, now, depth, outcome);
                }
                Trigger::Debounced { delay_ms } => {
                    self.schedule(idx, key, value.clone(), now + Duration::from_millis(delay_ms));
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        idx: usize,
        element: &Element,
        snapshot: &mut Snapshot,
        key: PropKey,
        value: &Value,
        now: Instant,
        depth: usize,
        outcome: &mut CascadeOutcome,
    ) {
        let (name, owner, handler, watch) = {
            let entry = &self.listeners[idx];
            (
                entry.listener.name.clone(),
                entry.owner,
                entry.listener.handler.clone(),
                entry.listener.watch.clone(),
            )
        };
        let ctx = ListenerCtx {
            element,
            values: snapshot,
            changed: key,
            value,
        };
        let updates = handler(&ctx);
        for (target, new_value) in updates {
            snapshot.set(target, new_value.clone());
            outcome.updates.push((target, new_value.clone()));
            if watch.contains(&target) {
                let message = format!(
                    "listener `{name}` on `{owner}` wrote its own watched field `{target}`; value applied, cascade cut"
                );
                log::warn!("{message}");
                outcome.errors.push(message);
                continue;
            }
            self.dispatch(element, snapshot, target, &new_value, now, depth + 1, outcome);
        }
    }

    /// Coalesce: a trigger within the window replaces the queued value and
    /// restarts the window.
    fn schedule(&mut self, idx: usize, key: PropKey, value: Value, due: Instant) {
        if let Some(pending) = self.pending.iter_mut().find(|p| p.listener == idx) {
            pending.key = key;
            pending.value = value;
            pending.due = due;
        } else {
            self.pending.push(Pending {
                listener: idx,
                key,
                value,
                due,
            });
        }
    }
}
