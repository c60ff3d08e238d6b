//! Remote option fetch lifecycle.
//!
//! The engine never performs I/O. It hands out `FetchTicket`s (the built
//! request tagged with a per-field generation and the selection epoch); the
//! host runs the exchange — `execute` is the shipped reqwest transport —
//! and feeds the outcome back. The tracker applies a result only when its
//! ticket is still current: newer requests for the same field win, and
//! anything from a previous selection is discarded outright.

use fp_core::key::PropKey;
use fp_core::options::{HttpMethod, OptionEntry, OptionsRequest};
use serde_json::Value;
use std::collections::HashMap;

/// Per-field lifecycle of a remote option source.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsState {
    /// Nothing requested yet (also reported for non-remote fields).
    Idle,
    /// A request is in flight.
    Loading { generation: u64 },
    /// The latest request completed; entries are mapped and transformed.
    Ready(Vec<OptionEntry>),
    /// The latest request failed; the list renders empty with this message.
    Failed(String),
}

static IDLE: OptionsState = OptionsState::Idle;

/// A request the host must execute and report back on.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub key: PropKey,
    pub request: OptionsRequest,
    pub(crate) generation: u64,
    pub(crate) epoch: u64,
}

/// Tracks issued generations per field plus the selection epoch.
#[derive(Debug, Default)]
pub struct FetchTracker {
    states: HashMap<PropKey, OptionsState>,
    issued: HashMap<PropKey, u64>,
    epoch: u64,
}

impl FetchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new selection. Everything still in flight becomes stale.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.states.clear();
        self.issued.clear();
    }

    /// Issue a ticket for `key`, superseding any earlier one.
    pub fn begin(&mut self, key: PropKey, request: OptionsRequest) -> FetchTicket {
        let generation = self.issued.entry(key).and_modify(|g| *g += 1).or_insert(1);
        self.states
            .insert(key, OptionsState::Loading { generation: *generation });
        FetchTicket {
            key,
            request,
            generation: *generation,
            epoch: self.epoch,
        }
    }

    pub fn state(&self, key: PropKey) -> &OptionsState {
        self.states.get(&key).unwrap_or(&IDLE)
    }

    /// Whether a result for this ticket would still be applied.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.epoch == self.epoch && self.issued.get(&ticket.key) == Some(&ticket.generation)
    }

    /// Apply a completed exchange. Returns `false` (leaving state untouched)
    /// when the ticket is stale.
    pub fn apply(
        &mut self,
        ticket: &FetchTicket,
        outcome: Result<Vec<OptionEntry>, String>,
    ) -> bool {
        if !self.is_current(ticket) {
            log::debug!(
                "dropping stale options result for {} (generation {})",
                ticket.key,
                ticket.generation
            );
            return false;
        }
        let state = match outcome {
            Ok(entries) => OptionsState::Ready(entries),
            Err(message) => {
                log::warn!("options fetch for {} failed: {message}", ticket.key);
                OptionsState::Failed(message)
            }
        };
        self.states.insert(ticket.key, state);
        true
    }
}

// ─── Transport ───────────────────────────────────────────────────────────

/// Execute one options request and return the raw response items. Any
/// transport with the same request → JSON-array contract can stand in.
pub async fn execute(client: &reqwest::Client, request: &OptionsRequest) -> Result<Vec<Value>, String> {
    let mut builder = match request.method {
        HttpMethod::Get => client.get(&request.endpoint).query(&request.query),
        HttpMethod::Post => {
            let builder = client.post(&request.endpoint);
            match &request.body {
                Some(body) => builder.json(body),
                None => builder,
            }
        }
    };
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder
        .send()
        .await
        .map_err(|e| format!("options request to {} failed: {e}", request.endpoint))?;
    if !response.status().is_success() {
        return Err(format!(
            "options request to {} returned {}",
            request.endpoint,
            response.status()
        ));
    }
    let body: Value = response
        .json()
        .await
        .map_err(|e| format!("options response from {} is not JSON: {e}", request.endpoint))?;
    match body {
        Value::Array(items) => Ok(items),
        other => Err(format!(
            "options response from {} is not an array (got {})",
            request.endpoint,
            kind_of(&other)
        )),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
