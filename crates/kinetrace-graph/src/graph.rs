//! The causal graph: append-only event store, per-object history index, and
//! the construction pass that assigns cause edges.
//!
//! A [`CausalGraph`] collects events over the lifetime of one simulation run.
//! The host appends events via [`CausalGraph::add_event`] as they are
//! detected; appending the terminal `End` event seals the graph and runs
//! construction exactly once. Afterwards the graph is read-only and can be
//! exported (see [`export`](crate::export)).
//!
//! # Construction
//!
//! Events are processed in ascending `(step, id)` order, skipping `Start`
//! (the implicit root, which receives no causes):
//!
//! - `End` gets one cause per tracked object: that object's chronologically
//!   last recorded event.
//! - Every other event gets, for each non-static participant, the latest
//!   event on that participant's history with a step *strictly* earlier than
//!   its own. If no participant yields a predecessor, `Start` becomes the
//!   sole cause.
//!
//! The result is a DAG with `Start` as the unique source: every non-`Start`
//! event has at least one cause, and cause steps are strictly smaller than
//! effect steps (except for `End`, which may share the terminal step with a
//! cause but never has outcomes of its own).
//!
//! # History ordering
//!
//! Per-object histories are kept ordered by the events' `step` field, not by
//! insertion order: a promoted `StartTouching` is detected up to the
//! promotion threshold *after* the step it is recorded at, so later-inserted
//! events can carry earlier steps. All predecessor lookups compare stored
//! steps, never list positions.

use std::collections::{BTreeMap, BTreeSet};

use crate::event::{CausalEvent, EventId, EventKind, EventType, ObjectId, START_STEP};
use crate::GraphError;

// ---------------------------------------------------------------------------
// CausalGraph
// ---------------------------------------------------------------------------

/// The causal graph of one simulation run.
///
/// Lifecycle: created empty, seeded with a `Start` event by the host, grown
/// through [`add_event`](Self::add_event), sealed by the `End` event (which
/// triggers construction), then exported.
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    /// Event arena, in insertion order. [`EventId`]s are indices into this.
    events: Vec<CausalEvent>,
    /// Per-object event history, ordered by event step (stable for ties).
    histories: BTreeMap<ObjectId, Vec<EventId>>,
    /// Objects that must have a non-empty history by the time `End` arrives.
    required: BTreeSet<ObjectId>,
    start: Option<EventId>,
    end: Option<EventId>,
}

impl CausalGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    ///
    /// Updates the per-object history of every participant, records `Start`
    /// as the unique root, and -- when `kind` is [`EventKind::End`] -- seals
    /// the graph and runs the construction pass.
    ///
    /// # Errors
    ///
    /// - [`GraphError::InvalidSequence`] if the graph is already sealed.
    /// - [`GraphError::DuplicateStart`] on a second `Start`.
    /// - [`GraphError::MissingStart`] if `End` arrives before any `Start`.
    /// - [`GraphError::MissingHistory`] if a required object has no recorded
    ///   events when `End` arrives. Validation happens before any mutation,
    ///   so a failed `End` leaves the graph unsealed.
    pub fn add_event(&mut self, step: i64, kind: EventKind) -> Result<EventId, GraphError> {
        let event_type = kind.event_type();
        if self.end.is_some() {
            return Err(GraphError::InvalidSequence {
                attempted: event_type,
            });
        }
        if event_type == EventType::Start && self.start.is_some() {
            return Err(GraphError::DuplicateStart);
        }
        let start = if event_type == EventType::End {
            let start = self.start.ok_or(GraphError::MissingStart)?;
            self.validate_required()?;
            Some(start)
        } else {
            None
        };

        let id = EventId::new(self.events.len() as u32);
        for participant in kind.participants() {
            let events = &self.events;
            let history = self.histories.entry(participant.id).or_default();
            // Stable step-ordered insert: equal steps keep insertion order.
            let pos = history.partition_point(|&prior| events[prior.index()].step() <= step);
            history.insert(pos, id);
        }
        self.events.push(CausalEvent::new(id, step, kind));
        tracing::debug!(%event_type, step, id = %id, "event appended");

        match event_type {
            EventType::Start => self.start = Some(id),
            EventType::End => {
                self.end = Some(id);
                self.construct(start.unwrap_or(id), id);
            }
            _ => {}
        }
        Ok(id)
    }

    /// Declare that `object` must have participated in at least one event by
    /// the time the `End` event arrives.
    ///
    /// A typical host registers every dynamic body and no static ones, so an
    /// untouched boundary never blocks termination while a dynamic object
    /// with no events is a loud contract violation. Idempotent; has no
    /// effect once the graph is sealed.
    pub fn require_history(&mut self, object: ObjectId) {
        self.required.insert(object);
    }

    fn validate_required(&self) -> Result<(), GraphError> {
        for &object in &self.required {
            if self.histories.get(&object).map_or(true, |h| h.is_empty()) {
                return Err(GraphError::MissingHistory { object });
            }
        }
        Ok(())
    }

    // -- construction -------------------------------------------------------

    /// Assign causes to every non-`Start` event. Runs exactly once, from
    /// `add_event` when `End` is accepted.
    fn construct(&mut self, start: EventId, end: EventId) {
        let mut order: Vec<EventId> = self.events.iter().map(CausalEvent::id).collect();
        order.sort_by_key(|&id| (self.events[id.index()].step(), id));

        for id in order {
            if id == start {
                continue;
            }
            if id == end {
                // One cause per object: its chronologically last event. An
                // empty run (no object ever produced an event) falls back to
                // Start so End is never causeless.
                let last: Vec<EventId> = self
                    .histories
                    .values()
                    .filter_map(|history| history.last().copied())
                    .collect();
                if last.is_empty() {
                    self.link(start, end);
                }
                for cause in last {
                    self.link(cause, end);
                }
                continue;
            }

            let (step, participants) = {
                let event = &self.events[id.index()];
                (event.step(), event.participants().to_vec())
            };
            let mut predecessors = Vec::new();
            for participant in participants {
                if participant.kind.is_static() {
                    continue;
                }
                if let Some(prior) = self.latest_before(participant.id, step) {
                    predecessors.push(prior);
                }
            }
            if predecessors.is_empty() {
                // First recorded event for all participants.
                self.link(start, id);
            } else {
                for cause in predecessors {
                    self.link(cause, id);
                }
            }
        }
        tracing::debug!(events = self.events.len(), "causal graph constructed");
    }

    /// The latest event on `object`'s history with a step strictly earlier
    /// than `step`. Equal-step ties resolve to the earlier-inserted event
    /// because the history insert is stable.
    fn latest_before(&self, object: ObjectId, step: i64) -> Option<EventId> {
        let history = self.histories.get(&object)?;
        let events = &self.events;
        let idx = history.partition_point(|&prior| events[prior.index()].step() < step);
        idx.checked_sub(1).map(|i| history[i])
    }

    /// Insert a cause edge and its mirror outcome edge. Set semantics:
    /// duplicates are no-ops.
    pub(crate) fn link(&mut self, cause: EventId, effect: EventId) {
        self.events[effect.index()].record_cause(cause);
        self.events[cause.index()].record_outcome(effect);
    }

    // -- accessors ----------------------------------------------------------

    /// Number of events in the graph.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` if no events have been appended.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Look up an event by id.
    pub fn event(&self, id: EventId) -> Option<&CausalEvent> {
        self.events.get(id.index())
    }

    /// All events, in insertion order.
    pub fn events(&self) -> impl Iterator<Item = &CausalEvent> {
        self.events.iter()
    }

    /// The `Start` event's id, once appended.
    pub fn start(&self) -> Option<EventId> {
        self.start
    }

    /// The `End` event's id, once accepted.
    pub fn end(&self) -> Option<EventId> {
        self.end
    }

    /// `true` once the `End` event has been accepted and construction ran.
    pub fn is_terminated(&self) -> bool {
        self.end.is_some()
    }

    /// The step-ordered event history of `object` (empty if the object never
    /// participated in an event).
    pub fn history(&self, object: ObjectId) -> &[EventId] {
        self.histories
            .get(&object)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Seed a fresh graph with its `Start` event.
    ///
    /// Convenience for the common host pattern of adding `Start` at step
    /// [`START_STEP`] before the run begins.
    pub fn with_start() -> Self {
        let mut graph = Self::new();
        // Cannot fail on an empty graph.
        let _ = graph.add_event(START_STEP, EventKind::Start);
        graph
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
