//! Causal event model: object identities and the closed set of event variants.
//!
//! A trace is made of [`CausalEvent`]s -- discrete, typed records of something
//! happening to zero or two tracked objects at a given simulation step. The
//! variant set is closed ([`EventKind`]): the synthetic `Start` and `End`
//! bracket every run and carry no participants; the four concrete variants
//! (`Collision`, `StartTouching`, `EndTouching`, `ContainerEndUp`) carry
//! exactly two.
//!
//! Events live in an arena owned by the
//! [`CausalGraph`](crate::graph::CausalGraph) and reference each other through
//! [`EventId`]s, so `causes`/`outcomes` are plain id-sets and the whole graph
//! serializes without any pointer chasing or ownership cycles.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Step value assigned to the synthetic `Start` event. Sorts before every
/// real simulation tick (real ticks are `>= 0`).
pub const START_STEP: i64 = -1;

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// A stable small-integer identity for a simulated object.
///
/// Issued by the host simulation, used as map key in the graph's per-object
/// history index and emitted verbatim in exported records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Construct an `ObjectId` from its raw integer value.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw integer value, as emitted in exported records.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BodyKind / ObjectRef
// ---------------------------------------------------------------------------

/// Movability classification of a simulated object.
///
/// Static objects (boundaries, platforms, containers) never receive cause
/// edges on behalf of their own motion: the construction pass skips them when
/// looking up predecessor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Fully simulated by the physics solver.
    Dynamic,
    /// Immovable.
    Static,
}

impl BodyKind {
    /// `true` for [`BodyKind::Static`].
    #[inline]
    pub fn is_static(self) -> bool {
        matches!(self, BodyKind::Static)
    }
}

/// An object as referenced by an event: identity plus movability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// The object's stable identity.
    pub id: ObjectId,
    /// Whether the object is movable.
    pub kind: BodyKind,
}

impl ObjectRef {
    /// Reference to a dynamic (movable) object.
    #[inline]
    pub fn dynamic(id: ObjectId) -> Self {
        Self {
            id,
            kind: BodyKind::Dynamic,
        }
    }

    /// Reference to a static (immovable) object.
    #[inline]
    pub fn fixed(id: ObjectId) -> Self {
        Self {
            id,
            kind: BodyKind::Static,
        }
    }
}

// ---------------------------------------------------------------------------
// EventId
// ---------------------------------------------------------------------------

/// A stable per-event identity issued by the graph at insertion time.
///
/// Ids are sequential arena indices, not addresses; the same event sequence
/// always yields the same ids. Serializes as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u32);

impl EventId {
    #[inline]
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw integer value, as emitted in exported records.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// The closed set of event type discriminants.
///
/// Serializes to the exact strings consumed by the downstream pipeline
/// (`"Start"`, `"End"`, `"Collision"`, `"StartTouching"`, `"EndTouching"`,
/// `"ContainerEndUp"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Start,
    End,
    Collision,
    StartTouching,
    EndTouching,
    ContainerEndUp,
}

impl EventType {
    /// The type's wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Start => "Start",
            EventType::End => "End",
            EventType::Collision => "Collision",
            EventType::StartTouching => "StartTouching",
            EventType::EndTouching => "EndTouching",
            EventType::ContainerEndUp => "ContainerEndUp",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Event variant with its per-type payload.
///
/// `Start` and `End` are synthetic brackets with no participants. The four
/// concrete variants carry exactly two participants; `ContainerEndUp`'s first
/// slot is the container's owning object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Synthetic root of every trace.
    Start,
    /// Synthetic terminal event; ingesting it seals the graph.
    End,
    /// A short-lived contact, recorded at the step it began.
    Collision([ObjectRef; 2]),
    /// A contact that outlived the promotion threshold, recorded at the step
    /// it began (detection lags by up to the threshold).
    StartTouching([ObjectRef; 2]),
    /// A promoted contact ending, recorded at the step it ended.
    EndTouching([ObjectRef; 2]),
    /// An object entered a container sensor region; slot 0 is the container's
    /// owning object.
    ContainerEndUp([ObjectRef; 2]),
}

impl EventKind {
    /// The variant's type discriminant.
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Start => EventType::Start,
            EventKind::End => EventType::End,
            EventKind::Collision(_) => EventType::Collision,
            EventKind::StartTouching(_) => EventType::StartTouching,
            EventKind::EndTouching(_) => EventType::EndTouching,
            EventKind::ContainerEndUp(_) => EventType::ContainerEndUp,
        }
    }

    /// The participating objects: empty for `Start`/`End`, exactly two
    /// otherwise.
    pub fn participants(&self) -> &[ObjectRef] {
        match self {
            EventKind::Start | EventKind::End => &[],
            EventKind::Collision(pair)
            | EventKind::StartTouching(pair)
            | EventKind::EndTouching(pair)
            | EventKind::ContainerEndUp(pair) => pair,
        }
    }
}

// ---------------------------------------------------------------------------
// CausalEvent
// ---------------------------------------------------------------------------

/// An event record in the graph arena.
///
/// Immutable after creation except for the `causes`/`outcomes` id-sets, which
/// are assigned once during graph construction. The sets are ordered so
/// traversal and export are deterministic, and they are mirror-maintained:
/// inserting a cause edge always inserts the reverse outcome edge.
#[derive(Debug, Clone)]
pub struct CausalEvent {
    id: EventId,
    step: i64,
    kind: EventKind,
    causes: BTreeSet<EventId>,
    outcomes: BTreeSet<EventId>,
}

impl CausalEvent {
    pub(crate) fn new(id: EventId, step: i64, kind: EventKind) -> Self {
        Self {
            id,
            step,
            kind,
            causes: BTreeSet::new(),
            outcomes: BTreeSet::new(),
        }
    }

    /// The event's arena id.
    #[inline]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The step at which the causal condition held (not necessarily the step
    /// of detection).
    #[inline]
    pub fn step(&self) -> i64 {
        self.step
    }

    /// The variant with its payload.
    #[inline]
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The variant's type discriminant.
    #[inline]
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// The participating objects (0 or 2).
    #[inline]
    pub fn participants(&self) -> &[ObjectRef] {
        self.kind.participants()
    }

    /// Events this event causally depends on. Empty before construction;
    /// non-empty for every non-`Start` event afterwards.
    #[inline]
    pub fn causes(&self) -> &BTreeSet<EventId> {
        &self.causes
    }

    /// Events that list this event as a cause.
    #[inline]
    pub fn outcomes(&self) -> &BTreeSet<EventId> {
        &self.outcomes
    }

    /// Insert into `causes`. Duplicate inserts are no-ops (set semantics).
    pub(crate) fn record_cause(&mut self, cause: EventId) {
        self.causes.insert(cause);
    }

    /// Insert into `outcomes`. Duplicate inserts are no-ops (set semantics).
    pub(crate) fn record_outcome(&mut self, outcome: EventId) {
        self.outcomes.insert(outcome);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_end_have_no_participants() {
        assert!(EventKind::Start.participants().is_empty());
        assert!(EventKind::End.participants().is_empty());
    }

    #[test]
    fn concrete_variants_have_two_participants() {
        let a = ObjectRef::dynamic(ObjectId::new(1));
        let b = ObjectRef::fixed(ObjectId::new(2));
        for kind in [
            EventKind::Collision([a, b]),
            EventKind::StartTouching([a, b]),
            EventKind::EndTouching([a, b]),
            EventKind::ContainerEndUp([b, a]),
        ] {
            assert_eq!(kind.participants().len(), 2);
        }
    }

    #[test]
    fn event_type_mapping() {
        let a = ObjectRef::dynamic(ObjectId::new(1));
        let b = ObjectRef::dynamic(ObjectId::new(2));
        assert_eq!(EventKind::Start.event_type(), EventType::Start);
        assert_eq!(EventKind::End.event_type(), EventType::End);
        assert_eq!(
            EventKind::Collision([a, b]).event_type(),
            EventType::Collision
        );
        assert_eq!(
            EventKind::ContainerEndUp([a, b]).event_type(),
            EventType::ContainerEndUp
        );
    }

    #[test]
    fn event_type_serializes_to_wire_strings() {
        for (ty, expected) in [
            (EventType::Start, "\"Start\""),
            (EventType::End, "\"End\""),
            (EventType::Collision, "\"Collision\""),
            (EventType::StartTouching, "\"StartTouching\""),
            (EventType::EndTouching, "\"EndTouching\""),
            (EventType::ContainerEndUp, "\"ContainerEndUp\""),
        ] {
            assert_eq!(serde_json::to_string(&ty).unwrap(), expected);
        }
    }

    #[test]
    fn ids_serialize_as_bare_integers() {
        assert_eq!(serde_json::to_string(&ObjectId::new(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&EventId::new(3)).unwrap(), "3");
    }

    #[test]
    fn object_ref_constructors() {
        let d = ObjectRef::dynamic(ObjectId::new(4));
        assert_eq!(d.kind, BodyKind::Dynamic);
        assert!(!d.kind.is_static());
        let s = ObjectRef::fixed(ObjectId::new(5));
        assert_eq!(s.kind, BodyKind::Static);
        assert!(s.kind.is_static());
    }

    #[test]
    fn start_step_sorts_before_real_ticks() {
        assert!(START_STEP < 0);
    }

    #[test]
    fn cause_and_outcome_sets_deduplicate() {
        let mut event = CausalEvent::new(EventId::new(1), 10, EventKind::End);
        event.record_cause(EventId::new(0));
        event.record_cause(EventId::new(0));
        assert_eq!(event.causes().len(), 1);
        event.record_outcome(EventId::new(2));
        event.record_outcome(EventId::new(2));
        assert_eq!(event.outcomes().len(), 1);
    }

    #[test]
    fn display_impls() {
        assert_eq!(ObjectId::new(3).to_string(), "obj3");
        assert_eq!(EventId::new(9).to_string(), "9");
        assert_eq!(EventType::StartTouching.to_string(), "StartTouching");
    }
}
