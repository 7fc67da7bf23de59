//! Contact tracker: the per-tick state machine that classifies raw contact
//! begin/end signals into discrete causal events.
//!
//! Two independent rules run each tick:
//!
//! - **Sensor rule** (immediate, stateless): a begin-contact with exactly one
//!   sensor side whose category tag marks it as a container emits
//!   `ContainerEndUp` right away. No state is kept and no matching
//!   end-contact is expected. Other sensors are ignored here.
//! - **Solid-contact rule** (stateful, time-windowed): a begin-contact
//!   between two solid fixtures opens a pair entry. Entries still open after
//!   [`TrackerConfig::touch_threshold`] ticks are promoted to touching,
//!   emitting `StartTouching` stamped with the *original* begin step. On
//!   end-contact, a promoted pair emits `EndTouching` at the current step; an
//!   unpromoted pair emits `Collision` stamped with its begin step.
//!
//! The threshold turns "how long did the contact last" into a binary
//! classification without predicting the future; the price is a detection lag
//! of up to the threshold before a long contact's `StartTouching` becomes
//! observable.
//!
//! State machine per pair: none -> open -> { touching -> closed(EndTouching)
//! } | closed(Collision). Sensor contacts bypass the machine entirely.

use kinetrace_graph::event::{EventKind, ObjectRef};
use serde::{Deserialize, Serialize};

use crate::physics::{ContactKey, ContactNotice, FixtureInfo};

/// Default promotion threshold in ticks.
pub const DEFAULT_TOUCH_THRESHOLD: u32 = 20;

/// Default category bit-mask tagging container sensors.
pub const DEFAULT_CONTAINER_CATEGORY: u32 = 0x0042;

// ---------------------------------------------------------------------------
// TrackerConfig
// ---------------------------------------------------------------------------

/// Configuration for the contact tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Ticks a contact must stay open before it is reclassified from
    /// collision to touching.
    pub touch_threshold: u32,
    /// Category bit-mask identifying container sensors.
    pub container_category: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            touch_threshold: DEFAULT_TOUCH_THRESHOLD,
            container_category: DEFAULT_CONTAINER_CATEGORY,
        }
    }
}

// ---------------------------------------------------------------------------
// PendingEvent
// ---------------------------------------------------------------------------

/// A detected event, ready to be appended to the causal graph.
///
/// `step` is the step at which the causal condition held -- for promoted
/// touching and for collisions that is the contact's begin step, which can be
/// earlier than the tick of detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvent {
    /// Step the event is recorded at.
    pub step: i64,
    /// The event variant with its participants.
    pub kind: EventKind,
}

// ---------------------------------------------------------------------------
// ContactTracker
// ---------------------------------------------------------------------------

/// A tracked solid-contact pair.
#[derive(Debug, Clone, Copy)]
struct TrackedContact {
    key: ContactKey,
    start_step: i64,
    first: ObjectRef,
    second: ObjectRef,
}

/// Per-tick state machine over contact pairs.
#[derive(Debug, Clone)]
pub struct ContactTracker {
    config: TrackerConfig,
    /// Begun but not yet classified.
    open: Vec<TrackedContact>,
    /// Promoted past the threshold; closed by end-contact.
    touching: Vec<TrackedContact>,
}

impl ContactTracker {
    /// Create a tracker with the given configuration.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            open: Vec::new(),
            touching: Vec::new(),
        }
    }

    /// The tracker's configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Handle a begin-contact signal at `step`.
    ///
    /// Applies the sensor rule first: a container-sensor contact immediately
    /// yields `ContainerEndUp` with the sensor's owning object in slot 0.
    /// Non-container sensors are ignored. Solid contacts open a pair entry
    /// and yield nothing yet.
    pub fn begin_contact(&mut self, step: i64, notice: &ContactNotice) -> Option<PendingEvent> {
        let (sensor, other): (Option<&FixtureInfo>, &FixtureInfo) = if notice.a.sensor {
            (Some(&notice.a), &notice.b)
        } else if notice.b.sensor {
            (Some(&notice.b), &notice.a)
        } else {
            (None, &notice.b)
        };

        match sensor {
            Some(sensor) if sensor.category == self.config.container_category => {
                tracing::debug!(step, container = %sensor.owner.id, object = %other.owner.id,
                    "container end-up detected");
                Some(PendingEvent {
                    step,
                    kind: EventKind::ContainerEndUp([sensor.owner, other.owner]),
                })
            }
            Some(_) => None, // other sensors are bookkeeping outside this scope
            None => {
                self.open.push(TrackedContact {
                    key: notice.key,
                    start_step: step,
                    first: notice.a.owner,
                    second: notice.b.owner,
                });
                None
            }
        }
    }

    /// Promote every open pair that has outlived the threshold at `step`.
    ///
    /// Each promotion emits `StartTouching` stamped with the pair's begin
    /// step. Call once per tick, before handling that tick's signals, so a
    /// contact ending the tick it crosses the threshold still counts as
    /// touching.
    pub fn advance(&mut self, step: i64) -> Vec<PendingEvent> {
        let threshold = i64::from(self.config.touch_threshold);
        let mut emitted = Vec::new();
        let mut i = 0;
        while i < self.open.len() {
            if step - self.open[i].start_step > threshold {
                let entry = self.open.remove(i);
                tracing::debug!(step = entry.start_step,
                    first = %entry.first.id, second = %entry.second.id,
                    "contact promoted to touching");
                emitted.push(PendingEvent {
                    step: entry.start_step,
                    kind: EventKind::StartTouching([entry.first, entry.second]),
                });
                self.touching.push(entry);
            } else {
                i += 1;
            }
        }
        emitted
    }

    /// Handle an end-contact signal at `step`.
    ///
    /// A promoted pair closes as `EndTouching` at the current step; an
    /// unpromoted pair closes as `Collision` stamped with its begin step. An
    /// end-contact for a pair with no tracked entry is tolerated as a no-op.
    pub fn end_contact(&mut self, step: i64, key: ContactKey) -> Option<PendingEvent> {
        if let Some(pos) = self.touching.iter().position(|c| c.key == key) {
            let entry = self.touching.remove(pos);
            return Some(PendingEvent {
                step,
                kind: EventKind::EndTouching([entry.first, entry.second]),
            });
        }
        if let Some(pos) = self.open.iter().position(|c| c.key == key) {
            let entry = self.open.remove(pos);
            return Some(PendingEvent {
                step: entry.start_step,
                kind: EventKind::Collision([entry.first, entry.second]),
            });
        }
        tracing::warn!(?key, step, "end-contact for untracked pair ignored");
        None
    }

    /// Number of open (unclassified) pairs.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Number of promoted (touching) pairs.
    pub fn touching_count(&self) -> usize {
        self.touching.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::FixtureId;
    use kinetrace_graph::event::{EventType, ObjectId, ObjectRef};

    fn solid(fixture: u64, object: u32) -> FixtureInfo {
        FixtureInfo {
            fixture: FixtureId::new(fixture),
            sensor: false,
            category: crate::physics::SOLID_CATEGORY,
            owner: ObjectRef::dynamic(ObjectId::new(object)),
        }
    }

    fn sensor(fixture: u64, object: u32, category: u32) -> FixtureInfo {
        FixtureInfo {
            fixture: FixtureId::new(fixture),
            sensor: true,
            category,
            owner: ObjectRef::fixed(ObjectId::new(object)),
        }
    }

    fn notice(a: FixtureInfo, b: FixtureInfo) -> ContactNotice {
        ContactNotice {
            key: ContactKey::new(a.fixture, b.fixture),
            a,
            b,
        }
    }

    /// Drive the tracker the way the runner does: promotions first, then the
    /// tick's signals.
    fn run_pair(begin: i64, end: i64, threshold: u32) -> Vec<PendingEvent> {
        let mut tracker = ContactTracker::new(TrackerConfig {
            touch_threshold: threshold,
            ..Default::default()
        });
        let a = solid(1, 10);
        let b = solid(2, 11);
        let key = ContactKey::new(a.fixture, b.fixture);
        let mut events = Vec::new();
        for step in 0..=end {
            events.extend(tracker.advance(step));
            if step == begin {
                assert!(tracker.begin_contact(step, &notice(a, b)).is_none());
            }
            if step == end {
                events.extend(tracker.end_contact(step, key));
            }
        }
        events
    }

    // -- solid-contact rule --------------------------------------------------

    #[test]
    fn short_contact_is_a_collision_at_its_begin_step() {
        let events = run_pair(0, 10, 20);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, 0);
        assert_eq!(events[0].kind.event_type(), EventType::Collision);
    }

    #[test]
    fn long_contact_is_touching_with_original_start_step() {
        let events = run_pair(0, 25, 20);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind.event_type(), EventType::StartTouching);
        assert_eq!(events[0].step, 0, "promotion keeps the begin step");
        assert_eq!(events[1].kind.event_type(), EventType::EndTouching);
        assert_eq!(events[1].step, 25);
    }

    #[test]
    fn duration_exactly_at_threshold_is_still_a_collision() {
        let events = run_pair(5, 25, 20);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.event_type(), EventType::Collision);
        assert_eq!(events[0].step, 5);
    }

    #[test]
    fn duration_one_past_threshold_is_touching() {
        let events = run_pair(5, 26, 20);
        assert_eq!(events[0].kind.event_type(), EventType::StartTouching);
        assert_eq!(events[1].kind.event_type(), EventType::EndTouching);
    }

    #[test]
    fn same_tick_begin_and_end_is_a_collision() {
        let events = run_pair(7, 7, 20);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.event_type(), EventType::Collision);
        assert_eq!(events[0].step, 7);
    }

    #[test]
    fn contact_never_ending_stays_touching() {
        let mut tracker = ContactTracker::new(TrackerConfig::default());
        let a = solid(1, 10);
        let b = solid(2, 11);
        tracker.begin_contact(0, &notice(a, b));
        let mut emitted = Vec::new();
        for step in 1..60 {
            emitted.extend(tracker.advance(step));
        }
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].kind.event_type(), EventType::StartTouching);
        assert_eq!(tracker.open_count(), 0);
        assert_eq!(tracker.touching_count(), 1);
    }

    #[test]
    fn independent_pairs_are_tracked_separately() {
        let mut tracker = ContactTracker::new(TrackerConfig::default());
        let a = solid(1, 10);
        let b = solid(2, 11);
        let c = solid(3, 12);
        tracker.begin_contact(0, &notice(a, b));
        tracker.begin_contact(4, &notice(a, c));
        assert_eq!(tracker.open_count(), 2);

        // Close (a, c) quickly: collision at its own begin step.
        let event = tracker
            .end_contact(6, ContactKey::new(a.fixture, c.fixture))
            .unwrap();
        assert_eq!(event.step, 4);
        assert_eq!(event.kind.event_type(), EventType::Collision);
        assert_eq!(tracker.open_count(), 1);
    }

    #[test]
    fn end_contact_for_untracked_pair_is_a_noop() {
        let mut tracker = ContactTracker::new(TrackerConfig::default());
        let key = ContactKey::new(FixtureId::new(8), FixtureId::new(9));
        assert!(tracker.end_contact(10, key).is_none());
    }

    // -- sensor rule ---------------------------------------------------------

    #[test]
    fn container_sensor_emits_immediately() {
        let mut tracker = ContactTracker::new(TrackerConfig::default());
        let basket = sensor(1, 5, DEFAULT_CONTAINER_CATEGORY);
        let ball = solid(2, 9);
        let event = tracker.begin_contact(33, &notice(basket, ball)).unwrap();
        assert_eq!(event.step, 33);
        match event.kind {
            EventKind::ContainerEndUp([container, object]) => {
                assert_eq!(container.id, ObjectId::new(5));
                assert_eq!(object.id, ObjectId::new(9));
            }
            other => panic!("expected ContainerEndUp, got {other:?}"),
        }
        // Stateless: nothing tracked, no end-contact needed.
        assert_eq!(tracker.open_count(), 0);
        assert_eq!(tracker.touching_count(), 0);
    }

    #[test]
    fn container_sensor_ignores_the_threshold() {
        let mut tracker = ContactTracker::new(TrackerConfig {
            touch_threshold: 0,
            ..Default::default()
        });
        let basket = sensor(1, 5, DEFAULT_CONTAINER_CATEGORY);
        let ball = solid(2, 9);
        assert!(tracker.begin_contact(0, &notice(ball, basket)).is_some());
    }

    #[test]
    fn sensor_slot_order_is_container_first_regardless_of_notice_order() {
        let mut tracker = ContactTracker::new(TrackerConfig::default());
        let basket = sensor(1, 5, DEFAULT_CONTAINER_CATEGORY);
        let ball = solid(2, 9);
        let event = tracker.begin_contact(3, &notice(ball, basket)).unwrap();
        match event.kind {
            EventKind::ContainerEndUp([container, object]) => {
                assert_eq!(container.id, ObjectId::new(5));
                assert_eq!(object.id, ObjectId::new(9));
            }
            other => panic!("expected ContainerEndUp, got {other:?}"),
        }
    }

    #[test]
    fn non_container_sensors_are_ignored() {
        let mut tracker = ContactTracker::new(TrackerConfig::default());
        let probe = sensor(1, 5, 0x0080);
        let ball = solid(2, 9);
        assert!(tracker.begin_contact(3, &notice(probe, ball)).is_none());
        assert_eq!(tracker.open_count(), 0, "sensor contacts open no pair entry");
    }

    #[test]
    fn configured_category_overrides_the_default() {
        let mut tracker = ContactTracker::new(TrackerConfig {
            container_category: 0x0100,
            ..Default::default()
        });
        let basket = sensor(1, 5, 0x0100);
        let ball = solid(2, 9);
        assert!(tracker.begin_contact(3, &notice(basket, ball)).is_some());

        let default_basket = sensor(3, 6, DEFAULT_CONTAINER_CATEGORY);
        assert!(tracker.begin_contact(3, &notice(default_basket, ball)).is_none());
    }

    // -- config --------------------------------------------------------------

    #[test]
    fn config_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.touch_threshold, 20);
        assert_eq!(config.container_category, 0x0042);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = TrackerConfig {
            touch_threshold: 7,
            container_category: 0x0100,
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: TrackerConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn config_fills_missing_fields_from_defaults() {
        let config: TrackerConfig = serde_json::from_str("{\"touch_threshold\": 9}").unwrap();
        assert_eq!(config.touch_threshold, 9);
        assert_eq!(config.container_category, DEFAULT_CONTAINER_CATEGORY);
    }
}
