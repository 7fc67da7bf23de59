//! rapier2d host world producing contact notifications.
//!
//! [`TraceWorld`] manages a rapier2d simulation keyed by the trace's
//! [`ObjectId`]s. Each fixed-dt [`TraceWorld::step`]:
//!
//! 1. rapier steps the simulation.
//! 2. Collision started/stopped events are collected and translated into
//!    [`ContactSignal`]s carrying the fixture metadata the contact tracker
//!    needs (sensor flag, category bit-mask, owning object).
//!
//! # Determinism
//!
//! rapier2d is compiled with `enhanced-determinism`. Combined with the fixed
//! timestep and the per-tick sorting of emitted signals, identical scenes
//! produce identical signal sequences (and therefore identical traces) on
//! the same platform.

use std::collections::HashMap;
use std::fmt;

use kinetrace_graph::event::{BodyKind, ObjectId, ObjectRef};
use rapier2d::prelude::*;

/// Category bit-mask assigned to solid (non-sensor) fixtures.
pub const SOLID_CATEGORY: u32 = 0x0001;

// ---------------------------------------------------------------------------
// Fixture metadata
// ---------------------------------------------------------------------------

/// Opaque identity of a single fixture (collider), issued by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixtureId(u64);

impl FixtureId {
    /// Construct a `FixtureId` from its raw value.
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fix{}", self.0)
    }
}

/// Opaque identity of a contact pair: the two fixtures in contact, order
/// normalized so begin and end signals for the same pair compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactKey(FixtureId, FixtureId);

impl ContactKey {
    /// Build a key for an unordered fixture pair.
    pub fn new(a: FixtureId, b: FixtureId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Metadata of one side of a contact, as exposed to the contact tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureInfo {
    /// The fixture's identity.
    pub fixture: FixtureId,
    /// Whether the fixture is a sensor (detects overlap, no physical
    /// response).
    pub sensor: bool,
    /// Category bit-mask ([`SOLID_CATEGORY`] for solid fixtures; sensors
    /// carry whatever category they were attached with).
    pub category: u32,
    /// The owning object.
    pub owner: ObjectRef,
}

/// A begin-contact notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactNotice {
    /// The pair identity, also carried by the matching end signal.
    pub key: ContactKey,
    /// One side of the contact.
    pub a: FixtureInfo,
    /// The other side.
    pub b: FixtureInfo,
}

/// A contact signal produced by one physics step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactSignal {
    /// Two fixtures started overlapping.
    Begin(ContactNotice),
    /// A previously begun solid contact ended. Sensor overlaps produce no
    /// end signal: the tracker never holds state for them.
    End(ContactKey),
}

// ---------------------------------------------------------------------------
// Body descriptors
// ---------------------------------------------------------------------------

/// Collider shape for a simulated object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeSpec {
    /// Circle with radius.
    Circle {
        /// Radius of the circle.
        radius: f64,
    },
    /// Axis-aligned box with half-extents.
    Box {
        /// Half-width along the x-axis.
        half_width: f64,
        /// Half-height along the y-axis.
        half_height: f64,
    },
}

/// Physical description of a simulated object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySpec {
    /// Movability (dynamic bodies are simulated; static ones never move).
    pub kind: BodyKind,
    /// The solid collider shape.
    pub shape: ShapeSpec,
    /// Coefficient of restitution.
    pub restitution: f64,
    /// Friction coefficient.
    pub friction: f64,
    /// Collider density.
    pub density: f64,
}

impl BodySpec {
    /// A dynamic body with default material parameters.
    pub fn dynamic(shape: ShapeSpec) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            shape,
            restitution: 0.2,
            friction: 0.5,
            density: 1.0,
        }
    }

    /// A static body with default material parameters.
    pub fn fixed(shape: ShapeSpec) -> Self {
        Self {
            kind: BodyKind::Static,
            shape,
            restitution: 0.2,
            friction: 0.5,
            density: 1.0,
        }
    }

    /// Override the restitution coefficient.
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }
}

// ---------------------------------------------------------------------------
// TraceWorld
// ---------------------------------------------------------------------------

/// Manages rapier2d simulation state and emits contact signals.
///
/// Bodies are registered under the trace's stable [`ObjectId`]s; colliders
/// are mapped back to fixture metadata for contact lookup.
pub struct TraceWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    /// Maps ObjectId (raw u32) -> rapier RigidBodyHandle.
    object_bodies: HashMap<u32, RigidBodyHandle>,
    /// Maps ObjectId (raw u32) -> the object's reference (id + kind).
    objects: HashMap<u32, ObjectRef>,
    /// Maps rapier ColliderHandle -> fixture metadata for contact lookup.
    fixtures: HashMap<ColliderHandle, FixtureInfo>,
    next_fixture: u64,
}

impl TraceWorld {
    /// Create a world with the given gravity vector.
    pub fn new(gravity_x: f64, gravity_y: f64) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![gravity_x as Real, gravity_y as Real],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            object_bodies: HashMap::new(),
            objects: HashMap::new(),
            fixtures: HashMap::new(),
            next_fixture: 0,
        }
    }

    /// Create a world with standard downward gravity.
    pub fn default_gravity() -> Self {
        Self::new(0.0, -10.0)
    }

    fn issue_fixture(&mut self) -> FixtureId {
        let id = FixtureId::new(self.next_fixture);
        self.next_fixture += 1;
        id
    }

    /// Register a simulated object.
    ///
    /// Creates a rapier body and a solid collider from the spec. If the id is
    /// already registered, this is a no-op.
    pub fn add_object(
        &mut self,
        id: ObjectId,
        spec: &BodySpec,
        position: (f64, f64),
        velocity: (f64, f64),
    ) {
        let raw = id.to_raw();
        if self.object_bodies.contains_key(&raw) {
            return;
        }

        let rb = match spec.kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic()
                .translation(vector![position.0 as Real, position.1 as Real])
                .linvel(vector![velocity.0 as Real, velocity.1 as Real])
                .build(),
            BodyKind::Static => RigidBodyBuilder::fixed()
                .translation(vector![position.0 as Real, position.1 as Real])
                .build(),
        };
        let body_handle = self.rigid_body_set.insert(rb);
        let owner = ObjectRef {
            id,
            kind: spec.kind,
        };
        self.object_bodies.insert(raw, body_handle);
        self.objects.insert(raw, owner);

        let collider = ColliderBuilder::new(shared_shape(&spec.shape))
            .restitution(spec.restitution as Real)
            .friction(spec.friction as Real)
            .density(spec.density as Real)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let collider_handle =
            self.collider_set
                .insert_with_parent(collider, body_handle, &mut self.rigid_body_set);
        let fixture = self.issue_fixture();
        self.fixtures.insert(
            collider_handle,
            FixtureInfo {
                fixture,
                sensor: false,
                category: SOLID_CATEGORY,
                owner,
            },
        );
    }

    /// Attach a sensor fixture to an already registered object.
    ///
    /// The sensor detects overlap without physical response and carries the
    /// given category bit-mask; its contact notifications report the owning
    /// object. Used for container regions. Unknown owners are ignored with a
    /// warning.
    pub fn add_sensor(
        &mut self,
        owner: ObjectId,
        category: u32,
        shape: &ShapeSpec,
        offset: (f64, f64),
    ) {
        let raw = owner.to_raw();
        let (body_handle, owner_ref) = match (self.object_bodies.get(&raw), self.objects.get(&raw))
        {
            (Some(&handle), Some(&owner_ref)) => (handle, owner_ref),
            _ => {
                tracing::warn!(%owner, "sensor attach ignored: unknown owner object");
                return;
            }
        };

        let collider = ColliderBuilder::new(shared_shape(shape))
            .translation(vector![offset.0 as Real, offset.1 as Real])
            .sensor(true)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let collider_handle =
            self.collider_set
                .insert_with_parent(collider, body_handle, &mut self.rigid_body_set);
        let fixture = self.issue_fixture();
        self.fixtures.insert(
            collider_handle,
            FixtureInfo {
                fixture,
                sensor: true,
                category,
                owner: owner_ref,
            },
        );
    }

    /// Step the simulation by `dt` and return the tick's contact signals.
    ///
    /// Uses crossbeam channels internally to collect rapier events. Begin
    /// signals are emitted before end signals and each group is sorted by
    /// pair key: rapier's channel delivery order may vary across runs, and
    /// sorting keeps signal sequences identical given the same simulation
    /// state.
    pub fn step(&mut self, dt: f64) -> Vec<ContactSignal> {
        self.integration_params.dt = dt as Real;

        let (collision_send, collision_recv) =
            rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) =
            rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None, // query pipeline (unused)
            &(),  // physics hooks
            &event_handler,
        );

        let mut begins = Vec::new();
        let mut ends = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            match event {
                CollisionEvent::Started(h1, h2, _flags) => {
                    if let (Some(&a), Some(&b)) = (self.fixtures.get(&h1), self.fixtures.get(&h2))
                    {
                        begins.push(ContactNotice {
                            key: ContactKey::new(a.fixture, b.fixture),
                            a,
                            b,
                        });
                    }
                }
                CollisionEvent::Stopped(h1, h2, _flags) => {
                    if let (Some(&a), Some(&b)) = (self.fixtures.get(&h1), self.fixtures.get(&h2))
                    {
                        // Sensor overlaps are one-shot for the tracker; their
                        // end is not a signal.
                        if !a.sensor && !b.sensor {
                            ends.push(ContactKey::new(a.fixture, b.fixture));
                        }
                    }
                }
            }
        }
        begins.sort_by_key(|notice| notice.key);
        ends.sort_unstable();

        let mut signals: Vec<ContactSignal> =
            begins.into_iter().map(ContactSignal::Begin).collect();
        signals.extend(ends.into_iter().map(ContactSignal::End));
        signals
    }

    /// `true` if every dynamic body is asleep (or there are none).
    pub fn at_rest(&self) -> bool {
        self.rigid_body_set
            .iter()
            .all(|(_, rb)| !rb.is_dynamic() || rb.is_sleeping())
    }

    /// Current translation of a registered object's body.
    pub fn translation(&self, id: ObjectId) -> Option<(f64, f64)> {
        let handle = self.object_bodies.get(&id.to_raw())?;
        let rb = self.rigid_body_set.get(*handle)?;
        let t = rb.translation();
        Some((t.x as f64, t.y as f64))
    }

    /// Whether an object is registered.
    pub fn has_object(&self, id: ObjectId) -> bool {
        self.object_bodies.contains_key(&id.to_raw())
    }

    /// Number of registered bodies.
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

fn shared_shape(shape: &ShapeSpec) -> SharedShape {
    match shape {
        ShapeSpec::Circle { radius } => SharedShape::ball(*radius as Real),
        ShapeSpec::Box {
            half_width,
            half_height,
        } => SharedShape::cuboid(*half_width as Real, *half_height as Real),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
