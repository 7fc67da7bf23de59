//! The host loop: drives physics, tracker, and graph through one run.
//!
//! [`TraceRunner`] owns the three collaborators and wires the per-tick data
//! flow: the world steps and emits contact signals, the tracker classifies
//! them into discrete events, the events land in the causal graph. When the
//! run is over -- the step budget is spent or the scene is at rest -- the
//! runner ingests the terminal `End` event (triggering graph construction,
//! exactly once) and exports the [`TraceDocument`] consumed by the
//! downstream pipeline.
//!
//! Everything here is single-threaded and synchronous: signals are handled
//! inside the tick that produced them, and nothing re-enters the physics
//! world from a contact path.

use kinetrace_graph::event::{BodyKind, EventKind, ObjectId, ObjectRef};
use kinetrace_graph::export::GraphExport;
use kinetrace_graph::graph::CausalGraph;
use serde::{Deserialize, Serialize};

use crate::contact::ContactTracker;
use crate::physics::{BodySpec, ContactSignal, ShapeSpec, TraceWorld};
use crate::settings::RunSettings;
use crate::TraceError;

// ---------------------------------------------------------------------------
// TraceDocument
// ---------------------------------------------------------------------------

/// The run's output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    /// The exported causal graph.
    pub causal_graph: GraphExport,
}

impl TraceDocument {
    /// Pretty-printed JSON text of the document.
    pub fn to_json_string(&self) -> Result<String, TraceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// TraceRunner
// ---------------------------------------------------------------------------

/// Drives one simulation run from scene setup to the exported trace.
pub struct TraceRunner {
    world: TraceWorld,
    tracker: ContactTracker,
    graph: CausalGraph,
    settings: RunSettings,
    step: i64,
    finished: bool,
}

impl TraceRunner {
    /// Create a runner with a standard-gravity world.
    ///
    /// Seeds the graph with its `Start` event.
    pub fn new(settings: RunSettings) -> Result<Self, TraceError> {
        Self::with_world(settings, TraceWorld::default_gravity())
    }

    /// Create a runner over a custom world (e.g. different gravity).
    pub fn with_world(settings: RunSettings, world: TraceWorld) -> Result<Self, TraceError> {
        settings.validate()?;
        Ok(Self {
            world,
            tracker: ContactTracker::new(settings.tracker),
            graph: CausalGraph::with_start(),
            settings,
            step: 0,
            finished: false,
        })
    }

    /// Register a simulated object in the scene.
    ///
    /// Dynamic objects are additionally registered with the graph as
    /// requiring event history by termination; static ones are not, so an
    /// untouched boundary never blocks a run.
    pub fn add_object(
        &mut self,
        id: ObjectId,
        spec: &BodySpec,
        position: (f64, f64),
        velocity: (f64, f64),
    ) -> ObjectRef {
        self.world.add_object(id, spec, position, velocity);
        if spec.kind == BodyKind::Dynamic {
            self.graph.require_history(id);
        }
        ObjectRef {
            id,
            kind: spec.kind,
        }
    }

    /// Attach a container sensor region to an existing object, tagged with
    /// the configured container category.
    pub fn add_container_sensor(&mut self, owner: ObjectId, shape: &ShapeSpec, offset: (f64, f64)) {
        self.world
            .add_sensor(owner, self.settings.tracker.container_category, shape, offset);
    }

    /// Execute one simulation tick.
    ///
    /// Promotions are evaluated before the tick's new signals so a contact
    /// ending the very tick it crosses the threshold closes as touching,
    /// not as a collision.
    pub fn tick(&mut self) -> Result<(), TraceError> {
        if self.finished {
            return Err(TraceError::AlreadyFinished);
        }

        for pending in self.tracker.advance(self.step) {
            self.graph.add_event(pending.step, pending.kind)?;
        }

        for signal in self.world.step(self.settings.fixed_dt) {
            match signal {
                ContactSignal::Begin(notice) => {
                    if let Some(pending) = self.tracker.begin_contact(self.step, &notice) {
                        self.graph.add_event(pending.step, pending.kind)?;
                    }
                }
                ContactSignal::End(key) => {
                    if let Some(pending) = self.tracker.end_contact(self.step, key) {
                        self.graph.add_event(pending.step, pending.kind)?;
                    }
                }
            }
        }

        self.step += 1;
        Ok(())
    }

    /// Run until the step budget is spent (or the scene is at rest, when
    /// configured), then finish.
    pub fn run(&mut self) -> Result<TraceDocument, TraceError> {
        tracing::info!(
            step_count = self.settings.step_count,
            terminate_on_rest = self.settings.terminate_on_rest,
            "starting trace run"
        );
        while self.step < self.settings.step_count as i64 {
            self.tick()?;
            if self.settings.terminate_on_rest && self.world.at_rest() {
                tracing::info!(step = self.step, "scene at rest");
                break;
            }
        }
        self.finish()
    }

    /// Terminate the run: ingest the `End` event (running graph
    /// construction) and export the document.
    ///
    /// May be called once; a second call is an error, as is any tick
    /// afterwards.
    pub fn finish(&mut self) -> Result<TraceDocument, TraceError> {
        if self.finished {
            return Err(TraceError::AlreadyFinished);
        }
        tracing::info!(step = self.step, events = self.graph.len(), "terminating trace");
        self.graph.add_event(self.step, EventKind::End)?;
        self.finished = true;
        let causal_graph = self.graph.export()?;
        Ok(TraceDocument { causal_graph })
    }

    // -- accessors ----------------------------------------------------------

    /// The current tick counter.
    pub fn step(&self) -> i64 {
        self.step
    }

    /// `true` once [`finish`](Self::finish) succeeded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The causal graph (sealed after a successful finish).
    pub fn graph(&self) -> &CausalGraph {
        &self.graph
    }

    /// The physics world.
    pub fn world(&self) -> &TraceWorld {
        &self.world
    }

    /// The run settings.
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
