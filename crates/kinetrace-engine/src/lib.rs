//! Kinetrace Engine -- host integration turning a rigid-body simulation into
//! causal traces.
//!
//! This crate wires the deterministic graph core ([`kinetrace_graph`]) to a
//! rapier2d world: [`physics::TraceWorld`] produces contact begin/end signals
//! with fixture metadata, [`contact::ContactTracker`] classifies them into
//! discrete causal events (collision vs. touching, container end-up), and
//! [`runner::TraceRunner`] drives the per-tick loop and exports the final
//! document.
//!
//! # Quick Start
//!
//! ```
//! use kinetrace_engine::prelude::*;
//!
//! let settings = RunSettings { step_count: 120, ..Default::default() };
//! let mut runner = TraceRunner::new(settings).unwrap();
//!
//! // Floor and a ball dropped onto it.
//! runner.add_object(
//!     ObjectId::new(0),
//!     &BodySpec::fixed(ShapeSpec::Box { half_width: 10.0, half_height: 0.5 }),
//!     (0.0, 0.0),
//!     (0.0, 0.0),
//! );
//! runner.add_object(
//!     ObjectId::new(1),
//!     &BodySpec::dynamic(ShapeSpec::Circle { radius: 0.5 }),
//!     (0.0, 2.0),
//!     (0.0, 0.0),
//! );
//!
//! let document = runner.run().unwrap();
//! assert!(document.causal_graph.nodes.len() >= 3); // Start, contact(s), End
//! ```

#![deny(unsafe_code)]

pub mod contact;
pub mod physics;
pub mod runner;
pub mod settings;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the graph crate for convenience.
pub use kinetrace_graph;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// A graph contract violation surfaced through the runner.
    #[error(transparent)]
    Graph(#[from] kinetrace_graph::GraphError),

    /// Run settings failed validation.
    #[error("invalid run settings: {reason}")]
    InvalidSettings {
        reason: String,
    },

    /// The runner was ticked or finished after a successful finish.
    #[error("trace already finished")]
    AlreadyFinished,

    /// Run settings JSON could not be parsed.
    #[error("failed to parse run settings: {0}")]
    SettingsParse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the graph prelude.
    pub use kinetrace_graph::prelude::*;

    // Engine-specific exports.
    pub use crate::contact::{
        ContactTracker, PendingEvent, TrackerConfig, DEFAULT_CONTAINER_CATEGORY,
        DEFAULT_TOUCH_THRESHOLD,
    };
    pub use crate::physics::{
        BodySpec, ContactKey, ContactNotice, ContactSignal, FixtureId, FixtureInfo, ShapeSpec,
        TraceWorld, SOLID_CATEGORY,
    };
    pub use crate::runner::{TraceDocument, TraceRunner};
    pub use crate::settings::RunSettings;
    pub use crate::TraceError;
}
