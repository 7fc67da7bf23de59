//! Kinetrace Graph -- causal event graphs for rigid-body simulation traces.
//!
//! This crate is the deterministic core of Kinetrace: a closed set of typed
//! causal events ([`event::EventKind`]), an append-only graph with a
//! per-object history index ([`graph::CausalGraph`]), a construction pass
//! that assigns cause edges when the terminal `End` event arrives, and a
//! portable export ([`export::GraphExport`]).
//!
//! It is pure bookkeeping: no physics types, no I/O, no async. The host
//! simulation detects events (see the `kinetrace-engine` crate) and feeds
//! them in; this crate turns them into a DAG rooted at `Start` and
//! converging at `End`.
//!
//! # Quick Start
//!
//! ```
//! use kinetrace_graph::prelude::*;
//!
//! let mut graph = CausalGraph::with_start();
//!
//! let a = ObjectRef::dynamic(ObjectId::new(1));
//! let b = ObjectRef::dynamic(ObjectId::new(2));
//! graph.add_event(12, EventKind::Collision([a, b])).unwrap();
//! graph.add_event(100, EventKind::End).unwrap();
//!
//! let export = graph.export().unwrap();
//! assert_eq!(export.nodes.len(), 3); // Start, Collision, End
//! ```

#![deny(unsafe_code)]

pub mod event;
pub mod export;
pub mod graph;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by graph operations.
///
/// All of these are contract violations local to a single mutation or to the
/// one-shot construction pass; none are transient, so none are retried.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// An event was appended after the terminal `End` event was accepted.
    #[error("graph already terminated: cannot add {attempted} event after End")]
    InvalidSequence {
        attempted: event::EventType,
    },

    /// A second `Start` event was appended.
    #[error("graph already has a Start event")]
    DuplicateStart,

    /// The `End` event arrived before any `Start` event.
    #[error("cannot terminate: graph has no Start event")]
    MissingStart,

    /// An object registered via
    /// [`require_history`](graph::CausalGraph::require_history) had no
    /// recorded events when `End` arrived.
    #[error("object {object} has no recorded events at termination")]
    MissingHistory {
        object: event::ObjectId,
    },

    /// Export was requested before the `End` event sealed the graph.
    #[error("graph has not been terminated: export requires the End event")]
    NotConstructed,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::event::{
        BodyKind, CausalEvent, EventId, EventKind, EventType, ObjectId, ObjectRef, START_STEP,
    };
    pub use crate::export::{EdgeRecord, GraphExport, NodeRecord};
    pub use crate::graph::CausalGraph;
    pub use crate::GraphError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
