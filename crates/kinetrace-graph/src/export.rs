//! Graph export: node/edge materialization and the visualization string.
//!
//! [`CausalGraph::export`] walks the constructed graph into a portable
//! [`GraphExport`]: a node list in ascending step order, an edge list from a
//! depth-first traversal over outcome edges (each event visited exactly
//! once), and a Graphviz-flavored description string for quick inspection.
//! Export is a pure function of the constructed graph -- repeated calls
//! produce identical results, which [`GraphExport::digest`] makes cheap to
//! assert.

use serde::{Deserialize, Serialize};

use crate::event::{CausalEvent, EventId, EventType, ObjectId};
use crate::graph::CausalGraph;
use crate::GraphError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One exported event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// The event's stable id.
    pub id: EventId,
    /// The step at which the causal condition held.
    pub step: i64,
    /// The event type's wire string.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Participating object ids (empty for `Start`/`End`).
    pub objects: Vec<ObjectId>,
}

/// One exported adjacency entry: an event and its outcome edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source event id.
    pub from: EventId,
    /// Outcome event ids, ascending.
    pub to: Vec<EventId>,
}

/// The exported causal graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphExport {
    /// All events, ascending by `(step, id)`.
    pub nodes: Vec<NodeRecord>,
    /// Adjacency entries in depth-first visit order from `Start`.
    pub edges: Vec<EdgeRecord>,
    /// Graphviz-flavored directed-graph description.
    pub vis: String,
}

impl GraphExport {
    /// BLAKE3 hex digest of the canonical JSON serialization.
    ///
    /// Two exports of the same constructed graph always share a digest.
    pub fn digest(&self) -> String {
        // Field order is fixed by the struct, so the serialization is
        // canonical.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

impl CausalEvent {
    /// The event's exported record.
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id(),
            step: self.step(),
            event_type: self.event_type(),
            objects: self.participants().iter().map(|p| p.id).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

impl CausalGraph {
    /// Export the constructed graph.
    ///
    /// # Errors
    ///
    /// [`GraphError::NotConstructed`] if the `End` event has not been
    /// accepted yet.
    pub fn export(&self) -> Result<GraphExport, GraphError> {
        let start = match (self.start(), self.end()) {
            (Some(start), Some(_)) => start,
            _ => return Err(GraphError::NotConstructed),
        };

        let mut order: Vec<&CausalEvent> = self.events().collect();
        order.sort_by_key(|event| (event.step(), event.id()));

        let mut vis = String::from("digraph d {\n");
        let mut nodes = Vec::with_capacity(order.len());
        for event in &order {
            nodes.push(event.to_record());
            vis.push_str(&format!(
                "{} [shape=\"Box\" label=\"{}:{}\"]\n",
                event.id(),
                event.event_type(),
                event.step()
            ));
        }

        let mut edges = Vec::with_capacity(order.len());
        let mut visited = vec![false; self.len()];
        self.visit(start, &mut visited, &mut edges, &mut vis);
        vis.push_str("}\n");

        Ok(GraphExport { nodes, edges, vis })
    }

    /// Preorder depth-first walk over outcome edges. The visited set
    /// guarantees each event is emitted exactly once no matter how many
    /// causal paths reach it.
    fn visit(
        &self,
        id: EventId,
        visited: &mut [bool],
        edges: &mut Vec<EdgeRecord>,
        vis: &mut String,
    ) {
        visited[id.index()] = true;
        let Some(event) = self.event(id) else {
            return;
        };

        vis.push_str(&format!("{} -> {{ ", id));
        let mut to = Vec::with_capacity(event.outcomes().len());
        for &outcome in event.outcomes() {
            vis.push_str(&format!("{} ", outcome));
            to.push(outcome);
        }
        vis.push_str("}\n");
        edges.push(EdgeRecord { from: id, to });

        for &outcome in event.outcomes() {
            if !visited[outcome.index()] {
                self.visit(outcome, visited, edges, vis);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, ObjectRef, START_STEP};

    fn dynamic(id: u32) -> ObjectRef {
        ObjectRef::dynamic(ObjectId::new(id))
    }

    fn sample_graph() -> CausalGraph {
        let mut graph = CausalGraph::with_start();
        graph
            .add_event(3, EventKind::Collision([dynamic(1), dynamic(2)]))
            .unwrap();
        graph
            .add_event(8, EventKind::StartTouching([dynamic(2), dynamic(3)]))
            .unwrap();
        graph
            .add_event(25, EventKind::EndTouching([dynamic(2), dynamic(3)]))
            .unwrap();
        graph
            .add_event(40, EventKind::ContainerEndUp([ObjectRef::fixed(ObjectId::new(9)), dynamic(1)]))
            .unwrap();
        graph.add_event(60, EventKind::End).unwrap();
        graph
    }

    #[test]
    fn export_before_end_is_an_error() {
        let graph = CausalGraph::with_start();
        assert!(matches!(graph.export(), Err(GraphError::NotConstructed)));
    }

    #[test]
    fn node_count_matches_event_count() {
        let graph = sample_graph();
        let export = graph.export().unwrap();
        assert_eq!(export.nodes.len(), graph.len());
        // DFS emits one adjacency entry per event: reachability from Start.
        assert_eq!(export.edges.len(), graph.len());
    }

    #[test]
    fn nodes_are_sorted_by_step() {
        let export = sample_graph().export().unwrap();
        let steps: Vec<i64> = export.nodes.iter().map(|n| n.step).collect();
        let mut sorted = steps.clone();
        sorted.sort_unstable();
        assert_eq!(steps, sorted);
        assert_eq!(export.nodes[0].step, START_STEP);
        assert_eq!(export.nodes[0].event_type, EventType::Start);
    }

    #[test]
    fn dfs_starts_at_start_and_visits_each_once() {
        let graph = sample_graph();
        let export = graph.export().unwrap();
        assert_eq!(export.edges[0].from, graph.start().unwrap());
        let mut froms: Vec<EventId> = export.edges.iter().map(|e| e.from).collect();
        froms.sort_unstable();
        froms.dedup();
        assert_eq!(froms.len(), graph.len(), "each event emitted exactly once");
    }

    #[test]
    fn end_has_no_outgoing_edges() {
        let graph = sample_graph();
        let export = graph.export().unwrap();
        let end = graph.end().unwrap();
        let entry = export.edges.iter().find(|e| e.from == end).unwrap();
        assert!(entry.to.is_empty());
    }

    #[test]
    fn export_is_idempotent() {
        let graph = sample_graph();
        let first = graph.export().unwrap();
        let second = graph.export().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn json_shape_matches_the_wire_contract() {
        let export = sample_graph().export().unwrap();
        let value = serde_json::to_value(&export).unwrap();
        let node = &value["nodes"][1];
        assert!(node["id"].is_u64());
        assert_eq!(node["step"], 3);
        assert_eq!(node["type"], "Collision");
        assert_eq!(node["objects"], serde_json::json!([1, 2]));
        let edge = &value["edges"][0];
        assert!(edge["from"].is_u64());
        assert!(edge["to"].is_array());
        assert!(value["vis"].is_string());
    }

    #[test]
    fn vis_is_a_digraph_description() {
        let export = sample_graph().export().unwrap();
        assert!(export.vis.starts_with("digraph d {\n"));
        assert!(export.vis.ends_with("}\n"));
        assert!(export.vis.contains("[shape=\"Box\" label=\"Start:-1\"]"));
        assert!(export.vis.contains("[shape=\"Box\" label=\"Collision:3\"]"));
        assert!(export.vis.contains(" -> { "));
    }

    #[test]
    fn diamond_paths_do_not_duplicate_nodes() {
        // Two events caused by the same predecessor, both feeding End:
        // the merge node (End) is reachable over two paths but emitted once.
        let mut graph = CausalGraph::with_start();
        graph
            .add_event(5, EventKind::Collision([dynamic(1), dynamic(2)]))
            .unwrap();
        graph
            .add_event(10, EventKind::Collision([dynamic(1), dynamic(3)]))
            .unwrap();
        graph
            .add_event(12, EventKind::Collision([dynamic(2), dynamic(4)]))
            .unwrap();
        graph.add_event(50, EventKind::End).unwrap();

        let export = graph.export().unwrap();
        assert_eq!(export.nodes.len(), 5);
        assert_eq!(export.edges.len(), 5);
    }
}
