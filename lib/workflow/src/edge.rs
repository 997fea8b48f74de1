//! Edge types for workflow graphs.
//!
//! Edges connect nodes. An edge may carry a branch label, which
//! disambiguates multiple outgoing edges from a branching node (condition
//! branch labels, or the `success`/`error` outcomes of an adapter node).

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// An edge connecting two nodes in a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Branch label, if this edge is one of several alternatives.
    #[serde(default)]
    pub label: Option<String>,
}

impl Edge {
    /// Label of the edge taken when an HTTP call returns a 2xx status.
    pub const SUCCESS: &'static str = "success";
    /// Label of the edge taken when a node is configured to continue on
    /// adapter failure.
    pub const ERROR: &'static str = "error";

    /// Creates a labeled edge.
    #[must_use]
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }

    /// Creates an unlabeled (default) edge.
    #[must_use]
    pub fn unlabeled() -> Self {
        Self { label: None }
    }

    /// Returns true if this edge carries no branch label.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.label.is_none()
    }

    /// Returns true if this edge carries the given branch label.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.label.as_deref() == Some(label)
    }
}

impl Default for Edge {
    fn default() -> Self {
        Self::unlabeled()
    }
}

/// A complete edge reference including source and target node IDs.
///
/// This is the external representation used in serialized definitions and
/// by the publish API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    /// The source node ID.
    pub from_node: NodeId,
    /// The target node ID.
    pub to_node: NodeId,
    /// Branch label, if any.
    #[serde(default)]
    pub label: Option<String>,
}

impl EdgeRef {
    /// Creates a new unlabeled edge reference.
    #[must_use]
    pub fn new(from_node: NodeId, to_node: NodeId) -> Self {
        Self {
            from_node,
            to_node,
            label: None,
        }
    }

    /// Creates a new labeled edge reference.
    #[must_use]
    pub fn labeled(from_node: NodeId, to_node: NodeId, label: impl Into<String>) -> Self {
        Self {
            from_node,
            to_node,
            label: Some(label.into()),
        }
    }

    /// Splits this reference into its endpoints and edge payload.
    #[must_use]
    pub fn into_parts(self) -> (NodeId, NodeId, Edge) {
        (self.from_node, self.to_node, Edge { label: self.label })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlabeled_edge_is_default() {
        let edge = Edge::unlabeled();
        assert!(edge.is_default());
        assert!(!edge.has_label(Edge::SUCCESS));
    }

    #[test]
    fn labeled_edge() {
        let edge = Edge::labeled("qualified");
        assert!(!edge.is_default());
        assert!(edge.has_label("qualified"));
        assert!(!edge.has_label("nurture"));
    }

    #[test]
    fn edge_ref_into_parts() {
        let from = NodeId::new();
        let to = NodeId::new();
        let edge_ref = EdgeRef::labeled(from, to, Edge::ERROR);

        let (f, t, edge) = edge_ref.into_parts();
        assert_eq!(f, from);
        assert_eq!(t, to);
        assert!(edge.has_label(Edge::ERROR));
    }

    #[test]
    fn edge_serde_roundtrip() {
        let edge = Edge::labeled("success");
        let json = serde_json::to_string(&edge).expect("serialize");
        let parsed: Edge = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(edge, parsed);
    }

    #[test]
    fn edge_label_defaults_to_none_in_json() {
        let parsed: Edge = serde_json::from_str("{}").expect("deserialize");
        assert!(parsed.is_default());
    }
}
