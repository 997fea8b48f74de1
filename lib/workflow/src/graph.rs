//! Workflow graph implementation using petgraph.
//!
//! Workflows are directed graphs where nodes are typed steps and edges
//! optionally carry branch labels. The graph is stored as JSONB in the
//! database, serialized as `{nodes, edges}` with explicit node IDs on each
//! edge reference.
//!
//! Cycles are permitted (retry/loop shapes); termination is guaranteed by
//! the engine's step ceiling rather than by a DAG restriction.

use crate::edge::{Edge, EdgeRef};
use crate::error::GraphError;
use crate::node::{Node, NodeConfig, NodeId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef as _;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// A workflow graph using petgraph's directed graph.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowGraph {
    /// The underlying directed graph.
    #[serde(with = "graph_serde")]
    graph: DiGraph<Node, Edge>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    #[serde(skip)]
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl<'de> Deserialize<'de> for WorkflowGraph {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            #[serde(with = "graph_serde")]
            graph: DiGraph<Node, Edge>,
        }

        let helper = Helper::deserialize(deserializer)?;
        let mut graph = Self {
            graph: helper.graph,
            node_index_map: HashMap::new(),
        };
        graph.rebuild_index_map();
        Ok(graph)
    }
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Builds a graph from node and edge lists.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate node IDs or edges referencing unknown
    /// nodes.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<EdgeRef>) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node)?;
        }
        for edge_ref in edges {
            let (from, to, edge) = edge_ref.into_parts();
            graph.add_edge(from, to, edge)?;
        }
        Ok(graph)
    }

    /// Adds a node to the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if a node with the same ID already exists.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let node_id = node.id;
        if self.node_index_map.contains_key(&node_id) {
            return Err(GraphError::DuplicateNodeId { node_id });
        }
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        Ok(node_id)
    }

    /// Adds an edge between two nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if either endpoint does not exist.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, edge: Edge) -> Result<(), GraphError> {
        let from_index = *self
            .node_index_map
            .get(&from)
            .ok_or(GraphError::UnknownEndpoint { node_id: from })?;
        let to_index = *self
            .node_index_map
            .get(&to)
            .ok_or(GraphError::UnknownEndpoint { node_id: to })?;

        self.graph.add_edge(from_index, to_index, edge);
        Ok(())
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns all nodes in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns nodes that have no incoming edges.
    pub fn entry_nodes(&self) -> Vec<&Node> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .count()
                    == 0
            })
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    /// Returns the single entry node.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph has zero or multiple entry nodes.
    pub fn entry_node(&self) -> Result<&Node, GraphError> {
        let entries = self.entry_nodes();
        match entries.len() {
            0 => Err(GraphError::NoEntryNode),
            1 => Ok(entries[0]),
            count => Err(GraphError::MultipleEntryNodes { count }),
        }
    }

    /// Returns the successors of a node with the edges leading to them.
    pub fn successors(&self, node_id: NodeId) -> Vec<(&Node, &Edge)> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(index, Direction::Outgoing)
            .filter_map(|edge| {
                let target = self.graph.node_weight(edge.target())?;
                Some((target, edge.weight()))
            })
            .collect()
    }

    /// Returns the number of outgoing edges of a node.
    #[must_use]
    pub fn out_degree(&self, node_id: NodeId) -> usize {
        self.successors(node_id).len()
    }

    /// Returns the target of the outgoing edge carrying the given branch
    /// label, if any.
    #[must_use]
    pub fn successor_by_label(&self, node_id: NodeId, label: &str) -> Option<&Node> {
        self.successors(node_id)
            .into_iter()
            .find(|(_, edge)| edge.has_label(label))
            .map(|(node, _)| node)
    }

    /// Returns the default successor of a node.
    ///
    /// The unique unlabeled outgoing edge wins; with no unlabeled edge and
    /// exactly one outgoing edge, that edge wins. Anything else is
    /// ambiguous and returns `None`.
    #[must_use]
    pub fn default_successor(&self, node_id: NodeId) -> Option<&Node> {
        let successors = self.successors(node_id);

        let mut unlabeled = successors.iter().filter(|(_, edge)| edge.is_default());
        if let Some((node, _)) = unlabeled.next() {
            if unlabeled.next().is_none() {
                return Some(node);
            }
            return None;
        }

        if successors.len() == 1 {
            return Some(successors[0].0);
        }
        None
    }

    /// Validates the graph structure.
    ///
    /// Checks:
    /// - exactly one entry node
    /// - every node reachable from the entry node
    /// - condition nodes have rules, and every rule label has a matching
    ///   outgoing edge
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(&self) -> Result<(), GraphError> {
        let entry = self.entry_node()?;

        // Reachability from the entry node.
        let reachable = self.reachable_from(entry.id);
        for node in self.nodes() {
            if !reachable.contains(&node.id) {
                return Err(GraphError::UnreachableNode { node_id: node.id });
            }
        }

        // Condition nodes must have rules, and each rule label must have a
        // matching outgoing edge.
        for node in self.nodes() {
            if let NodeConfig::Condition { rules } = &node.config {
                if rules.is_empty() {
                    return Err(GraphError::EmptyCondition { node_id: node.id });
                }
                for rule in rules {
                    if self.successor_by_label(node.id, &rule.label).is_none() {
                        return Err(GraphError::MissingBranchEdge {
                            node_id: node.id,
                            label: rule.label.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns the set of node IDs reachable from `start` (inclusive).
    fn reachable_from(&self, start: NodeId) -> HashSet<NodeId> {
        let mut reachable = HashSet::new();
        let Some(&start_idx) = self.node_index_map.get(&start) else {
            return reachable;
        };

        let mut queue = VecDeque::from([start_idx]);
        while let Some(idx) = queue.pop_front() {
            let Some(node) = self.graph.node_weight(idx) else {
                continue;
            };
            if !reachable.insert(node.id) {
                continue;
            }
            for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                queue.push_back(neighbor);
            }
        }
        reachable
    }

    /// Rebuilds the node index map after deserialization.
    pub fn rebuild_index_map(&mut self) {
        self.node_index_map.clear();
        for index in self.graph.node_indices() {
            if let Some(node) = self.graph.node_weight(index) {
                self.node_index_map.insert(node.id, index);
            }
        }
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom serde for the petgraph DiGraph: `{nodes: [...], edges: [...]}`
/// with explicit node IDs on each edge reference.
mod graph_serde {
    use super::*;
    use petgraph::visit::EdgeRef as _;
    use serde::de::{Error as DeError, MapAccess, Visitor};
    use serde::ser::SerializeStruct;

    pub fn serialize<S>(graph: &DiGraph<Node, Edge>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let nodes: Vec<_> = graph.node_weights().cloned().collect();
        let edges: Vec<EdgeRef> = graph
            .edge_references()
            .filter_map(|e| {
                let from_node = graph.node_weight(e.source())?.id;
                let to_node = graph.node_weight(e.target())?.id;
                Some(EdgeRef {
                    from_node,
                    to_node,
                    label: e.weight().label.clone(),
                })
            })
            .collect();

        let mut state = serializer.serialize_struct("Graph", 2)?;
        state.serialize_field("nodes", &nodes)?;
        state.serialize_field("edges", &edges)?;
        state.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DiGraph<Node, Edge>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct GraphVisitor;

        impl<'de> Visitor<'de> for GraphVisitor {
            type Value = DiGraph<Node, Edge>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a workflow graph with nodes and edges")
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut nodes: Option<Vec<Node>> = None;
                let mut edges: Option<Vec<EdgeRef>> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "nodes" => nodes = Some(map.next_value()?),
                        "edges" => edges = Some(map.next_value()?),
                        _ => {
                            let _ = map.next_value::<serde::de::IgnoredAny>()?;
                        }
                    }
                }

                let nodes = nodes.unwrap_or_default();
                let edges = edges.unwrap_or_default();

                // Dangling edges are an error, not silently dropped: the
                // publish path relies on deserialization for referential
                // integrity.
                let graph = WorkflowGraph::from_parts(nodes, edges)
                    .map_err(|e| M::Error::custom(e.to_string()))?;
                Ok(graph.graph)
            }
        }

        deserializer.deserialize_map(GraphVisitor)
    }
}
