//! Workflow definition types.
//!
//! A definition is a named automation owned by an organization: a trigger
//! configuration plus a directed graph of nodes. Definitions are read-only
//! to the engine; the authoring UI creates and edits them, and structural
//! validation runs once at publish time.

use crate::error::DefinitionError;
use crate::graph::WorkflowGraph;
use crate::node::{Node, NodeKind};
use crate::trigger::{TriggerConfig, TriggerKind};
use chrono::{DateTime, Utc};
use leadflow_core::{OrganizationId, WorkflowId};
use serde::{Deserialize, Serialize};

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// The organization that owns this workflow.
    pub organization_id: OrganizationId,
    /// Human-readable name.
    pub name: String,
    /// Whether this workflow reacts to events.
    pub is_active: bool,
    /// The trigger that starts executions of this workflow.
    pub trigger: TriggerConfig,
    /// The workflow graph (nodes and edges).
    pub graph: WorkflowGraph,
    /// When this workflow was created.
    pub created_at: DateTime<Utc>,
    /// When this workflow was last updated.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Creates a new active workflow with an empty graph.
    #[must_use]
    pub fn new(
        organization_id: OrganizationId,
        name: impl Into<String>,
        trigger: TriggerConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            organization_id,
            name: name.into(),
            is_active: true,
            trigger,
            graph: WorkflowGraph::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the kind of event this workflow reacts to.
    #[must_use]
    pub fn trigger_kind(&self) -> TriggerKind {
        self.trigger.kind()
    }

    /// Returns the entry node of the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph has zero or multiple entry nodes.
    pub fn entry_node(&self) -> Result<&Node, DefinitionError> {
        Ok(self.graph.entry_node()?)
    }

    /// Activates the workflow.
    pub fn activate(&mut self) {
        self.is_active = true;
        self.touch();
    }

    /// Deactivates the workflow.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.touch();
    }

    /// Marks the workflow as updated (bumps `updated_at`).
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Validates the definition for publishing.
    ///
    /// Checks the graph structure, requires the entry node to be a trigger
    /// node, and validates the trigger configuration. Run-time execution
    /// assumes these checks have passed.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.graph.validate()?;
        self.trigger.validate()?;

        let entry = self.graph.entry_node()?;
        if entry.kind() != NodeKind::Trigger {
            return Err(DefinitionError::EntryNotTrigger { node_id: entry.id });
        }

        Ok(())
    }
}

/// Summary information about a workflow (for listings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    /// Workflow ID.
    pub id: WorkflowId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Workflow name.
    pub name: String,
    /// Whether active.
    pub is_active: bool,
    /// The kind of event the workflow reacts to.
    pub trigger_kind: TriggerKind,
    /// Number of nodes in the graph.
    pub node_count: usize,
    /// Last updated timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowDefinition> for WorkflowSummary {
    fn from(definition: &WorkflowDefinition) -> Self {
        Self {
            id: definition.id,
            organization_id: definition.organization_id,
            name: definition.name.clone(),
            is_active: definition.is_active,
            trigger_kind: definition.trigger_kind(),
            node_count: definition.graph.node_count(),
            updated_at: definition.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::NodeConfig;
    use crate::trigger::Channel;

    fn keyword_trigger() -> TriggerConfig {
        TriggerConfig::MessageReceived {
            keywords: vec!["precio".to_string()],
            channel: None,
        }
    }

    fn linear_definition() -> WorkflowDefinition {
        let mut definition =
            WorkflowDefinition::new(OrganizationId::new(), "Quote responder", keyword_trigger());

        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let reply = Node::new(
            "Reply",
            NodeConfig::SendMessage {
                channel: Channel::Whatsapp,
                content: "Aquí tu cotización".to_string(),
                requires_reply: false,
            },
        );
        let trigger_id = trigger.id;
        let reply_id = reply.id;

        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(reply).unwrap();
        definition
            .graph
            .add_edge(trigger_id, reply_id, Edge::unlabeled())
            .unwrap();

        definition
    }

    #[test]
    fn definition_creation() {
        let definition = linear_definition();
        assert!(definition.is_active);
        assert_eq!(definition.trigger_kind(), TriggerKind::MessageReceived);
        assert_eq!(definition.graph.node_count(), 2);
    }

    #[test]
    fn definition_validates() {
        let definition = linear_definition();
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn entry_must_be_trigger_node() {
        let mut definition =
            WorkflowDefinition::new(OrganizationId::new(), "Broken", keyword_trigger());
        definition
            .graph
            .add_node(Node::new(
                "Orphan message",
                NodeConfig::SendMessage {
                    channel: Channel::Whatsapp,
                    content: "hola".to_string(),
                    requires_reply: false,
                },
            ))
            .unwrap();

        let result = definition.validate();
        assert!(matches!(
            result,
            Err(DefinitionError::EntryNotTrigger { .. })
        ));
    }

    #[test]
    fn activate_deactivate() {
        let mut definition = linear_definition();

        definition.deactivate();
        assert!(!definition.is_active);

        definition.activate();
        assert!(definition.is_active);
    }

    #[test]
    fn summary_from_definition() {
        let definition = linear_definition();
        let summary = WorkflowSummary::from(&definition);

        assert_eq!(summary.id, definition.id);
        assert_eq!(summary.name, "Quote responder");
        assert_eq!(summary.node_count, 2);
        assert_eq!(summary.trigger_kind, TriggerKind::MessageReceived);
    }

    #[test]
    fn definition_serde_roundtrip() {
        let definition = linear_definition();
        let json = serde_json::to_string(&definition).expect("serialize");
        let parsed: WorkflowDefinition = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed.id, definition.id);
        assert_eq!(parsed.graph.node_count(), 2);
        // The graph index is rebuilt on deserialize; entry lookup works.
        assert!(parsed.entry_node().is_ok());
    }
}
