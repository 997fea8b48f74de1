//! Trigger evaluator: from a normalized event to running executions.
//!
//! Matching runs against a point-in-time snapshot of the active
//! definitions; a definition deactivated mid-evaluation may or may not
//! fire (best-effort single pass). A lookup failure degrades to "no
//! workflows fired" and is logged, never propagated: event ingestion is
//! more important than automation.

use crate::execution::Execution;
use crate::queue::ExecutionQueue;
use crate::store::{ExecutionStore, WorkflowStore};
use leadflow_core::{ExecutionId, WorkflowId};
use leadflow_workflow::trigger::NormalizedEvent;
use serde::Serialize;
use std::sync::Arc;

/// A handle to an execution started by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionHandle {
    /// The started execution.
    pub execution_id: ExecutionId,
    /// The workflow it runs.
    pub workflow_id: WorkflowId,
}

/// Matches events against active definitions and starts executions.
#[derive(Clone)]
pub struct TriggerEvaluator {
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    queue: Arc<dyn ExecutionQueue>,
}

impl TriggerEvaluator {
    /// Creates an evaluator.
    #[must_use]
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        queue: Arc<dyn ExecutionQueue>,
    ) -> Self {
        Self {
            workflows,
            executions,
            queue,
        }
    }

    /// Evaluates an event: one new execution per matching active
    /// definition, each enqueued fire-and-forget.
    ///
    /// Never fails the caller: every error path inside degrades to fewer
    /// (or zero) executions fired, with a warning in the service log.
    pub async fn evaluate(&self, event: &NormalizedEvent) -> Vec<ExecutionHandle> {
        let definitions = match self
            .workflows
            .list_active(event.organization_id, event.kind)
            .await
        {
            Ok(definitions) => definitions,
            Err(e) => {
                tracing::warn!(
                    organization_id = %event.organization_id,
                    kind = %event.kind,
                    error = %e,
                    "workflow lookup failed, no workflows fired"
                );
                return Vec::new();
            }
        };

        let mut handles = Vec::new();
        for definition in definitions {
            if !definition.trigger.matches(event) {
                continue;
            }
            let workflow_id = definition.id;

            let execution = match Execution::new(definition, event) {
                Ok(execution) => execution,
                Err(e) => {
                    tracing::warn!(
                        workflow_id = %workflow_id,
                        error = %e,
                        "matched definition is not runnable, skipping"
                    );
                    continue;
                }
            };

            if let Err(e) = self.executions.create_execution(&execution).await {
                tracing::warn!(
                    workflow_id = %workflow_id,
                    error = %e,
                    "failed to persist execution, skipping"
                );
                continue;
            }

            if let Err(e) = self.queue.enqueue(execution.id).await {
                // The execution row exists; an operator can re-enqueue it.
                tracing::error!(
                    execution_id = %execution.id,
                    error = %e,
                    "failed to enqueue execution"
                );
            }

            tracing::info!(
                execution_id = %execution.id,
                workflow_id = %workflow_id,
                kind = %event.kind,
                "execution started by trigger"
            );
            handles.push(ExecutionHandle {
                execution_id: execution.id,
                workflow_id,
            });
        }

        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionStatus;
    use crate::memory::InMemoryStore;
    use crate::queue::QueueError;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use leadflow_core::{ConversationId, OrganizationId};
    use leadflow_workflow::definition::WorkflowDefinition;
    use leadflow_workflow::edge::Edge;
    use leadflow_workflow::node::{Node, NodeConfig};
    use leadflow_workflow::trigger::{Channel, TriggerConfig, TriggerKind};
    use std::sync::Mutex;

    /// Queue double that records enqueued ids without running anything.
    #[derive(Default)]
    struct RecordingQueue {
        enqueued: Mutex<Vec<ExecutionId>>,
    }

    #[async_trait]
    impl ExecutionQueue for RecordingQueue {
        async fn enqueue(&self, execution_id: ExecutionId) -> Result<(), QueueError> {
            self.enqueued.lock().unwrap().push(execution_id);
            Ok(())
        }
    }

    /// Workflow store double whose lookups always fail.
    struct FailingWorkflowStore;

    #[async_trait]
    impl WorkflowStore for FailingWorkflowStore {
        async fn save(&self, _definition: &WorkflowDefinition) -> Result<(), StoreError> {
            Err(StoreError::backend("down"))
        }

        async fn get(
            &self,
            _id: WorkflowId,
        ) -> Result<Option<WorkflowDefinition>, StoreError> {
            Err(StoreError::backend("down"))
        }

        async fn list_active(
            &self,
            _organization_id: OrganizationId,
            _kind: TriggerKind,
        ) -> Result<Vec<WorkflowDefinition>, StoreError> {
            Err(StoreError::backend("down"))
        }
    }

    fn definition(org: OrganizationId, keywords: &[&str]) -> WorkflowDefinition {
        let mut definition = WorkflowDefinition::new(
            org,
            "Responder",
            TriggerConfig::MessageReceived {
                keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
                channel: None,
            },
        );
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let reply = Node::new(
            "Reply",
            NodeConfig::SendMessage {
                channel: Channel::Whatsapp,
                content: "hola".to_string(),
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

    fn message_event(org: OrganizationId, text: &str) -> NormalizedEvent {
        NormalizedEvent::message_received(org, ConversationId::new(), Channel::Whatsapp, text)
    }

    #[tokio::test]
    async fn matching_definition_fires_one_execution() {
        let store = InMemoryStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let evaluator = TriggerEvaluator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            queue.clone(),
        );

        let org = OrganizationId::new();
        let definition = definition(org, &["precio"]);
        WorkflowStore::save(&store, &definition).await.unwrap();

        let handles = evaluator
            .evaluate(&message_event(org, "cual es el precio?"))
            .await;

        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].workflow_id, definition.id);
        assert_eq!(store.execution_count(), 1);
        assert_eq!(queue.enqueued.lock().unwrap().len(), 1);

        let execution = store
            .get_execution(handles[0].execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Running);
        assert_eq!(
            execution.context.get("message"),
            Some(serde_json::json!("cual es el precio?"))
        );
    }

    #[tokio::test]
    async fn non_matching_keyword_fires_nothing() {
        let store = InMemoryStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let evaluator = TriggerEvaluator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            queue.clone(),
        );

        let org = OrganizationId::new();
        WorkflowStore::save(&store, &definition(org, &["precio"]))
            .await
            .unwrap();

        let handles = evaluator.evaluate(&message_event(org, "buenos dias")).await;
        assert!(handles.is_empty());
        assert_eq!(store.execution_count(), 0);
    }

    #[tokio::test]
    async fn inactive_definition_fires_nothing() {
        let store = InMemoryStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let evaluator = TriggerEvaluator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            queue.clone(),
        );

        let org = OrganizationId::new();
        let mut definition = definition(org, &[]);
        definition.deactivate();
        WorkflowStore::save(&store, &definition).await.unwrap();

        let handles = evaluator.evaluate(&message_event(org, "hola")).await;
        assert!(handles.is_empty());
    }

    #[tokio::test]
    async fn multiple_matches_fire_independent_executions() {
        let store = InMemoryStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let evaluator = TriggerEvaluator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            queue.clone(),
        );

        let org = OrganizationId::new();
        WorkflowStore::save(&store, &definition(org, &["precio"]))
            .await
            .unwrap();
        WorkflowStore::save(&store, &definition(org, &[]))
            .await
            .unwrap();

        let handles = evaluator
            .evaluate(&message_event(org, "precio por favor"))
            .await;
        assert_eq!(handles.len(), 2);
        assert_eq!(store.execution_count(), 2);
    }

    #[tokio::test]
    async fn other_organization_does_not_fire() {
        let store = InMemoryStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let evaluator = TriggerEvaluator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            queue.clone(),
        );

        WorkflowStore::save(&store, &definition(OrganizationId::new(), &[]))
            .await
            .unwrap();

        let handles = evaluator
            .evaluate(&message_event(OrganizationId::new(), "hola"))
            .await;
        assert!(handles.is_empty());
    }

    #[tokio::test]
    async fn lookup_failure_degrades_to_no_workflows() {
        let store = InMemoryStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let evaluator = TriggerEvaluator::new(
            Arc::new(FailingWorkflowStore),
            Arc::new(store.clone()),
            queue.clone(),
        );

        // Never an error to the caller.
        let handles = evaluator
            .evaluate(&message_event(OrganizationId::new(), "hola"))
            .await;
        assert!(handles.is_empty());
    }
}
