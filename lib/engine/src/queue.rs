//! Execution queue: fire-and-forget handoff from trigger matching to the
//! engine.
//!
//! The trigger evaluator enqueues freshly created executions and returns
//! immediately; the caller's request path is never coupled to workflow
//! completion. [`TokioExecutionQueue`] runs executions on spawned tasks in
//! the current process; [`crate::nats`] provides a JetStream-backed queue
//! for multi-process deployments.

use crate::engine::ExecutionEngine;
use async_trait::async_trait;
use leadflow_core::ExecutionId;
use std::fmt;

/// Errors from queue operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Failed to connect to the queue backend.
    ConnectionFailed { message: String },
    /// Failed to enqueue a job.
    PublishFailed { message: String },
    /// Failed to consume jobs.
    ConsumeFailed { message: String },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "queue connection failed: {message}")
            }
            Self::PublishFailed { message } => write!(f, "enqueue failed: {message}"),
            Self::ConsumeFailed { message } => write!(f, "consume failed: {message}"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Hands executions to whatever runs them.
#[async_trait]
pub trait ExecutionQueue: Send + Sync {
    /// Enqueues an execution for (eventual) running.
    ///
    /// # Errors
    ///
    /// Returns an error if the job could not be enqueued.
    async fn enqueue(&self, execution_id: ExecutionId) -> Result<(), QueueError>;
}

/// In-process queue: every enqueued execution runs on its own tokio task.
#[derive(Clone)]
pub struct TokioExecutionQueue {
    engine: ExecutionEngine,
}

impl TokioExecutionQueue {
    /// Creates a queue running executions on the given engine.
    #[must_use]
    pub fn new(engine: ExecutionEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ExecutionQueue for TokioExecutionQueue {
    async fn enqueue(&self, execution_id: ExecutionId) -> Result<(), QueueError> {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            match engine.run(execution_id).await {
                Ok(outcome) => {
                    tracing::debug!(execution_id = %execution_id, ?outcome, "execution run finished");
                }
                Err(e) => {
                    tracing::error!(execution_id = %execution_id, error = %e, "execution run errored");
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Execution, ExecutionStatus};
    use crate::memory::InMemoryStore;
    use crate::store::ExecutionStore;
    use leadflow_adapters::recording::RecordingAdapters;
    use leadflow_core::{ConversationId, OrganizationId};
    use leadflow_workflow::definition::WorkflowDefinition;
    use leadflow_workflow::edge::Edge;
    use leadflow_workflow::node::{Node, NodeConfig};
    use leadflow_workflow::trigger::{Channel, NormalizedEvent, TriggerConfig};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn enqueued_execution_runs_to_completion() {
        let store = InMemoryStore::new();
        let recorder = RecordingAdapters::new();
        let engine = ExecutionEngine::new(Arc::new(store.clone()), recorder.as_adapter_set());
        let queue = TokioExecutionQueue::new(engine);

        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(
            org,
            "Greeter",
            TriggerConfig::MessageReceived {
                keywords: vec![],
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

        let event = NormalizedEvent::message_received(
            org,
            ConversationId::new(),
            Channel::Whatsapp,
            "hola",
        );
        let execution = Execution::new(definition, &event).unwrap();
        let execution_id = execution.id;
        store.create_execution(&execution).await.unwrap();

        queue.enqueue(execution_id).await.unwrap();

        // The caller does not block on completion; poll for the result.
        let mut status = ExecutionStatus::Running;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = store
                .get_execution(execution_id)
                .await
                .unwrap()
                .unwrap()
                .status;
            if status.is_terminal() {
                break;
            }
        }
        assert_eq!(status, ExecutionStatus::Completed);
        assert_eq!(recorder.calls().len(), 1);
    }

    #[test]
    fn queue_error_display() {
        let err = QueueError::PublishFailed {
            message: "stream gone".to_string(),
        };
        assert!(err.to_string().contains("stream gone"));
    }
}
