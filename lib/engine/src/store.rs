//! Persistence traits for workflow definitions and execution state.
//!
//! The engine, evaluator, pending-input manager, and scheduler all go
//! through these traits. [`crate::memory::InMemoryStore`] implements both
//! for tests and broker-less deployments; the server crate provides the
//! Postgres implementation.

use crate::execution::{Execution, ExecutionLogEntry, PendingInput};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadflow_core::{ConversationId, ExecutionId, OrganizationId, PendingInputId, WorkflowId};
use leadflow_workflow::definition::WorkflowDefinition;
use leadflow_workflow::node::NodeId;
use leadflow_workflow::trigger::TriggerKind;
use std::fmt;

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A referenced row does not exist.
    NotFound { entity: &'static str, id: String },
    /// The backend failed.
    Backend { reason: String },
}

impl StoreError {
    /// Creates a backend error from any error-ish value.
    #[must_use]
    pub fn backend(reason: impl ToString) -> Self {
        Self::Backend {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Backend { reason } => write!(f, "store backend error: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Storage for workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Saves (creates or replaces) a definition.
    async fn save(&self, definition: &WorkflowDefinition) -> Result<(), StoreError>;

    /// Fetches a definition by ID.
    async fn get(&self, id: WorkflowId) -> Result<Option<WorkflowDefinition>, StoreError>;

    /// Lists active definitions for an organization and trigger kind.
    ///
    /// This is the point-in-time snapshot the trigger evaluator matches
    /// against.
    async fn list_active(
        &self,
        organization_id: OrganizationId,
        kind: TriggerKind,
    ) -> Result<Vec<WorkflowDefinition>, StoreError>;
}

/// Storage for executions, their logs, and pending-input records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Creates an execution row.
    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    /// Fetches an execution by ID.
    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError>;

    /// Persists the current state of an execution.
    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    /// Lists running executions whose timer is due at `now`.
    async fn list_due_executions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExecutionId>, StoreError>;

    /// Conditionally claims an execution's elapsed timer and performs the
    /// resume transition in one atomic update.
    ///
    /// Only applies when the execution is still running and `next_run_at`
    /// still equals `expected`: clears the timer and either advances
    /// `current_node_id` to `next` or, when the wait node was terminal
    /// (`next` is `None`), completes the execution. Returns false if
    /// another runner claimed the timer first.
    async fn claim_timer(
        &self,
        execution_id: ExecutionId,
        expected: DateTime<Utc>,
        next: Option<NodeId>,
    ) -> Result<bool, StoreError>;

    /// Appends a log entry.
    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError>;

    /// Lists log entries for an execution in insertion order.
    async fn list_logs(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError>;

    /// Creates a pending-input record.
    async fn create_pending_input(&self, pending: &PendingInput) -> Result<(), StoreError>;

    /// Finds the oldest waiting pending input for a conversation, if any.
    async fn find_waiting_pending_input(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<PendingInput>, StoreError>;

    /// Conditionally resolves a pending input (`waiting` → `resolved`).
    ///
    /// Returns false if the record was no longer waiting; racing replies
    /// observe exactly one true.
    async fn resolve_pending_input(
        &self,
        id: PendingInputId,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Expires all waiting pending inputs created before `older_than`
    /// (`waiting` → `expired`) and returns the expired records.
    async fn expire_pending_inputs(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PendingInput>, StoreError>;
}
