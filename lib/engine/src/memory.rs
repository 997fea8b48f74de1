//! In-memory store implementation.
//!
//! Backs the engine and scheduler tests and single-process deployments
//! that do not need durable state. All conditional transitions behave
//! exactly like the Postgres implementation in the server crate.

use crate::execution::{Execution, ExecutionLogEntry, PendingInput, PendingInputStatus};
use crate::store::{ExecutionStore, StoreError, WorkflowStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadflow_core::{ConversationId, ExecutionId, OrganizationId, PendingInputId, WorkflowId};
use leadflow_workflow::definition::WorkflowDefinition;
use leadflow_workflow::trigger::TriggerKind;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    workflows: HashMap<WorkflowId, WorkflowDefinition>,
    executions: HashMap<ExecutionId, Execution>,
    logs: Vec<ExecutionLogEntry>,
    pending: HashMap<PendingInputId, PendingInput>,
}

/// An in-memory implementation of both store traits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.inner.lock().expect("store lock").executions.len()
    }

    /// Returns all pending-input records (for assertions in tests).
    #[must_use]
    pub fn pending_inputs(&self) -> Vec<PendingInput> {
        self.inner
            .lock()
            .expect("store lock")
            .pending
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn save(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        self.inner
            .lock()
            .expect("store lock")
            .workflows
            .insert(definition.id, definition.clone());
        Ok(())
    }

    async fn get(&self, id: WorkflowId) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .workflows
            .get(&id)
            .cloned())
    }

    async fn list_active(
        &self,
        organization_id: OrganizationId,
        kind: TriggerKind,
    ) -> Result<Vec<WorkflowDefinition>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .workflows
            .values()
            .filter(|w| {
                w.is_active && w.organization_id == organization_id && w.trigger_kind() == kind
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        self.inner
            .lock()
            .expect("store lock")
            .executions
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .executions
            .get(&id)
            .cloned())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        if !inner.executions.contains_key(&execution.id) {
            return Err(StoreError::NotFound {
                entity: "execution",
                id: execution.id.to_string(),
            });
        }
        inner.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn list_due_executions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExecutionId>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .executions
            .values()
            .filter(|e| {
                e.status == crate::execution::ExecutionStatus::Running
                    && e.next_run_at.is_some_and(|at| at <= now)
            })
            .map(|e| e.id)
            .collect())
    }

    async fn claim_timer(
        &self,
        execution_id: ExecutionId,
        expected: DateTime<Utc>,
        next: Option<leadflow_workflow::node::NodeId>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        let Some(execution) = inner.executions.get_mut(&execution_id) else {
            return Ok(false);
        };
        if execution.status != crate::execution::ExecutionStatus::Running
            || execution.next_run_at != Some(expected)
        {
            return Ok(false);
        }
        execution.next_run_at = None;
        match next {
            Some(next) => execution.current_node_id = next,
            None => execution.complete(Utc::now()),
        }
        Ok(true)
    }

    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        self.inner
            .lock()
            .expect("store lock")
            .logs
            .push(entry.clone());
        Ok(())
    }

    async fn list_logs(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .logs
            .iter()
            .filter(|entry| entry.execution_id == execution_id)
            .cloned()
            .collect())
    }

    async fn create_pending_input(&self, pending: &PendingInput) -> Result<(), StoreError> {
        self.inner
            .lock()
            .expect("store lock")
            .pending
            .insert(pending.id, pending.clone());
        Ok(())
    }

    async fn find_waiting_pending_input(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<PendingInput>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .pending
            .values()
            .filter(|p| {
                p.status == PendingInputStatus::Waiting && p.conversation_id == conversation_id
            })
            .min_by_key(|p| p.created_at)
            .cloned())
    }

    async fn resolve_pending_input(
        &self,
        id: PendingInputId,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        let Some(pending) = inner.pending.get_mut(&id) else {
            return Ok(false);
        };
        if pending.status != PendingInputStatus::Waiting {
            return Ok(false);
        }
        pending.status = PendingInputStatus::Resolved;
        pending.resolved_at = Some(resolved_at);
        Ok(true)
    }

    async fn expire_pending_inputs(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PendingInput>, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        let now = Utc::now();
        let mut expired = Vec::new();
        for pending in inner.pending.values_mut() {
            if pending.status == PendingInputStatus::Waiting && pending.created_at < older_than {
                pending.status = PendingInputStatus::Expired;
                pending.resolved_at = Some(now);
                expired.push(pending.clone());
            }
        }
        Ok(expired)
    }
}
