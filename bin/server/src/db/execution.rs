//! Postgres repository for executions, logs, and pending inputs.

use crate::db::decode_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadflow_core::{ConversationId, ExecutionId, LogEntryId, OrganizationId, PendingInputId, WorkflowId};
use leadflow_engine::execution::{
    Execution, ExecutionLogEntry, ExecutionStatus, LogLevel, PendingInput, PendingInputStatus,
};
use leadflow_engine::store::{ExecutionStore, StoreError};
use leadflow_workflow::node::NodeId;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

fn status_from_str(s: &str) -> ExecutionStatus {
    match s {
        "waiting_input" => ExecutionStatus::WaitingInput,
        "completed" => ExecutionStatus::Completed,
        "failed" => ExecutionStatus::Failed,
        "cancelled" => ExecutionStatus::Cancelled,
        _ => ExecutionStatus::Running,
    }
}

fn level_from_str(s: &str) -> LogLevel {
    match s {
        "warn" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

fn pending_status_from_str(s: &str) -> PendingInputStatus {
    match s {
        "resolved" => PendingInputStatus::Resolved,
        "expired" => PendingInputStatus::Expired,
        _ => PendingInputStatus::Waiting,
    }
}

fn parse_id<T: FromStr>(value: &str, what: &str) -> Result<T, sqlx::Error>
where
    T::Err: std::fmt::Display,
{
    T::from_str(value).map_err(|e| decode_error(format!("invalid {what} '{value}': {e}")))
}

/// Row type for execution queries.
#[derive(FromRow)]
struct ExecutionRow {
    id: String,
    workflow_id: String,
    organization_id: String,
    status: String,
    current_node_id: String,
    conversation_id: Option<String>,
    context: serde_json::Value,
    definition: serde_json::Value,
    steps_taken: i32,
    next_run_at: Option<DateTime<Utc>>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl ExecutionRow {
    fn try_into_execution(self) -> Result<Execution, sqlx::Error> {
        let id: ExecutionId = parse_id(&self.id, "execution id")?;
        let workflow_id: WorkflowId = parse_id(&self.workflow_id, "workflow id")?;
        let organization_id: OrganizationId = parse_id(&self.organization_id, "organization id")?;
        let current_node_id: NodeId = parse_id(&self.current_node_id, "node id")?;
        let conversation_id = self
            .conversation_id
            .as_deref()
            .map(|value| parse_id::<ConversationId>(value, "conversation id"))
            .transpose()?;

        let definition = serde_json::from_value(self.definition)
            .map_err(|e| decode_error(format!("invalid pinned definition payload: {e}")))?;
        let context = serde_json::from_value(self.context)
            .map_err(|e| decode_error(format!("invalid context payload: {e}")))?;

        Ok(Execution {
            id,
            workflow_id,
            organization_id,
            definition,
            status: status_from_str(&self.status),
            current_node_id,
            context,
            conversation_id,
            steps_taken: u32::try_from(self.steps_taken).unwrap_or(0),
            next_run_at: self.next_run_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error_message: self.error_message,
        })
    }
}

/// Row type for log queries.
#[derive(FromRow)]
struct LogRow {
    id: String,
    execution_id: String,
    node_id: Option<String>,
    level: String,
    message: String,
    details: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl LogRow {
    fn try_into_entry(self) -> Result<ExecutionLogEntry, sqlx::Error> {
        let id: LogEntryId = parse_id(&self.id, "log entry id")?;
        let execution_id: ExecutionId = parse_id(&self.execution_id, "execution id")?;
        let node_id = self
            .node_id
            .as_deref()
            .map(|value| parse_id::<NodeId>(value, "node id"))
            .transpose()?;

        Ok(ExecutionLogEntry {
            id,
            execution_id,
            node_id,
            level: level_from_str(&self.level),
            message: self.message,
            details: self.details,
            created_at: self.created_at,
        })
    }
}

/// Row type for pending-input queries.
#[derive(FromRow)]
struct PendingInputRow {
    id: String,
    execution_id: String,
    conversation_id: String,
    node_id: String,
    status: String,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl PendingInputRow {
    fn try_into_pending(self) -> Result<PendingInput, sqlx::Error> {
        let id: PendingInputId = parse_id(&self.id, "pending input id")?;
        let execution_id: ExecutionId = parse_id(&self.execution_id, "execution id")?;
        let conversation_id: ConversationId = parse_id(&self.conversation_id, "conversation id")?;
        let node_id: NodeId = parse_id(&self.node_id, "node id")?;

        Ok(PendingInput {
            id,
            execution_id,
            conversation_id,
            node_id,
            status: pending_status_from_str(&self.status),
            created_at: self.created_at,
            resolved_at: self.resolved_at,
        })
    }
}

/// Postgres-backed [`ExecutionStore`].
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    /// Creates a new store.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let definition = serde_json::to_value(&execution.definition).map_err(StoreError::backend)?;
        let context = serde_json::to_value(&execution.context).map_err(StoreError::backend)?;

        sqlx::query(
            r#"
            INSERT INTO executions
                (id, workflow_id, organization_id, status, current_node_id,
                 conversation_id, context, definition, steps_taken, next_run_at,
                 started_at, completed_at, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(execution.id.as_ulid().to_string())
        .bind(execution.workflow_id.as_ulid().to_string())
        .bind(execution.organization_id.as_ulid().to_string())
        .bind(execution.status.as_str())
        .bind(execution.current_node_id.to_string())
        .bind(execution.conversation_id.map(|c| c.as_ulid().to_string()))
        .bind(context)
        .bind(definition)
        .bind(i32::try_from(execution.steps_taken).unwrap_or(i32::MAX))
        .bind(execution.next_run_at)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(&execution.error_message)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        let row: Option<ExecutionRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, organization_id, status, current_node_id,
                   conversation_id, context, definition, steps_taken, next_run_at,
                   started_at, completed_at, error_message
            FROM executions
            WHERE id = $1
            "#,
        )
        .bind(id.as_ulid().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        match row {
            Some(row) => Ok(Some(row.try_into_execution().map_err(StoreError::backend)?)),
            None => Ok(None),
        }
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let context = serde_json::to_value(&execution.context).map_err(StoreError::backend)?;

        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = $2, current_node_id = $3, context = $4, steps_taken = $5,
                next_run_at = $6, completed_at = $7, error_message = $8
            WHERE id = $1
            "#,
        )
        .bind(execution.id.as_ulid().to_string())
        .bind(execution.status.as_str())
        .bind(execution.current_node_id.to_string())
        .bind(context)
        .bind(i32::try_from(execution.steps_taken).unwrap_or(i32::MAX))
        .bind(execution.next_run_at)
        .bind(execution.completed_at)
        .bind(&execution.error_message)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "execution",
                id: execution.id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_due_executions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExecutionId>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM executions
            WHERE status = 'running' AND next_run_at IS NOT NULL AND next_run_at <= $1
            ORDER BY next_run_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter()
            .map(|(id,)| {
                parse_id::<ExecutionId>(&id, "execution id").map_err(StoreError::backend)
            })
            .collect()
    }

    async fn claim_timer(
        &self,
        execution_id: ExecutionId,
        expected: DateTime<Utc>,
        next: Option<NodeId>,
    ) -> Result<bool, StoreError> {
        let result = match next {
            Some(next) => {
                sqlx::query(
                    r#"
                    UPDATE executions
                    SET next_run_at = NULL, current_node_id = $3
                    WHERE id = $1 AND next_run_at = $2 AND status = 'running'
                    "#,
                )
                .bind(execution_id.as_ulid().to_string())
                .bind(expected)
                .bind(next.to_string())
                .execute(&self.pool)
                .await
            }
            // The wait node was terminal: the claim completes the run.
            None => {
                sqlx::query(
                    r#"
                    UPDATE executions
                    SET next_run_at = NULL, status = 'completed', completed_at = NOW()
                    WHERE id = $1 AND next_run_at = $2 AND status = 'running'
                    "#,
                )
                .bind(execution_id.as_ulid().to_string())
                .bind(expected)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(StoreError::backend)?;

        Ok(result.rows_affected() == 1)
    }

    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO execution_logs
                (id, execution_id, node_id, level, message, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id.as_ulid().to_string())
        .bind(entry.execution_id.as_ulid().to_string())
        .bind(entry.node_id.map(|n| n.to_string()))
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn list_logs(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"
            SELECT id, execution_id, node_id, level, message, details, created_at
            FROM execution_logs
            WHERE execution_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(execution_id.as_ulid().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter()
            .map(|row| row.try_into_entry().map_err(StoreError::backend))
            .collect()
    }

    async fn create_pending_input(&self, pending: &PendingInput) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pending_inputs
                (id, execution_id, conversation_id, node_id, status, created_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(pending.id.as_ulid().to_string())
        .bind(pending.execution_id.as_ulid().to_string())
        .bind(pending.conversation_id.as_ulid().to_string())
        .bind(pending.node_id.to_string())
        .bind(pending.status.as_str())
        .bind(pending.created_at)
        .bind(pending.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn find_waiting_pending_input(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<PendingInput>, StoreError> {
        let row: Option<PendingInputRow> = sqlx::query_as(
            r#"
            SELECT id, execution_id, conversation_id, node_id, status, created_at, resolved_at
            FROM pending_inputs
            WHERE conversation_id = $1 AND status = 'waiting'
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(conversation_id.as_ulid().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        match row {
            Some(row) => Ok(Some(row.try_into_pending().map_err(StoreError::backend)?)),
            None => Ok(None),
        }
    }

    async fn resolve_pending_input(
        &self,
        id: PendingInputId,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE pending_inputs
            SET status = 'resolved', resolved_at = $2
            WHERE id = $1 AND status = 'waiting'
            "#,
        )
        .bind(id.as_ulid().to_string())
        .bind(resolved_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(result.rows_affected() == 1)
    }

    async fn expire_pending_inputs(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PendingInput>, StoreError> {
        let rows: Vec<PendingInputRow> = sqlx::query_as(
            r#"
            UPDATE pending_inputs
            SET status = 'expired', resolved_at = NOW()
            WHERE status = 'waiting' AND created_at < $1
            RETURNING id, execution_id, conversation_id, node_id, status, created_at, resolved_at
            "#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter()
            .map(|row| row.try_into_pending().map_err(StoreError::backend))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_defaults_to_running() {
        assert_eq!(status_from_str("waiting_input"), ExecutionStatus::WaitingInput);
        assert_eq!(status_from_str("completed"), ExecutionStatus::Completed);
        assert_eq!(status_from_str("unexpected"), ExecutionStatus::Running);
    }

    #[test]
    fn level_parsing_defaults_to_info() {
        assert_eq!(level_from_str("error"), LogLevel::Error);
        assert_eq!(level_from_str("unexpected"), LogLevel::Info);
    }

    #[test]
    fn pending_status_parsing_defaults_to_waiting() {
        assert_eq!(pending_status_from_str("expired"), PendingInputStatus::Expired);
        assert_eq!(pending_status_from_str("unexpected"), PendingInputStatus::Waiting);
    }

    #[test]
    fn parse_id_rejects_garbage() {
        let result = parse_id::<ExecutionId>("not_a_ulid", "execution id");
        assert!(result.is_err());
    }
}
