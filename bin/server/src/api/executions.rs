//! Execution read path and operator cancel.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use leadflow_core::{ConversationId, ExecutionId, OrganizationId, WorkflowId};
use leadflow_engine::execution::{Execution, ExecutionLogEntry, ExecutionStatus};
use leadflow_engine::store::ExecutionStore as _;
use leadflow_workflow::node::NodeId;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// An execution as exposed on the read path (the pinned definition
/// snapshot is omitted; dashboards fetch the workflow separately).
#[derive(Debug, Serialize)]
pub struct ExecutionView {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub organization_id: OrganizationId,
    pub status: ExecutionStatus,
    pub current_node_id: NodeId,
    pub conversation_id: Option<ConversationId>,
    pub context: JsonValue,
    pub steps_taken: u32,
    pub next_run_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<Execution> for ExecutionView {
    fn from(execution: Execution) -> Self {
        Self {
            id: execution.id,
            workflow_id: execution.workflow_id,
            organization_id: execution.organization_id,
            status: execution.status,
            current_node_id: execution.current_node_id,
            conversation_id: execution.conversation_id,
            context: execution.context.as_value(),
            steps_taken: execution.steps_taken,
            next_run_at: execution.next_run_at,
            started_at: execution.started_at,
            completed_at: execution.completed_at,
            error_message: execution.error_message,
        }
    }
}

fn parse_execution_id(id: &str) -> Result<ExecutionId, ApiError> {
    id.parse().map_err(|e| ApiError::BadRequest {
        details: format!("invalid execution id: {e}"),
    })
}

/// Returns one execution.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionView>, ApiError> {
    let id = parse_execution_id(&id)?;
    let Some(execution) = state.executions.get_execution(id).await? else {
        return Err(ApiError::NotFound {
            entity: "execution",
            id: id.to_string(),
        });
    };
    Ok(Json(execution.into()))
}

/// Returns an execution's log entries in order.
pub async fn logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ExecutionLogEntry>>, ApiError> {
    let id = parse_execution_id(&id)?;
    if state.executions.get_execution(id).await?.is_none() {
        return Err(ApiError::NotFound {
            entity: "execution",
            id: id.to_string(),
        });
    }
    Ok(Json(state.executions.list_logs(id).await?))
}

/// Result of a cancel request.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// False when the execution was already terminal.
    pub cancelled: bool,
}

/// Cancels a running or suspended execution.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = parse_execution_id(&id)?;
    let cancelled = state.engine.cancel(id).await?;
    Ok(Json(CancelResponse { cancelled }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{greeter_definition, test_state};
    use leadflow_core::OrganizationId;
    use leadflow_engine::execution::Execution as EngineExecution;
    use leadflow_engine::store::ExecutionStore;
    use leadflow_workflow::trigger::{Channel, NormalizedEvent};

    #[tokio::test]
    async fn get_returns_view_without_definition() {
        let (state, store, _recorder) = test_state();
        let org = OrganizationId::new();
        let definition = greeter_definition(org, &[]);
        let event = NormalizedEvent::message_received(
            org,
            ConversationId::new(),
            Channel::Whatsapp,
            "hola",
        );
        let execution = EngineExecution::new(definition, &event).unwrap();
        let execution_id = execution.id;
        store.create_execution(&execution).await.unwrap();

        let Json(view) = get(State(state), Path(execution_id.to_string()))
            .await
            .unwrap();

        assert_eq!(view.id, execution_id);
        assert_eq!(view.status, ExecutionStatus::Running);
        assert_eq!(view.context["message"], "hola");
    }

    #[tokio::test]
    async fn get_unknown_execution_is_404() {
        let (state, _store, _recorder) = test_state();
        let result = get(State(state), Path(ExecutionId::new().to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound { .. })));
    }

    #[tokio::test]
    async fn garbage_id_is_bad_request() {
        let (state, _store, _recorder) = test_state();
        let result = get(State(state), Path("not-an-id".to_string())).await;
        assert!(matches!(result, Err(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn cancel_marks_execution_cancelled() {
        let (state, store, _recorder) = test_state();
        let org = OrganizationId::new();
        let definition = greeter_definition(org, &[]);
        let event = NormalizedEvent::message_received(
            org,
            ConversationId::new(),
            Channel::Whatsapp,
            "hola",
        );
        let execution = EngineExecution::new(definition, &event).unwrap();
        let execution_id = execution.id;
        store.create_execution(&execution).await.unwrap();

        let Json(response) = cancel(State(state.clone()), Path(execution_id.to_string()))
            .await
            .unwrap();
        assert!(response.cancelled);

        let Json(view) = get(State(state), Path(execution_id.to_string()))
            .await
            .unwrap();
        assert_eq!(view.status, ExecutionStatus::Cancelled);
    }
}
