//! Workflow publishing and dry runs.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use leadflow_core::WorkflowId;
use leadflow_engine::dry_run::{TestData, TestRunReport};
use leadflow_engine::store::WorkflowStore as _;
use leadflow_workflow::definition::{WorkflowDefinition, WorkflowSummary};
use std::sync::Arc;

/// Publishes (creates or replaces) a workflow definition.
///
/// Structural validation runs here, once; the engine assumes published
/// definitions are well-formed.
pub async fn publish(
    State(state): State<Arc<AppState>>,
    Json(definition): Json<WorkflowDefinition>,
) -> Result<(StatusCode, Json<WorkflowSummary>), ApiError> {
    definition
        .validate()
        .map_err(|e| ApiError::InvalidDefinition {
            details: e.to_string(),
        })?;

    state.workflows.save(&definition).await?;
    tracing::info!(
        workflow_id = %definition.id,
        organization_id = %definition.organization_id,
        "workflow published"
    );

    Ok((StatusCode::CREATED, Json(WorkflowSummary::from(&definition))))
}

/// Runs a published workflow in dry-run mode.
///
/// No adapter is called and no durable state is touched; the report says
/// which nodes would run and what they would do.
pub async fn dry_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(test_data): Json<TestData>,
) -> Result<Json<TestRunReport>, ApiError> {
    let id: WorkflowId = id.parse().map_err(|e| ApiError::BadRequest {
        details: format!("invalid workflow id: {e}"),
    })?;

    let Some(definition) = state.workflows.get(id).await? else {
        return Err(ApiError::NotFound {
            entity: "workflow",
            id: id.to_string(),
        });
    };

    let report = state
        .test_executor
        .execute(definition, test_data)
        .await
        .map_err(|e| ApiError::InvalidDefinition {
            details: e.to_string(),
        })?;

    Ok(Json(report))
}
