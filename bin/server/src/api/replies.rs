//! External reply ingestion.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use leadflow_core::{ConversationId, ExecutionId};
use leadflow_engine::pending::ReplyOutcome;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// An external reply on a conversation.
#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    /// The conversation the reply arrived on.
    pub conversation_id: ConversationId,
    /// The reply payload merged into the execution context.
    #[serde(default)]
    pub payload: JsonValue,
}

/// What the reply did.
#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    /// `resumed` or `no_pending_input`.
    pub outcome: &'static str,
    /// The resumed execution, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
}

/// Hands a reply to the pending-input manager.
///
/// A conversation with no waiting automation is the normal case and
/// answers 200 with `no_pending_input`.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<ReplyResponse>, ApiError> {
    let outcome = state
        .pending
        .on_external_reply(request.conversation_id, request.payload)
        .await?;

    let response = match outcome {
        ReplyOutcome::NoPendingInput => ReplyResponse {
            outcome: "no_pending_input",
            execution_id: None,
        },
        ReplyOutcome::Resumed { execution_id, .. } => ReplyResponse {
            outcome: "resumed",
            execution_id: Some(execution_id),
        },
    };
    Ok(Json(response))
}
