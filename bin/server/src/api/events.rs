//! Event ingestion and the manual test trigger.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use leadflow_core::{ConversationId, LeadId, OrganizationId};
use leadflow_engine::evaluator::ExecutionHandle;
use leadflow_workflow::trigger::{Channel, NormalizedEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response for event ingestion: the executions that fired.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    /// One handle per matched workflow.
    pub handles: Vec<ExecutionHandle>,
}

/// Ingests a normalized event.
///
/// Always answers 202: trigger evaluation is best-effort and automation
/// failures never propagate to the ingestion caller.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(event): Json<NormalizedEvent>,
) -> (StatusCode, Json<EventResponse>) {
    let handles = state.evaluator.evaluate(&event).await;
    (StatusCode::ACCEPTED, Json(EventResponse { handles }))
}

/// Manual trigger invocation (debugging aid).
#[derive(Debug, Deserialize)]
pub struct TestTriggerRequest {
    /// The organization to evaluate against.
    pub organization_id: OrganizationId,
    /// Message text; when present the event is `message_received`.
    #[serde(default)]
    pub message: Option<String>,
    /// Conversation to bind; generated when absent.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    /// Channel; defaults to web chat.
    #[serde(default)]
    pub channel: Option<Channel>,
    /// Sender handle.
    #[serde(default)]
    pub sender: Option<String>,
    /// Lead to bind.
    #[serde(default)]
    pub lead_id: Option<LeadId>,
}

/// Fires the trigger evaluator with a synthetic event.
///
/// The evaluator is called synchronously but executions still run
/// fire-and-forget; the response only says what fired.
pub async fn test_trigger(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestTriggerRequest>,
) -> (StatusCode, Json<EventResponse>) {
    let event = match request.message {
        Some(message) => {
            let mut event = NormalizedEvent::message_received(
                request.organization_id,
                request.conversation_id.unwrap_or_default(),
                request.channel.unwrap_or(Channel::WebChat),
                message,
            );
            event.sender = request.sender;
            event.lead_id = request.lead_id;
            event
        }
        None => {
            let mut event = NormalizedEvent::manual(request.organization_id);
            event.conversation_id = request.conversation_id;
            event.sender = request.sender;
            event.lead_id = request.lead_id;
            event
        }
    };

    let handles = state.evaluator.evaluate(&event).await;
    (StatusCode::ACCEPTED, Json(EventResponse { handles }))
}
