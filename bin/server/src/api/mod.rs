//! HTTP API for the automation engine.
//!
//! The write paths (`/api/events`, `/api/replies`) are the engine's
//! boundary with event ingestion: they always answer quickly and never
//! fail because automation downstream failed. The read paths expose
//! execution state and logs for dashboards.

pub mod events;
pub mod executions;
pub mod replies;
pub mod workflows;

use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/events", post(events::ingest))
        .route("/api/test-trigger", post(events::test_trigger))
        .route("/api/replies", post(replies::ingest))
        .route("/api/workflows", post(workflows::publish))
        .route("/api/workflows/{id}/test", post(workflows::dry_run))
        .route("/api/executions/{id}", get(executions::get))
        .route("/api/executions/{id}/logs", get(executions::logs))
        .route("/api/executions/{id}/cancel", post(executions::cancel))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
