//! API error types and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leadflow_engine::error::EngineError;
use leadflow_engine::store::StoreError;
use serde_json::json;
use std::fmt;

/// Errors surfaced by the HTTP API.
#[derive(Debug)]
pub enum ApiError {
    /// The submitted definition failed publish-time validation.
    InvalidDefinition { details: String },
    /// A referenced entity does not exist.
    NotFound { entity: &'static str, id: String },
    /// The request itself is malformed.
    BadRequest { details: String },
    /// Something inside failed; details stay in the service log.
    Internal { details: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDefinition { details } => {
                write!(f, "invalid workflow definition: {details}")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} '{id}' not found"),
            Self::BadRequest { details } => write!(f, "bad request: {details}"),
            Self::Internal { details } => write!(f, "internal error: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Backend { reason } => Self::Internal { details: reason },
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ExecutionNotFound { execution_id } => Self::NotFound {
                entity: "execution",
                id: execution_id.to_string(),
            },
            EngineError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidDefinition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { details } => {
                tracing::error!(details = %details, "internal API error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            // Internal details stay out of the response body.
            Self::Internal { .. } => "internal error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({"error": message}))).into_response()
    }
}
