//! Error types for the Signflow API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use signflow_core::{ComposeError, WorkflowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("No saved signature for user: {0}")]
    SavedSignatureNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Document is not fully signed yet")]
    DocumentIncomplete,

    #[error("A download is already being prepared for this document")]
    CompositeInFlight,

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::DocumentNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Document not found: {}", id))
            }
            ApiError::SavedSignatureNotFound(user) => (
                StatusCode::NOT_FOUND,
                format!("No saved signature for user: {}", user),
            ),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::DocumentIncomplete | ApiError::CompositeInFlight => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ApiError::Workflow(WorkflowError::SignatureRequired) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Workflow(WorkflowError::NotASigner) => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            ApiError::Workflow(WorkflowError::AlreadySigned) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ApiError::Compose(ComposeError::SerializationError(e)) => {
                tracing::error!("PDF serialization error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to produce signed PDF".to_string(),
                )
            }
            ApiError::Compose(e) => {
                tracing::error!("Compose error: {}", e);
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
