// src/error.rs
use crate::completion_client::CompletionError;
use crate::models::auth::ErrorResponse;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Failure of a chat operation, tagged by where it happened.
///
/// `ValidationFailed` and `NotFound` are raised before anything is written.
/// `CompletionFailed` is raised after the user message of a send is already
/// durable, so callers must not re-send the same content.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Conversation not found")]
    NotFound,
    #[error("Completion failed: {0}")]
    CompletionFailed(#[from] CompletionError),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ChatError::NotFound => StatusCode::NOT_FOUND,
            ChatError::CompletionFailed(_) => StatusCode::BAD_GATEWAY,
            ChatError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let message = match &self {
            ChatError::ValidationFailed(reason) => reason.clone(),
            ChatError::NotFound => "Conversation not found".to_string(),
            ChatError::CompletionFailed(e) => {
                tracing::warn!(error = %e, "completion failed after user message was saved");
                "The assistant could not reply. Your message was saved.".to_string()
            }
            ChatError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "store unavailable");
                "Server error".to_string()
            }
        };

        (self.status_code(), Json(ErrorResponse::new(message))).into_response()
    }
}
