use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::backend::BackendError;
use crate::grid::GridError;
use crate::validation::ValidationErrors;

/// Failure of a registry or editor action, carrying the message the user sees.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Invalid(#[from] ValidationErrors),
    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: BackendError,
    },
    #[error("{0}")]
    Rejected(String),
    #[error("Action cancelled")]
    Cancelled,
}

impl ActionError {
    pub fn backend(message: impl Into<String>, source: BackendError) -> Self {
        Self::Backend {
            message: message.into(),
            source,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    ConfirmationRequired(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::ConfirmationRequired(msg) => {
                (StatusCode::PRECONDITION_REQUIRED, msg).into_response()
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl ApiError {
    fn from_backend(message: String, source: &BackendError) -> Self {
        match source.status() {
            Some(StatusCode::UNAUTHORIZED) => ApiError::Unauthorized(message),
            Some(StatusCode::FORBIDDEN) => ApiError::Forbidden(message),
            Some(StatusCode::NOT_FOUND) => ApiError::NotFound(message),
            Some(StatusCode::BAD_REQUEST) => ApiError::BadRequest(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(value: BackendError) -> Self {
        error!(error = %value, "backend request failed");
        ApiError::from_backend("Failed to load timetable".into(), &value)
    }
}

impl From<ActionError> for ApiError {
    fn from(value: ActionError) -> Self {
        match value {
            ActionError::Invalid(errors) => ApiError::BadRequest(errors.to_string()),
            ActionError::Backend { message, source } => ApiError::from_backend(message, &source),
            ActionError::Rejected(msg) => ApiError::BadRequest(msg),
            ActionError::Cancelled => {
                ApiError::ConfirmationRequired("Confirmation is required, pass confirm=true".into())
            }
        }
    }
}

impl From<GridError> for ApiError {
    fn from(value: GridError) -> Self {
        ApiError::Internal(value.to_string())
    }
}
