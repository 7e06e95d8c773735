//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use concierge_core::{ConciergeError, FieldErrors};
use serde::{Deserialize, Serialize};

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Per-field validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fields: None,
        }
    }

    pub fn with_fields(mut self, fields: FieldErrors) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn invalid_token() -> Self {
        Self::new(
            "INVALID_AUTH_TOKEN",
            "invalid or missing authentication token",
        )
    }

    pub fn invalid_credentials() -> Self {
        Self::new("INVALID_CREDENTIALS", "invalid authentication credentials")
    }

    pub fn internal_error() -> Self {
        Self::new(
            "INTERNAL_ERROR",
            "the server encountered a problem and could not process your request",
        )
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    /// Session bearer was malformed or matched no live token
    InvalidToken,
    InvalidCredentials,
    Conflict(String),
    Validation(FieldErrors),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(resource) => (StatusCode::NOT_FOUND, ApiError::not_found(&resource)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, ApiError::invalid_token()),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, ApiError::invalid_credentials())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ApiError::new("CONFLICT", msg)),
            AppError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::new("VALIDATION_FAILED", "request contains invalid fields")
                    .with_fields(fields),
            ),
            AppError::Internal(msg) => {
                // Details stay in the log
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<ConciergeError> for AppError {
    fn from(err: ConciergeError) -> Self {
        match err {
            ConciergeError::NotFound => AppError::NotFound("record".to_string()),
            ConciergeError::ValidationFailed(fields) => AppError::Validation(fields),
            ConciergeError::InvalidAuthToken => AppError::InvalidToken,
            ConciergeError::DuplicateKey(constraint) => {
                AppError::Conflict(format!("duplicate value violates {constraint}"))
            }
            ConciergeError::EditConflict => AppError::Conflict(
                "unable to update the record due to an edit conflict, please try again"
                    .to_string(),
            ),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(fields: FieldErrors) -> Self {
        AppError::Validation(fields)
    }
}

impl From<crate::auth::password::PasswordError> for AppError {
    fn from(err: crate::auth::password::PasswordError) -> Self {
        AppError::from(ConciergeError::from(err))
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        AppError::Internal(format!("session error: {err}"))
    }
}

impl From<crate::templates::TemplateError> for AppError {
    fn from(err: crate::templates::TemplateError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
