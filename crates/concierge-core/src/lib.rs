//! Concierge Core - shared types for the concierge service
//!
//! This crate defines the pieces every other crate agrees on:
//! - The error taxonomy surfaced by the persistence and auth layers
//! - Field-level validation results
//! - Configuration management

pub mod config;
pub mod validation;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, PasswordSettings,
    ServerConfig, SessionConfig,
};
pub use validation::FieldErrors;

use sqlx::error::{DatabaseError, ErrorKind};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for concierge operations
#[derive(Error, Debug)]
pub enum ConciergeError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate key violates unique constraint {0}")]
    DuplicateKey(String),

    #[error("edit conflict")]
    EditConflict,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("validation failed: {0}")]
    ValidationFailed(FieldErrors),

    #[error("invalid or missing authentication token")]
    InvalidAuthToken,

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("password hashing error: {0}")]
    Hashing(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConciergeError {
    /// True for failures the client did not cause and cannot fix
    pub fn is_system_error(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::Database(_)
                | Self::Hashing(_)
                | Self::Internal(_)
                | Self::Other(_)
        )
    }
}

impl From<sqlx::Error> for ConciergeError {
    fn from(error: sqlx::Error) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }

        let unique_violation = error
            .as_database_error()
            .filter(|db| matches!(DatabaseError::kind(*db), ErrorKind::UniqueViolation))
            .map(|db| db.constraint().unwrap_or("unknown").to_string());

        match unique_violation {
            Some(constraint) => Self::DuplicateKey(constraint),
            None => Self::Database(error),
        }
    }
}

impl From<FieldErrors> for ConciergeError {
    fn from(errors: FieldErrors) -> Self {
        Self::ValidationFailed(errors)
    }
}

pub type Result<T> = std::result::Result<T, ConciergeError>;
