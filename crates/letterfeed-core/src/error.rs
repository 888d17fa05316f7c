//! Error types for the core library.

use thiserror::Error;

use crate::service::MailServiceError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Mail server operation failed.
    #[error("Mail service error: {0}")]
    MailService(#[from] MailServiceError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record with the same unique key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
