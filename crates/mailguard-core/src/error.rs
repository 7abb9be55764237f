// Error taxonomy for the ingestion pipeline

use thiserror::Error;

/// Result type alias for mailguard operations
pub type Result<T> = std::result::Result<T, MailGuardError>;

/// Errors that can occur across the ingestion pipeline
#[derive(Debug, Error)]
pub enum MailGuardError {
    /// Malformed or insufficient payload; always client-facing, never retried
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown device or resource
    #[error("not found: {0}")]
    NotFound(String),

    /// Pool exhausted or schema bootstrap retries exhausted
    #[error("database unavailable: {0}")]
    DatabaseUnavailable(String),

    /// Raised only inside the async consumer; logged and swallowed there
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MailGuardError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        MailGuardError::Validation(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        MailGuardError::NotFound(msg.into())
    }

    /// Create a database-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        MailGuardError::DatabaseUnavailable(msg.into())
    }

    /// Create a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        MailGuardError::Delivery(msg.into())
    }
}
