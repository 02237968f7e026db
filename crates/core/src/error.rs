//! Shared error model.

use thiserror::Error;

/// Result type used across the comptoir crates.
pub type CoreResult<T> = Result<T, CoreError>;

/// Client-side foundation error.
///
/// Keep this focused on deterministic failures of the shared primitives
/// (identifier parsing, malformed context values). Transport and storage
/// concerns live in `comptoir-offline`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A context value failed validation (e.g. malformed header value).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
