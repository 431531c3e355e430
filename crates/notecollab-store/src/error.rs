//! Error types for the storage layer.

use notecollab_core::NoteId;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    /// Note not found.
    #[error("note not found: {0}")]
    NoteNotFound(NoteId),

    /// A grant with the same token already exists.
    #[error("duplicate share token")]
    DuplicateToken,

    /// A stored row could not be mapped to a domain type.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// Migration error.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
