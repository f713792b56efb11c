//! Error types for the ContextWeave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum; only
//! [`ContextError`] is ever surfaced to callers of the engine.

use thiserror::Error;

/// The top-level error type returned by context aggregation.
///
/// Almost every failure inside the pipeline degrades to a smaller pack
/// instead of an error. The variants here are the few that cannot.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Storage could not be reached at all, so no bundle can be built.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using [`ContextError`].
pub type Result<T> = std::result::Result<T, ContextError>;

// --- Collaborator errors ---

/// Errors raised by a [`crate::store::RecordStore`].
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached (pool closed, file missing, network down).
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A single category query failed. Callers degrade that category to empty.
    #[error("Query failed on {category}: {reason}")]
    Query { category: String, reason: String },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Import failed: {0}")]
    ImportFailed(String),
}

/// Errors raised by a [`crate::embedding::EmbeddingService`].
///
/// None of these are fatal; the relevance resolver treats every variant
/// as "this tier is unavailable".
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding quota exhausted, retry after {retry_after_secs}s")]
    QuotaExhausted { retry_after_secs: u64 },

    #[error("Embedding API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding service not configured: {0}")]
    NotConfigured(String),
}
