//! Error types for port operations.

/// Character store errors with context for debugging.
///
/// Messages are kept as strings so the error can be cloned to every caller
/// sharing one recompute.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Character not found - includes the ID for actionable error messages.
    #[error("Character not found in store: {0}")]
    NotFound(String),

    /// Database operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// The backing store could not be reached at all.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound(id.to_string())
    }

    /// Create a Database error with operation context.
    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    /// Transient failures worth retrying; a missing row or a corrupt
    /// document will not fix itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database { .. } | Self::Unavailable(_))
    }
}
