//! Recompute operation errors.

use sigilforge_domain::{CharacterId, CompositionError, DerivationError, SchemaError};

use crate::infrastructure::ports::StoreError;

/// Errors that can occur while recomputing a snapshot.
///
/// Cloneable so every caller coalesced onto one computation receives the
/// same outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecomputeError {
    #[error("Character not found: {0}")]
    NotFound(CharacterId),

    #[error("Invalid character state: {0}")]
    Schema(#[from] SchemaError),

    #[error("Snapshot composition failed: {0}")]
    Composition(#[from] CompositionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Recompute task aborted: {0}")]
    Aborted(String),
}

impl From<DerivationError> for RecomputeError {
    fn from(err: DerivationError) -> Self {
        match err {
            DerivationError::Schema(e) => Self::Schema(e),
            DerivationError::Composition(e) => Self::Composition(e),
        }
    }
}
