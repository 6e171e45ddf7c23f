//! Repository port traits.

use async_trait::async_trait;
use sigilforge_domain::{CharacterId, DerivedSnapshot, RawCharacterState};

use super::StoreError;

/// A stored character: its base state and the last persisted snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    pub state: RawCharacterState,
    pub snapshot: Option<DerivedSnapshot>,
}

/// Persistence for character base state and derived snapshots.
///
/// Implementations must be read-your-writes per character id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn load(&self, id: CharacterId) -> Result<Option<CharacterRecord>, StoreError>;

    /// Create or replace the base state. The snapshot is left untouched.
    async fn save_state(&self, id: CharacterId, state: &RawCharacterState)
        -> Result<(), StoreError>;

    /// Replace the persisted snapshot wholesale.
    async fn save_snapshot(
        &self,
        id: CharacterId,
        snapshot: &DerivedSnapshot,
    ) -> Result<(), StoreError>;
}
