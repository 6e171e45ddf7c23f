//! In-process character store.

use std::collections::HashMap;

use async_trait::async_trait;
use sigilforge_domain::{CharacterId, DerivedSnapshot, RawCharacterState};
use tokio::sync::RwLock;

use crate::infrastructure::ports::{CharacterRecord, CharacterStore, StoreError};

/// Keeps every character in memory. Used for local runs and tests; nothing
/// survives a restart.
#[derive(Default)]
pub struct InMemoryCharacterStore {
    records: RwLock<HashMap<CharacterId, CharacterRecord>>,
}

impl InMemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CharacterStore for InMemoryCharacterStore {
    async fn load(&self, id: CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn save_state(
        &self,
        id: CharacterId,
        state: &RawCharacterState,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) => record.state = state.clone(),
            None => {
                records.insert(
                    id,
                    CharacterRecord {
                        state: state.clone(),
                        snapshot: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn save_snapshot(
        &self,
        id: CharacterId,
        snapshot: &DerivedSnapshot,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or_else(|| StoreError::not_found(id))?;
        record.snapshot = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{fighter_state, snapshot_for};

    #[tokio::test]
    async fn save_state_then_load() {
        let store = InMemoryCharacterStore::new();
        let id = CharacterId::new();
        assert!(store.load(id).await.unwrap().is_none());

        store.save_state(id, &fighter_state()).await.unwrap();
        let record = store.load(id).await.unwrap().expect("record");
        assert_eq!(record.state, fighter_state());
        assert!(record.snapshot.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn replacing_state_keeps_snapshot() {
        let store = InMemoryCharacterStore::new();
        let id = CharacterId::new();
        store.save_state(id, &fighter_state()).await.unwrap();
        let snapshot = snapshot_for(id, &fighter_state());
        store.save_snapshot(id, &snapshot).await.unwrap();

        let mut updated = fighter_state();
        updated.level = serde_json::json!(6);
        store.save_state(id, &updated).await.unwrap();

        let record = store.load(id).await.unwrap().expect("record");
        assert_eq!(record.state, updated);
        assert_eq!(record.snapshot, Some(snapshot));
    }

    #[tokio::test]
    async fn snapshot_for_unknown_character_is_not_found() {
        let store = InMemoryCharacterStore::new();
        let id = CharacterId::new();
        let snapshot = snapshot_for(id, &fighter_state());
        let err = store.save_snapshot(id, &snapshot).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.is_empty().await);
    }
}
