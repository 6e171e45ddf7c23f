//! SQLite-backed character storage.

use std::sync::Arc;

use async_trait::async_trait;
use sigilforge_domain::{CharacterId, DerivedSnapshot, RawCharacterState};
use sqlx::{Row, SqlitePool};

use crate::infrastructure::ports::{CharacterRecord, CharacterStore, ClockPort, StoreError};

/// SQLite implementation of the character store.
///
/// Base state and snapshot are stored as JSON documents side by side, so a
/// snapshot is always replaced wholesale.
pub struct SqliteCharacterStore {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteCharacterStore {
    pub async fn new(db_path: &str, clock: Arc<dyn ClockPort>) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id TEXT PRIMARY KEY NOT NULL,
                state_json TEXT NOT NULL,
                snapshot_json TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::database("create_schema", e))?;

        tracing::info!(db_path, "SQLite character store ready");
        Ok(Self { pool, clock })
    }
}

#[async_trait]
impl CharacterStore for SqliteCharacterStore {
    async fn load(&self, id: CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        let row = sqlx::query("SELECT state_json, snapshot_json FROM characters WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::database("load", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state_json: String = row.get("state_json");
        let state = serde_json::from_str(&state_json).map_err(StoreError::serialization)?;
        let snapshot_json: Option<String> = row.get("snapshot_json");
        let snapshot = snapshot_json
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::serialization)?;

        Ok(Some(CharacterRecord { state, snapshot }))
    }

    async fn save_state(
        &self,
        id: CharacterId,
        state: &RawCharacterState,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(state).map_err(StoreError::serialization)?;
        let now = self.clock.now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO characters (id, state_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                state_json = excluded.state_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id.to_string())
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database("save_state", e))?;

        Ok(())
    }

    async fn save_snapshot(
        &self,
        id: CharacterId,
        snapshot: &DerivedSnapshot,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot).map_err(StoreError::serialization)?;
        let now = self.clock.now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE characters
            SET snapshot_json = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(json)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database("save_snapshot", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::test_fixtures::{fighter_state, legacy_state, snapshot_for};
    use chrono::{TimeZone, Utc};

    fn written_at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    async fn store_in(dir: &tempfile::TempDir) -> SqliteCharacterStore {
        let path = dir.path().join("characters.db");
        let clock = Arc::new(FixedClock(written_at()));
        SqliteCharacterStore::new(path.to_str().unwrap(), clock)
            .await
            .expect("open store")
    }

    #[tokio::test]
    async fn state_and_snapshot_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = CharacterId::new();
        let snapshot = snapshot_for(id, &fighter_state());
        {
            let store = store_in(&dir).await;
            store.save_state(id, &fighter_state()).await.unwrap();
            store.save_snapshot(id, &snapshot).await.unwrap();
        }

        let store = store_in(&dir).await;
        let record = store.load(id).await.unwrap().expect("record");
        assert_eq!(record.state, fighter_state());
        assert_eq!(record.snapshot, Some(snapshot));
    }

    #[tokio::test]
    async fn legacy_documents_are_stored_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let id = CharacterId::new();
        store.save_state(id, &legacy_state()).await.unwrap();
        let record = store.load(id).await.unwrap().expect("record");
        assert_eq!(record.state, legacy_state());
        assert!(record.snapshot.is_none());
    }

    #[tokio::test]
    async fn writes_are_stamped_with_the_store_clock() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let id = CharacterId::new();
        store.save_state(id, &fighter_state()).await.unwrap();

        let updated_at: String = sqlx::query("SELECT updated_at FROM characters WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("updated_at");
        assert_eq!(updated_at, written_at().to_rfc3339());
    }

    #[tokio::test]
    async fn missing_character_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        assert!(store.load(CharacterId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_without_state_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let id = CharacterId::new();
        let err = store
            .save_snapshot(id, &snapshot_for(id, &fighter_state()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
