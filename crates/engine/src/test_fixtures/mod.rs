//! Test fixtures: rule set, stored character documents and a scripted
//! store for driving the coordinator through failure and timing scenarios.
//!
//! Character documents live under `test_data/characters/`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sigilforge_domain::{
    derive_snapshot, CharacterId, DerivationRequest, DerivedSnapshot, RawCharacterState, RuleSet,
};
use tokio::sync::Semaphore;

use crate::infrastructure::persistence::InMemoryCharacterStore;
use crate::infrastructure::ports::{CharacterRecord, CharacterStore, StoreError};
use crate::infrastructure::rules::parse_rule_set;

pub const SAMPLE_RULES_JSON: &str = include_str!("../../../../config/rules.sample.json");

// =============================================================================
// Fixture Loading
// =============================================================================

/// Load a JSON fixture from the test_data/ directory.
///
/// # Panics
///
/// Panics if the fixture file cannot be read or parsed.
pub fn load_fixture<T: serde::de::DeserializeOwned>(path: &str) -> T {
    let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(path);
    let content = std::fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture '{}': {}",
            fixture_path.display(),
            e
        )
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        panic!(
            "Failed to parse fixture '{}': {}",
            fixture_path.display(),
            e
        )
    })
}

pub fn sample_rules() -> RuleSet {
    parse_rule_set(SAMPLE_RULES_JSON).expect("sample rule set is valid")
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

// =============================================================================
// Character Fixtures
// =============================================================================

/// Level 5 fighter, current document shape, two equipped items.
pub fn fighter_state() -> RawCharacterState {
    load_fixture("characters/fighter.json")
}

/// Level 5 wizard with INT casting and three slot tiers.
pub fn wizard_state() -> RawCharacterState {
    load_fixture("characters/wizard.json")
}

/// Level 3 character stored with every legacy block shape.
pub fn legacy_state() -> RawCharacterState {
    load_fixture("characters/legacy.json")
}

/// Derive a first-version snapshot with the sample rules.
pub fn snapshot_for(id: CharacterId, state: &RawCharacterState) -> DerivedSnapshot {
    derive_snapshot(DerivationRequest {
        character_id: id,
        raw: state,
        rules: &sample_rules(),
        as_of: fixed_now(),
        previous_version: None,
    })
    .expect("fixture derives")
}

// =============================================================================
// Scripted Store
// =============================================================================

/// In-memory store that counts calls, can fail snapshot writes a set
/// number of times, and can hold loads for one character until released.
#[derive(Default)]
pub struct ScriptedStore {
    inner: InMemoryCharacterStore,
    loads: AtomicUsize,
    snapshot_attempts: AtomicUsize,
    snapshot_failures: AtomicU32,
    gate: Mutex<Option<(CharacterId, Arc<Semaphore>)>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_character(id: CharacterId, state: &RawCharacterState) -> Self {
        let store = Self::new();
        store.inner.save_state(id, state).await.unwrap();
        store
    }

    /// Fail the next `count` snapshot writes with a retryable error.
    pub fn fail_snapshot_saves(&self, count: u32) {
        self.snapshot_failures.store(count, Ordering::SeqCst);
    }

    /// Hold every load of `id` until a permit is added to the returned
    /// semaphore.
    pub fn gate_loads(&self, id: CharacterId) -> Arc<Semaphore> {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some((id, Arc::clone(&semaphore)));
        semaphore
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn snapshot_attempts(&self) -> usize {
        self.snapshot_attempts.load(Ordering::SeqCst)
    }

    pub async fn stored(&self, id: CharacterId) -> Option<CharacterRecord> {
        self.inner.load(id).await.unwrap()
    }
}

#[async_trait]
impl CharacterStore for ScriptedStore {
    async fn load(&self, id: CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .gate
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(gated, _)| *gated == id)
            .map(|(_, semaphore)| Arc::clone(semaphore));
        if let Some(semaphore) = gate {
            semaphore.acquire().await.unwrap().forget();
        }
        self.inner.load(id).await
    }

    async fn save_state(
        &self,
        id: CharacterId,
        state: &RawCharacterState,
    ) -> Result<(), StoreError> {
        self.inner.save_state(id, state).await
    }

    async fn save_snapshot(
        &self,
        id: CharacterId,
        snapshot: &DerivedSnapshot,
    ) -> Result<(), StoreError> {
        self.snapshot_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .snapshot_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::database("save_snapshot", "database is locked"));
        }
        self.inner.save_snapshot(id, snapshot).await
    }
}
