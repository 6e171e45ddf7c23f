//! Character state: the stored (raw) document and its normalized form.

mod blocks;

pub use blocks::{
    AttributesBlock, CombatBlockBase, ConditionEntry, InventoryBlock, InventoryItem, ItemBonus,
    SensesBlockBase, SpellcastingBlockBase,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A character's base state exactly as persisted.
///
/// Every block is kept as an untyped JSON document because older records
/// carry legacy shapes. Nothing reads these values directly; they go
/// through `validation::normalize_state` first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCharacterState {
    #[serde(default)]
    pub level: Value,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub combat: Value,
    #[serde(default)]
    pub senses: Value,
    #[serde(default)]
    pub inventory: Value,
    #[serde(default)]
    pub spellcasting: Value,
    #[serde(default)]
    pub conditions: Value,
    #[serde(default, alias = "exhaustion", alias = "exhaustion_level")]
    pub exhaustion_level: Value,
}

/// A character's base state after every block has been normalized.
///
/// The pipeline reads it and never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterState {
    pub level: u32,
    pub attributes: AttributesBlock,
    pub combat: CombatBlockBase,
    pub senses: SensesBlockBase,
    pub inventory: InventoryBlock,
    pub spellcasting: Option<SpellcastingBlockBase>,
    pub conditions: Vec<ConditionEntry>,
    pub exhaustion_level: u32,
    /// Legacy `exhaustion` condition entries that carry an expiry. They
    /// raise the level only while unexpired.
    pub timed_exhaustion: Vec<ConditionEntry>,
}

impl CharacterState {
    /// Exhaustion level in force at `as_of`.
    pub fn exhaustion_at(&self, as_of: DateTime<Utc>) -> u32 {
        self.timed_exhaustion
            .iter()
            .filter(|entry| !entry.is_expired_at(as_of))
            .map(|entry| entry.magnitude)
            .fold(self.exhaustion_level, u32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_state_accepts_legacy_exhaustion_key() {
        let raw: RawCharacterState =
            serde_json::from_str(r#"{"level": 3, "exhaustion": 2}"#).unwrap();
        assert_eq!(raw.level, Value::from(3));
        assert_eq!(raw.exhaustion_level, Value::from(2));
        assert_eq!(raw.attributes, Value::Null);
    }
}
