//! DerivedSnapshot - the immutable, versioned output of a recompute.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::CharacterId;
use crate::value_objects::{AbilityId, AbilityScore, DerivedField, Modifier};

/// Base and final value of one derived field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    pub field: DerivedField,
    pub base: i64,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatStats {
    pub proficiency_bonus: i64,
    pub armor_class: i64,
    pub initiative: i64,
    pub max_hit_points: i64,
    pub speed: i64,
    pub carried_weight: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensesStats {
    pub passive_perception: i64,
    pub darkvision: i64,
    pub blindsight: i64,
    pub tremorsense: i64,
    pub truesight: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellcastingStats {
    pub ability: AbilityId,
    pub save_dc: i64,
    pub attack_bonus: i64,
    /// Slot counts by tier; tiers with no slots are omitted.
    pub slots: BTreeMap<u8, i64>,
    pub known_spells: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Value>,
}

/// Display fields carried over from the stored combat and senses blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockExtras {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub combat: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub senses: BTreeMap<String, Value>,
}

/// One carried item as the sheet lists it, equipped or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
    pub equipped: bool,
    pub weight: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Value>,
}

/// A condition that contributed to the snapshot after expiry and
/// duplicate handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveCondition {
    pub id: String,
    /// Highest magnitude among the applied instances.
    pub magnitude: u32,
    /// 1 for non-stackable conditions.
    pub instances: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Value>,
}

/// Everything the character sheet shows, computed in one pass.
///
/// A snapshot is never edited: each recompute builds a fresh one that
/// replaces the previous snapshot wholesale. Consumers share it through
/// an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSnapshot {
    pub(crate) character_id: CharacterId,
    pub(crate) version: u64,
    pub(crate) computed_at: DateTime<Utc>,
    pub(crate) level: u32,
    pub(crate) abilities: Vec<AbilityScore>,
    pub(crate) combat: CombatStats,
    pub(crate) senses: SensesStats,
    pub(crate) spellcasting: Option<SpellcastingStats>,
    pub(crate) inventory: Vec<ItemSummary>,
    pub(crate) resistances: Vec<String>,
    pub(crate) conditions: Vec<EffectiveCondition>,
    pub(crate) exhaustion_level: u32,
    pub(crate) fields: Vec<FieldValue>,
    pub(crate) modifiers: Vec<Modifier>,
    #[serde(default)]
    pub(crate) extras: BlockExtras,
}

impl DerivedSnapshot {
    pub fn character_id(&self) -> CharacterId {
        self.character_id
    }

    /// Monotonically increasing per character, starting at 1.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn abilities(&self) -> &[AbilityScore] {
        &self.abilities
    }

    pub fn ability(&self, ability: &AbilityId) -> Option<&AbilityScore> {
        self.abilities.iter().find(|score| &score.ability == ability)
    }

    pub fn combat(&self) -> &CombatStats {
        &self.combat
    }

    pub fn senses(&self) -> &SensesStats {
        &self.senses
    }

    pub fn spellcasting(&self) -> Option<&SpellcastingStats> {
        self.spellcasting.as_ref()
    }

    /// Every carried item in stored order.
    pub fn inventory(&self) -> &[ItemSummary] {
        &self.inventory
    }

    pub fn extras(&self) -> &BlockExtras {
        &self.extras
    }

    pub fn resistances(&self) -> &[String] {
        &self.resistances
    }

    pub fn conditions(&self) -> &[EffectiveCondition] {
        &self.conditions
    }

    pub fn exhaustion_level(&self) -> u32 {
        self.exhaustion_level
    }

    /// Per-field breakdown in composition order.
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Final value of a derived field, if the snapshot has it.
    pub fn field(&self, field: DerivedField) -> Option<i64> {
        self.fields
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.value)
    }

    /// Every modifier that went into the snapshot, in application order.
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn modifiers_for(&self, field: DerivedField) -> impl Iterator<Item = &Modifier> {
        self.modifiers
            .iter()
            .filter(move |modifier| modifier.target() == field)
    }

    /// Equal in every derived value, ignoring version and timestamp.
    pub fn same_derivation(&self, other: &DerivedSnapshot) -> bool {
        self.character_id == other.character_id
            && self.level == other.level
            && self.abilities == other.abilities
            && self.combat == other.combat
            && self.senses == other.senses
            && self.spellcasting == other.spellcasting
            && self.inventory == other.inventory
            && self.resistances == other.resistances
            && self.conditions == other.conditions
            && self.exhaustion_level == other.exhaustion_level
            && self.fields == other.fields
            && self.modifiers == other.modifiers
            && self.extras == other.extras
    }
}
