//! Normalized character blocks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::value_objects::{AbilityId, DerivedField, ModifierOp};

/// Ability scores keyed by ability.
///
/// Holds every ability the rule set requires, plus any extra abilities the
/// stored sheet carried with well-formed scores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributesBlock {
    scores: BTreeMap<AbilityId, i64>,
}

impl AttributesBlock {
    pub fn new(scores: BTreeMap<AbilityId, i64>) -> Self {
        Self { scores }
    }

    pub fn score(&self, ability: &AbilityId) -> Option<i64> {
        self.scores.get(ability).copied()
    }

    pub fn scores(&self) -> &BTreeMap<AbilityId, i64> {
        &self.scores
    }
}

/// Stored base combat fields, edited only by explicit character edits.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatBlockBase {
    pub max_hit_points: i64,
    pub armor_class: i64,
    pub speed: i64,
    pub initiative_bonus: i64,
    /// Unrecognized scalar fields, kept for display.
    pub extras: BTreeMap<String, Value>,
}

/// Stored base perception and vision ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensesBlockBase {
    pub darkvision: i64,
    pub blindsight: i64,
    pub tremorsense: i64,
    pub truesight: i64,
    pub perception_bonus: i64,
    pub extras: BTreeMap<String, Value>,
}

/// A named contribution an item grants while equipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemBonus {
    pub target: DerivedField,
    pub op: ModifierOp,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub equipped: bool,
    /// Whole weight units.
    pub weight: i64,
    pub bonuses: Vec<ItemBonus>,
    pub resistances: Vec<String>,
    pub extras: BTreeMap<String, Value>,
}

/// Items in stored order. Order matters: it is the equip order used for
/// last-writer-wins overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryBlock {
    pub items: Vec<InventoryItem>,
}

impl InventoryBlock {
    pub fn equipped(&self) -> impl Iterator<Item = &InventoryItem> {
        self.items.iter().filter(|item| item.equipped)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpellcastingBlockBase {
    pub ability: AbilityId,
    pub known_spells: Vec<String>,
    /// Base slot counts by tier (1-based).
    pub slots: BTreeMap<u8, i64>,
    pub extras: BTreeMap<String, Value>,
}

/// One active status effect on the character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionEntry {
    /// Lowercase condition identifier.
    pub id: String,
    /// Severity tier, at least 1.
    pub magnitude: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub extras: BTreeMap<String, Value>,
}

impl ConditionEntry {
    pub fn new(id: impl AsRef<str>, magnitude: u32) -> Self {
        Self {
            id: id.as_ref().trim().to_lowercase(),
            magnitude,
            expires_at: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// An entry expiring exactly at `as_of` is already expired.
    pub fn is_expired_at(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= as_of)
    }
}
