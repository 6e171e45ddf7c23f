//! Rule set - the configuration tables that drive derivation.
//!
//! Game-balance numbers (which ability feeds which field, what a condition
//! does, how fatigue compounds) are data, never code. A `RuleSet` is loaded
//! by the engine at startup and passed explicitly into every pipeline stage,
//! so the same pipeline serves any rule-set variant and tests can use
//! synthetic tables.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::RuleSetError;
use crate::value_objects::{AbilityId, DerivedField, ModifierOp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Required abilities, in display and resolution order.
    pub abilities: Vec<AbilityId>,
    /// Alternate spellings mapped to canonical abilities (`strength` -> `STR`).
    #[serde(default)]
    pub ability_aliases: BTreeMap<String, AbilityId>,
    pub score_range: ScoreRange,
    pub ability_modifier: AbilityModifierFormula,
    /// Proficiency bonus by level; index 0 is level 1. Levels past the end
    /// use the last entry.
    pub proficiency_by_level: Vec<i64>,
    #[serde(default)]
    pub ability_fields: Vec<AbilityFieldRule>,
    pub defaults: BaseDefaults,
    pub spellcasting: SpellcastingRules,
    #[serde(default)]
    pub conditions: BTreeMap<String, ConditionRule>,
    /// Fatigue ladder; entry 0 is tier 1.
    #[serde(default)]
    pub exhaustion: Vec<ExhaustionTier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: i64,
    pub max: i64,
}

impl ScoreRange {
    pub fn contains(&self, score: i64) -> bool {
        (self.min..=self.max).contains(&score)
    }
}

/// `floor((score - baseline) / divisor)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityModifierFormula {
    pub baseline: i64,
    pub divisor: i64,
}

/// One entry of the ability -> derived field mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityFieldRule {
    pub ability: AbilityId,
    pub field: DerivedField,
    /// Scale the ability modifier by character level (e.g. hit points).
    #[serde(default)]
    pub per_level: bool,
}

/// Base values used when a stored block omits an optional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDefaults {
    pub armor_class: i64,
    pub speed: i64,
    pub passive_perception: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellcastingRules {
    pub save_dc_base: i64,
    pub max_tier: u8,
    #[serde(default)]
    pub bonus_slots: Vec<BonusSlotRule>,
}

/// Extra slots granted when the casting ability modifier reaches a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusSlotRule {
    pub tier: u8,
    pub min_ability_modifier: i64,
    pub slots: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRule {
    /// Stackable conditions apply every instance; others only the
    /// highest-magnitude one.
    #[serde(default)]
    pub stackable: bool,
    #[serde(default)]
    pub effects: Vec<EffectRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExhaustionTier {
    #[serde(default)]
    pub effects: Vec<EffectRule>,
}

/// A modifier template emitted by a condition or an exhaustion tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectRule {
    pub target: DerivedField,
    pub op: ModifierOp,
    pub amount: i64,
    /// Multiply the amount by the condition's magnitude. Ignored for
    /// exhaustion tiers, which are already one entry per level.
    #[serde(default)]
    pub per_magnitude: bool,
}

impl RuleSet {
    /// Canonical ability for a stored key, honoring aliases.
    pub fn canonical_ability(&self, key: &str) -> AbilityId {
        let normalized = key.trim().to_lowercase();
        self.ability_aliases
            .iter()
            .find(|(alias, _)| alias.trim().to_lowercase() == normalized)
            .map(|(_, ability)| ability.clone())
            .unwrap_or_else(|| AbilityId::new(key))
    }

    pub fn is_known_ability(&self, ability: &AbilityId) -> bool {
        self.abilities.contains(ability)
    }

    pub fn ability_modifier(&self, score: i64) -> i64 {
        (score - self.ability_modifier.baseline).div_euclid(self.ability_modifier.divisor)
    }

    pub fn proficiency_bonus(&self, level: u32) -> i64 {
        let index = (level.max(1) - 1) as usize;
        self.proficiency_by_level
            .get(index)
            .or_else(|| self.proficiency_by_level.last())
            .copied()
            .unwrap_or(0)
    }

    pub fn condition(&self, id: &str) -> Option<&ConditionRule> {
        self.conditions.get(id)
    }

    pub fn max_exhaustion(&self) -> u32 {
        self.exhaustion.len() as u32
    }

    /// Whether a field can be targeted at all under this rule set.
    pub fn allows_field(&self, field: DerivedField) -> bool {
        match field.spell_tier() {
            Some(tier) => tier >= 1 && tier <= self.spellcasting.max_tier,
            None => true,
        }
    }

    /// Check internal consistency. Called once when the rule set is loaded.
    pub fn validate(&self) -> Result<(), RuleSetError> {
        if self.abilities.is_empty() {
            return Err(RuleSetError::invalid("at least one ability is required"));
        }
        let mut seen = BTreeSet::new();
        for ability in &self.abilities {
            if !seen.insert(ability) {
                return Err(RuleSetError::invalid(format!("duplicate ability {ability}")));
            }
        }
        for (alias, ability) in &self.ability_aliases {
            if !self.is_known_ability(ability) {
                return Err(RuleSetError::invalid(format!(
                    "alias `{alias}` points at unknown ability {ability}"
                )));
            }
        }
        if self.score_range.min > self.score_range.max {
            return Err(RuleSetError::invalid("score range minimum exceeds maximum"));
        }
        if self.ability_modifier.divisor <= 0 {
            return Err(RuleSetError::invalid("ability modifier divisor must be positive"));
        }
        if self.proficiency_by_level.is_empty() {
            return Err(RuleSetError::invalid("proficiency table is empty"));
        }
        if self.spellcasting.max_tier == 0 {
            return Err(RuleSetError::invalid("spellcasting max tier must be at least 1"));
        }
        for mapping in &self.ability_fields {
            if !self.is_known_ability(&mapping.ability) {
                return Err(RuleSetError::invalid(format!(
                    "ability field mapping uses unknown ability {}",
                    mapping.ability
                )));
            }
            self.check_target(mapping.field, "ability field mapping")?;
        }
        for bonus in &self.spellcasting.bonus_slots {
            self.check_target(DerivedField::SpellSlots(bonus.tier), "bonus slot rule")?;
        }
        for (id, condition) in &self.conditions {
            if id.trim().to_lowercase() != *id {
                return Err(RuleSetError::invalid(format!(
                    "condition id `{id}` must be lowercase"
                )));
            }
            for effect in &condition.effects {
                self.check_effect(effect, &format!("condition `{id}`"))?;
            }
        }
        for (index, tier) in self.exhaustion.iter().enumerate() {
            for effect in &tier.effects {
                self.check_effect(effect, &format!("exhaustion tier {}", index + 1))?;
            }
        }
        Ok(())
    }

    fn check_effect(&self, effect: &EffectRule, context: &str) -> Result<(), RuleSetError> {
        self.check_target(effect.target, context)?;
        if effect.op == ModifierOp::Multiplicative && effect.amount < 0 {
            return Err(RuleSetError::invalid(format!(
                "{context}: multiplicative percentage cannot be negative"
            )));
        }
        Ok(())
    }

    fn check_target(&self, field: DerivedField, context: &str) -> Result<(), RuleSetError> {
        if self.allows_field(field) {
            Ok(())
        } else {
            Err(RuleSetError::invalid(format!(
                "{context}: {field} is outside spell tiers 1..={}",
                self.spellcasting.max_tier
            )))
        }
    }
}
