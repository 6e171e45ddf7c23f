//! DerivedField - the closed catalog of computed snapshot values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A computed output value of the snapshot.
///
/// Variant order is the composition order: the compositor walks fields in
/// `Ord` order, so a field may only ever rely on fields declared before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DerivedField {
    ProficiencyBonus,
    ArmorClass,
    Initiative,
    MaxHitPoints,
    Speed,
    CarriedWeight,
    PassivePerception,
    Darkvision,
    Blindsight,
    Tremorsense,
    Truesight,
    SpellSaveDc,
    SpellAttackBonus,
    /// Slot count for a spell tier (1-based).
    SpellSlots(u8),
}

impl DerivedField {
    /// Fields present on every snapshot, casters or not.
    pub const CORE: [DerivedField; 11] = [
        Self::ProficiencyBonus,
        Self::ArmorClass,
        Self::Initiative,
        Self::MaxHitPoints,
        Self::Speed,
        Self::CarriedWeight,
        Self::PassivePerception,
        Self::Darkvision,
        Self::Blindsight,
        Self::Tremorsense,
        Self::Truesight,
    ];

    /// Whether the field only exists for characters with a spellcasting block.
    pub fn is_spellcasting(&self) -> bool {
        matches!(
            self,
            Self::SpellSaveDc | Self::SpellAttackBonus | Self::SpellSlots(_)
        )
    }

    /// A required field must receive a base value (or an override);
    /// falling back to zero would hide a configuration bug.
    pub fn is_required(&self) -> bool {
        matches!(self, Self::ArmorClass | Self::MaxHitPoints | Self::Speed)
    }

    /// Lowest value the field can take after clamping.
    pub fn natural_floor(&self) -> Option<i64> {
        match self {
            Self::Initiative | Self::SpellAttackBonus => None,
            Self::MaxHitPoints => Some(1),
            _ => Some(0),
        }
    }

    pub fn spell_tier(&self) -> Option<u8> {
        match self {
            Self::SpellSlots(tier) => Some(*tier),
            _ => None,
        }
    }
}

impl fmt::Display for DerivedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProficiencyBonus => f.write_str("proficiencyBonus"),
            Self::ArmorClass => f.write_str("armorClass"),
            Self::Initiative => f.write_str("initiative"),
            Self::MaxHitPoints => f.write_str("maxHitPoints"),
            Self::Speed => f.write_str("speed"),
            Self::CarriedWeight => f.write_str("carriedWeight"),
            Self::PassivePerception => f.write_str("passivePerception"),
            Self::Darkvision => f.write_str("darkvision"),
            Self::Blindsight => f.write_str("blindsight"),
            Self::Tremorsense => f.write_str("tremorsense"),
            Self::Truesight => f.write_str("truesight"),
            Self::SpellSaveDc => f.write_str("spellSaveDc"),
            Self::SpellAttackBonus => f.write_str("spellAttackBonus"),
            Self::SpellSlots(tier) => write!(f, "spellSlots.{tier}"),
        }
    }
}

impl FromStr for DerivedField {
    type Err = ParseError;

    /// Accepts the canonical camelCase names plus snake_case and the short
    /// legacy spellings found in older sheets (`ac`, `max_hp`, `spell_slots_3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | '.' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        let field = match key.as_str() {
            "proficiencybonus" | "proficiency" => Self::ProficiencyBonus,
            "armorclass" | "ac" => Self::ArmorClass,
            "initiative" => Self::Initiative,
            "maxhitpoints" | "maxhp" | "hitpoints" | "hp" => Self::MaxHitPoints,
            "speed" => Self::Speed,
            "carriedweight" | "weight" => Self::CarriedWeight,
            "passiveperception" => Self::PassivePerception,
            "darkvision" => Self::Darkvision,
            "blindsight" => Self::Blindsight,
            "tremorsense" => Self::Tremorsense,
            "truesight" => Self::Truesight,
            "spellsavedc" | "savedc" => Self::SpellSaveDc,
            "spellattackbonus" | "spellattack" => Self::SpellAttackBonus,
            other => {
                let tier = other
                    .strip_prefix("spellslots")
                    .and_then(|rest| rest.parse::<u8>().ok())
                    .filter(|tier| *tier >= 1)
                    .ok_or_else(|| ParseError::new("derived field", s))?;
                Self::SpellSlots(tier)
            }
        };
        Ok(field)
    }
}

impl TryFrom<String> for DerivedField {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DerivedField> for String {
    fn from(value: DerivedField) -> Self {
        value.to_string()
    }
}
