//! Block validators.
//!
//! Each stored block is normalized by its own validator into the strict
//! representation the pipeline uses. Legacy shapes are coerced here and
//! only here; derivation code never sees raw JSON. Anything that cannot be
//! normalized without guessing is a `SchemaError`: a visible error beats a
//! wrong number on the sheet.

mod attributes;
mod coerce;
mod combat;
mod conditions;
mod inventory;
mod spellcasting;

pub use attributes::validate_attributes;
pub use combat::{validate_combat, validate_senses};
pub use conditions::{validate_conditions, validate_exhaustion, NormalizedConditions};
pub use inventory::validate_inventory;
pub use spellcasting::validate_spellcasting;

use serde_json::Value;

use crate::character::{CharacterState, RawCharacterState};
use crate::error::{BlockKind, SchemaError};
use crate::rules::RuleSet;

/// Level must be a positive integer.
pub fn validate_level(raw: &Value) -> Result<u32, SchemaError> {
    if raw.is_null() {
        return Err(SchemaError::new(BlockKind::Level, "level", "level is missing"));
    }
    let level = coerce::as_u32(raw, BlockKind::Level, "level")?;
    if level == 0 {
        return Err(SchemaError::new(
            BlockKind::Level,
            "level",
            "level must be at least 1",
        ));
    }
    Ok(level)
}

/// Normalize every block of a stored character, in fixed order, stopping
/// at the first failure.
pub fn normalize_state(raw: &RawCharacterState, rules: &RuleSet) -> Result<CharacterState, SchemaError> {
    let level = validate_level(&raw.level)?;
    let attributes = validate_attributes(&raw.attributes, rules)?;
    let combat = validate_combat(&raw.combat, rules)?;
    let senses = validate_senses(&raw.senses)?;
    let inventory = validate_inventory(&raw.inventory, rules)?;
    let spellcasting = validate_spellcasting(&raw.spellcasting, rules)?;
    let conditions = validate_conditions(&raw.conditions)?;
    let exhaustion_level = validate_exhaustion(&raw.exhaustion_level, &conditions, rules)?;

    Ok(CharacterState {
        level,
        attributes,
        combat,
        senses,
        inventory,
        spellcasting,
        conditions: conditions.entries,
        exhaustion_level,
        timed_exhaustion: conditions.timed_exhaustion,
    })
}
