//! Modifier resolver.

use crate::character::CharacterState;
use crate::error::CompositionError;
use crate::rules::RuleSet;
use crate::value_objects::{DerivedField, Modifier, ModifierSource};

/// Collect base modifiers in fixed order: level, attributes, equipment,
/// spellcasting.
///
/// Conditions and exhaustion are layered on afterwards by
/// `apply_conditions_and_exhaustion`. Fails only when a per-level amount
/// does not fit in an `i64`.
pub fn resolve_modifiers(
    state: &CharacterState,
    rules: &RuleSet,
) -> Result<Vec<Modifier>, CompositionError> {
    let mut modifiers = Vec::new();
    let proficiency = rules.proficiency_bonus(state.level);

    modifiers.push(Modifier::additive(
        ModifierSource::level(state.level),
        DerivedField::ProficiencyBonus,
        proficiency,
    ));

    for ability in &rules.abilities {
        let Some(score) = state.attributes.score(ability) else {
            continue;
        };
        let ability_modifier = rules.ability_modifier(score);
        for mapping in rules.ability_fields.iter().filter(|m| &m.ability == ability) {
            let amount = if mapping.per_level {
                ability_modifier
                    .checked_mul(i64::from(state.level))
                    .ok_or_else(|| CompositionError::new(mapping.field, "per-level amount overflows"))?
            } else {
                ability_modifier
            };
            modifiers.push(Modifier::additive(
                ModifierSource::attribute(ability),
                mapping.field,
                amount,
            ));
        }
    }

    for item in state.inventory.equipped() {
        for bonus in &item.bonuses {
            modifiers.push(Modifier::new(
                ModifierSource::equipment(&item.id),
                bonus.target,
                bonus.op,
                bonus.amount,
            ));
        }
        if item.weight != 0 {
            modifiers.push(Modifier::additive(
                ModifierSource::equipment(&item.id),
                DerivedField::CarriedWeight,
                item.weight,
            ));
        }
    }

    if let Some(spellcasting) = &state.spellcasting {
        let casting_modifier = state
            .attributes
            .score(&spellcasting.ability)
            .map(|score| rules.ability_modifier(score))
            .unwrap_or(0);

        for field in [DerivedField::SpellSaveDc, DerivedField::SpellAttackBonus] {
            modifiers.push(Modifier::additive(
                ModifierSource::spellcasting(spellcasting.ability.as_str()),
                field,
                casting_modifier,
            ));
            modifiers.push(Modifier::additive(
                ModifierSource::spellcasting("proficiency"),
                field,
                proficiency,
            ));
        }

        for bonus in &rules.spellcasting.bonus_slots {
            if casting_modifier >= bonus.min_ability_modifier {
                modifiers.push(Modifier::additive(
                    ModifierSource::spellcasting("bonusSlots"),
                    DerivedField::SpellSlots(bonus.tier),
                    bonus.slots,
                ));
            }
        }
    }

    Ok(modifiers)
}
