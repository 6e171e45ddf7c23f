//! Spellcasting block validator.

use std::collections::BTreeMap;

use serde_json::Value;

use super::coerce::{as_int, as_non_negative, as_object, keep_extra, kind_of, normalize_key};
use crate::character::SpellcastingBlockBase;
use crate::error::{BlockKind, SchemaError};
use crate::rules::RuleSet;
use crate::value_objects::AbilityId;

const BLOCK: BlockKind = BlockKind::Spellcasting;

/// A missing block means the character does not cast.
///
/// Accepted shapes: `ability` (or legacy `castingAbility` /
/// `spellcastingAbility`), `knownSpells` (or `spells`), and `slots` either
/// as `{ "1": 4, "2": 2 }` or as a legacy array indexed from tier 1.
pub fn validate_spellcasting(
    raw: &Value,
    rules: &RuleSet,
) -> Result<Option<SpellcastingBlockBase>, SchemaError> {
    if raw.is_null() {
        return Ok(None);
    }
    let map = as_object(raw, BLOCK, "")?;

    let mut ability = None;
    let mut known_spells = Vec::new();
    let mut slots = BTreeMap::new();
    let mut extras = BTreeMap::new();

    for (key, value) in map {
        match normalize_key(key).as_str() {
            "ability" | "castingability" | "spellcastingability" => {
                let name = value.as_str().ok_or_else(|| {
                    SchemaError::new(BLOCK, key.as_str(), "expected an ability name")
                })?;
                let canonical = rules.canonical_ability(name);
                if !rules.is_known_ability(&canonical) {
                    return Err(SchemaError::new(
                        BLOCK,
                        key.as_str(),
                        format!("unknown casting ability {canonical}"),
                    ));
                }
                ability = Some(canonical);
            }
            "knownspells" | "spells" => known_spells = validate_spell_list(value, key)?,
            "slots" | "spellslots" => slots = validate_slots(value, rules, key)?,
            _ => keep_extra(&mut extras, key, value, BLOCK, key)?,
        }
    }

    let ability: AbilityId =
        ability.ok_or_else(|| SchemaError::new(BLOCK, "ability", "casting ability is missing"))?;

    Ok(Some(SpellcastingBlockBase {
        ability,
        known_spells,
        slots,
        extras,
    }))
}

fn validate_spell_list(raw: &Value, path: &str) -> Result<Vec<String>, SchemaError> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry.as_str().map(|s| s.trim().to_string()).ok_or_else(|| {
                    SchemaError::new(BLOCK, format!("{path}[{index}]"), "expected a spell name")
                })
            })
            .collect(),
        other => Err(SchemaError::new(
            BLOCK,
            path,
            format!("expected an array of spell names, found {}", kind_of(other)),
        )),
    }
}

fn validate_slots(raw: &Value, rules: &RuleSet, path: &str) -> Result<BTreeMap<u8, i64>, SchemaError> {
    let mut slots = BTreeMap::new();
    let mut insert = |tier_label: &str, count: &Value| -> Result<(), SchemaError> {
        let field = format!("{path}.{tier_label}");
        let tier = tier_label
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|tier| (1..=rules.spellcasting.max_tier).contains(tier))
            .ok_or_else(|| {
                SchemaError::new(
                    BLOCK,
                    &field,
                    format!("slot tier must be in 1..={}", rules.spellcasting.max_tier),
                )
            })?;
        let count = as_non_negative(count, BLOCK, &field)?;
        if slots.insert(tier, count).is_some() {
            return Err(SchemaError::new(BLOCK, &field, "slot tier listed twice"));
        }
        Ok(())
    };

    match raw {
        Value::Null => {}
        Value::Object(map) => {
            for (tier, count) in map {
                insert(tier, count)?;
            }
        }
        Value::Array(counts) => {
            for (index, count) in counts.iter().enumerate() {
                insert(&(index + 1).to_string(), count)?;
            }
        }
        other => {
            return Err(SchemaError::new(
                BLOCK,
                path,
                format!("expected slot counts, found {}", kind_of(other)),
            ))
        }
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::sample_rules;
    use serde_json::json;

    #[test]
    fn absent_block_means_non_caster() {
        assert_eq!(validate_spellcasting(&Value::Null, &sample_rules()), Ok(None));
    }

    #[test]
    fn accepts_current_shape() {
        let raw = json!({"ability": "INT", "knownSpells": ["shield"], "slots": {"1": 4, "2": 2}});
        let block = validate_spellcasting(&raw, &sample_rules()).unwrap().unwrap();
        assert_eq!(block.ability, AbilityId::new("INT"));
        assert_eq!(block.known_spells, vec!["shield"]);
        assert_eq!(block.slots, BTreeMap::from([(1, 4), (2, 2)]));
    }

    #[test]
    fn accepts_legacy_keys_and_slot_array() {
        let raw = json!({"spellcasting_ability": "wisdom", "spells": [], "spell_slots": [3, "1"]});
        let block = validate_spellcasting(&raw, &sample_rules()).unwrap().unwrap();
        assert_eq!(block.ability, AbilityId::new("WIS"));
        assert_eq!(block.slots, BTreeMap::from([(1, 3), (2, 1)]));
    }

    #[test]
    fn rejects_unknown_ability_and_bad_tiers() {
        let err = validate_spellcasting(&json!({"ability": "LUCK"}), &sample_rules()).unwrap_err();
        assert_eq!(err.block, BlockKind::Spellcasting);

        let raw = json!({"ability": "INT", "slots": {"0": 1}});
        assert!(validate_spellcasting(&raw, &sample_rules()).is_err());

        let raw = json!({"ability": "INT", "slots": {"10": 1}});
        let err = validate_spellcasting(&raw, &sample_rules()).unwrap_err();
        assert_eq!(err.field, "slots.10");
    }

    #[test]
    fn rejects_missing_ability_and_negative_counts() {
        assert!(validate_spellcasting(&json!({"slots": {"1": 2}}), &sample_rules()).is_err());
        let raw = json!({"ability": "INT", "slots": {"1": -1}});
        assert!(validate_spellcasting(&raw, &sample_rules()).is_err());
    }
}
