//! Condition and exhaustion layer.

use chrono::{DateTime, Utc};

use std::collections::BTreeMap;

use serde_json::Value;

use crate::character::ConditionEntry;
use crate::error::CompositionError;
use crate::rules::{EffectRule, RuleSet};
use crate::snapshot::EffectiveCondition;
use crate::value_objects::{Modifier, ModifierSource};

/// Modifiers after layering, plus the conditions that took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayeredModifiers {
    pub modifiers: Vec<Modifier>,
    pub conditions: Vec<EffectiveCondition>,
}

/// Append condition modifiers, then exhaustion modifiers, to the resolved
/// list. The input modifiers are kept as they are, in front.
///
/// Conditions expiring at or before `as_of` are ignored. A non-stackable
/// condition applies only its highest-magnitude entry (the first one on a
/// tie); a stackable one applies every entry. Exhaustion applies every
/// tier up to the current level, lowest first.
pub fn apply_conditions_and_exhaustion(
    mut modifiers: Vec<Modifier>,
    conditions: &[ConditionEntry],
    exhaustion_level: u32,
    rules: &RuleSet,
    as_of: DateTime<Utc>,
) -> Result<LayeredModifiers, CompositionError> {
    let mut effective = Vec::new();

    for (id, entries) in group_active(conditions, as_of) {
        let Some(rule) = rules.condition(id) else {
            continue;
        };
        let applied: Vec<&ConditionEntry> = if rule.stackable {
            entries
        } else {
            strongest(&entries).into_iter().collect()
        };

        for entry in &applied {
            for effect in &rule.effects {
                modifiers.push(effect_modifier(
                    effect,
                    ModifierSource::condition(id),
                    entry.magnitude,
                )?);
            }
        }

        effective.push(EffectiveCondition {
            id: id.to_string(),
            magnitude: applied.iter().map(|e| e.magnitude).max().unwrap_or(0),
            instances: applied.len() as u32,
            extras: merged_extras(&applied),
        });
    }

    for (index, tier) in rules
        .exhaustion
        .iter()
        .take(exhaustion_level as usize)
        .enumerate()
    {
        for effect in &tier.effects {
            modifiers.push(Modifier::new(
                ModifierSource::exhaustion(index + 1),
                effect.target,
                effect.op,
                effect.amount,
            ));
        }
    }

    Ok(LayeredModifiers {
        modifiers,
        conditions: effective,
    })
}

/// Unexpired entries grouped by id, ids in order of first appearance.
fn group_active(
    conditions: &[ConditionEntry],
    as_of: DateTime<Utc>,
) -> Vec<(&str, Vec<&ConditionEntry>)> {
    let mut groups: Vec<(&str, Vec<&ConditionEntry>)> = Vec::new();
    for entry in conditions.iter().filter(|e| !e.is_expired_at(as_of)) {
        match groups.iter_mut().find(|(id, _)| *id == entry.id.as_str()) {
            Some((_, group)) => group.push(entry),
            None => groups.push((entry.id.as_str(), vec![entry])),
        }
    }
    groups
}

fn strongest<'a>(entries: &[&'a ConditionEntry]) -> Option<&'a ConditionEntry> {
    entries.iter().copied().fold(None, |best, entry| match best {
        Some(current) if current.magnitude >= entry.magnitude => Some(current),
        _ => Some(entry),
    })
}

/// Display extras of the applied entries; the first entry to carry a key
/// keeps it.
fn merged_extras(applied: &[&ConditionEntry]) -> BTreeMap<String, Value> {
    let mut extras = BTreeMap::new();
    for entry in applied {
        for (key, value) in &entry.extras {
            extras.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    extras
}

fn effect_modifier(
    effect: &EffectRule,
    source: ModifierSource,
    magnitude: u32,
) -> Result<Modifier, CompositionError> {
    let amount = if effect.per_magnitude {
        effect
            .amount
            .checked_mul(i64::from(magnitude))
            .ok_or_else(|| {
                CompositionError::new(
                    effect.target,
                    format!("{source} at magnitude {magnitude} overflows"),
                )
            })?
    } else {
        effect.amount
    };
    Ok(Modifier::new(source, effect.target, effect.op, amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::sample_rules;
    use crate::value_objects::{DerivedField, ModifierOp, SourceKind};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn base() -> Vec<Modifier> {
        vec![Modifier::additive(
            ModifierSource::level(1),
            DerivedField::ProficiencyBonus,
            2,
        )]
    }

    fn layer(conditions: &[ConditionEntry], exhaustion_level: u32) -> LayeredModifiers {
        let rules = sample_rules();
        apply_conditions_and_exhaustion(base(), conditions, exhaustion_level, &rules, now()).unwrap()
    }

    fn condition_modifiers(layered: &LayeredModifiers) -> Vec<&Modifier> {
        layered
            .modifiers
            .iter()
            .filter(|m| m.source().kind() == SourceKind::Condition)
            .collect()
    }

    #[test]
    fn non_stackable_duplicates_apply_once_at_highest_magnitude() {
        let conditions = vec![
            ConditionEntry::new("poisoned", 1),
            ConditionEntry::new("poisoned", 3),
            ConditionEntry::new("poisoned", 2),
        ];
        let layered = layer(&conditions, 0);
        let poison: Vec<_> = layered
            .modifiers
            .iter()
            .filter(|m| m.source().kind() == SourceKind::Condition)
            .collect();
        assert_eq!(poison.len(), 1);
        assert_eq!(poison[0].amount(), -3);
        assert_eq!(
            layered.conditions,
            vec![EffectiveCondition {
                id: "poisoned".into(),
                magnitude: 3,
                instances: 1,
                extras: BTreeMap::new(),
            }]
        );
    }

    #[test]
    fn duplicate_magnitudes_two_and_five_match_a_single_five() {
        let duplicated = layer(
            &[ConditionEntry::new("poisoned", 2), ConditionEntry::new("poisoned", 5)],
            0,
        );
        let single = layer(&[ConditionEntry::new("poisoned", 5)], 0);
        assert_eq!(condition_modifiers(&duplicated), condition_modifiers(&single));
        assert_eq!(condition_modifiers(&single)[0].amount(), -5);
        assert_eq!(duplicated.conditions, single.conditions);
    }

    #[test]
    fn applied_entry_extras_reach_the_effective_condition() {
        let mut first = ConditionEntry::new("blessed", 1);
        first.extras.insert("caster".into(), Value::from("cleric"));
        let mut second = ConditionEntry::new("blessed", 1);
        second.extras.insert("caster".into(), Value::from("paladin"));
        second.extras.insert("note".into(), Value::from("until dawn"));

        let layered = layer(&[first, second], 0);
        let extras = &layered.conditions[0].extras;
        assert_eq!(extras.get("caster"), Some(&Value::from("cleric")));
        assert_eq!(extras.get("note"), Some(&Value::from("until dawn")));
    }

    #[test]
    fn per_magnitude_overflow_is_an_error() {
        let mut rules = sample_rules();
        if let Some(rule) = rules.conditions.get_mut("poisoned") {
            rule.effects[0].amount = i64::MAX / 2;
        }
        let err = apply_conditions_and_exhaustion(
            base(),
            &[ConditionEntry::new("poisoned", 3)],
            0,
            &rules,
            now(),
        )
        .unwrap_err();
        assert_eq!(err.field, "initiative");
    }

    #[test]
    fn stackable_conditions_apply_every_instance() {
        let conditions = vec![ConditionEntry::new("blessed", 1), ConditionEntry::new("blessed", 1)];
        let layered = layer(&conditions, 0);
        let total: i64 = layered
            .modifiers
            .iter()
            .filter(|m| m.target() == DerivedField::SpellSaveDc)
            .map(Modifier::amount)
            .sum();
        assert_eq!(total, 2);
        assert_eq!(layered.conditions[0].instances, 2);
    }

    #[test]
    fn expired_and_unknown_conditions_contribute_nothing() {
        let conditions = vec![
            ConditionEntry::new("restrained", 1).with_expiry(now()),
            ConditionEntry::new("slowed", 1).with_expiry(now() - Duration::minutes(1)),
            ConditionEntry::new("mesmerized", 1),
        ];
        let layered = layer(&conditions, 0);
        assert_eq!(layered.modifiers, base());
        assert!(layered.conditions.is_empty());
    }

    #[test]
    fn unexpired_conditions_still_apply() {
        let conditions =
            vec![ConditionEntry::new("restrained", 1).with_expiry(now() + Duration::seconds(1))];
        let layered = layer(&conditions, 0);
        assert_eq!(layered.modifiers.len(), 2);
        assert_eq!(layered.modifiers[1].op(), ModifierOp::Override);
    }

    #[test]
    fn exhaustion_tiers_are_cumulative_and_come_last() {
        let conditions = vec![ConditionEntry::new("restrained", 1)];
        let layered = layer(&conditions, 3);
        let sources: Vec<String> = layered
            .modifiers
            .iter()
            .map(|m| m.source().to_string())
            .collect();
        assert_eq!(
            sources,
            vec![
                "level:1",
                "condition:restrained",
                "exhaustion:1",
                "exhaustion:2",
                "exhaustion:3"
            ]
        );
    }
}
