//! Snapshot compositor.
//!
//! Folds every modifier into its target field, one field at a time in
//! `DerivedField` order:
//!
//! 1. start from the base value
//! 2. add additives in order
//! 3. scale by the product of multiplicative percentages, flooring
//! 4. replace with the last override, if any
//! 5. clamp by the largest min-cap and the smallest max-cap
//! 6. clamp by the field's natural floor
//!
//! Arithmetic is exact. A value that does not fit in an `i64` is a
//! `CompositionError`, never a wrapped or saturated number.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::character::CharacterState;
use crate::error::CompositionError;
use crate::ids::CharacterId;
use crate::rules::RuleSet;
use crate::snapshot::{
    BlockExtras, CombatStats, DerivedSnapshot, EffectiveCondition, FieldValue, ItemSummary,
    SensesStats, SpellcastingStats,
};
use crate::value_objects::{AbilityScore, DerivedField, Modifier, ModifierOp};

/// Everything the compositor needs for one snapshot.
#[derive(Debug, Clone)]
pub struct CompositionInput<'a> {
    pub character_id: CharacterId,
    pub state: &'a CharacterState,
    pub rules: &'a RuleSet,
    pub bases: BTreeMap<DerivedField, i64>,
    pub modifiers: Vec<Modifier>,
    pub conditions: Vec<EffectiveCondition>,
    /// Version of the currently persisted snapshot; `None` if there is none.
    pub previous_version: Option<u64>,
    pub computed_at: DateTime<Utc>,
}

/// Base value of every field the state defines.
///
/// Spellcasting fields only exist when the state has a spellcasting block.
pub fn base_values(
    state: &CharacterState,
    rules: &RuleSet,
) -> Result<BTreeMap<DerivedField, i64>, CompositionError> {
    let passive_perception = rules
        .defaults
        .passive_perception
        .checked_add(state.senses.perception_bonus)
        .ok_or_else(|| overflow(DerivedField::PassivePerception))?;

    let mut bases = BTreeMap::from([
        (DerivedField::ProficiencyBonus, 0),
        (DerivedField::ArmorClass, state.combat.armor_class),
        (DerivedField::Initiative, state.combat.initiative_bonus),
        (DerivedField::MaxHitPoints, state.combat.max_hit_points),
        (DerivedField::Speed, state.combat.speed),
        (DerivedField::CarriedWeight, 0),
        (DerivedField::PassivePerception, passive_perception),
        (DerivedField::Darkvision, state.senses.darkvision),
        (DerivedField::Blindsight, state.senses.blindsight),
        (DerivedField::Tremorsense, state.senses.tremorsense),
        (DerivedField::Truesight, state.senses.truesight),
    ]);

    if let Some(spellcasting) = &state.spellcasting {
        bases.insert(DerivedField::SpellSaveDc, rules.spellcasting.save_dc_base);
        bases.insert(DerivedField::SpellAttackBonus, 0);
        for (tier, count) in &spellcasting.slots {
            bases.insert(DerivedField::SpellSlots(*tier), *count);
        }
    }
    Ok(bases)
}

/// Build the snapshot. Fails on a required field with no value, on
/// contradictory caps, and on a spell slot tier the rule set does not have.
pub fn compose(input: CompositionInput<'_>) -> Result<DerivedSnapshot, CompositionError> {
    let CompositionInput {
        character_id,
        state,
        rules,
        bases,
        modifiers,
        conditions,
        previous_version,
        computed_at,
    } = input;

    for modifier in &modifiers {
        if !rules.allows_field(modifier.target()) {
            return Err(CompositionError::new(
                modifier.target(),
                format!(
                    "modifier from {} targets a tier outside 1..={}",
                    modifier.source(),
                    rules.spellcasting.max_tier
                ),
            ));
        }
    }

    let is_caster = state.spellcasting.is_some();
    let modifiers: Vec<Modifier> = modifiers
        .into_iter()
        .filter(|m| is_caster || !m.target().is_spellcasting())
        .collect();

    let mut targets: BTreeSet<DerivedField> = DerivedField::CORE.into_iter().collect();
    targets.extend(bases.keys().copied());
    targets.extend(modifiers.iter().map(Modifier::target));

    let mut fields = Vec::with_capacity(targets.len());
    for field in targets {
        let applicable: Vec<&Modifier> =
            modifiers.iter().filter(|m| m.target() == field).collect();
        let base = bases.get(&field).copied();
        let value = compose_field(field, base, &applicable)?;
        fields.push(FieldValue {
            field,
            base: base.unwrap_or(0),
            value,
        });
    }

    let value_of = |field: DerivedField| {
        fields
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.value)
            .unwrap_or(0)
    };

    let combat = CombatStats {
        proficiency_bonus: value_of(DerivedField::ProficiencyBonus),
        armor_class: value_of(DerivedField::ArmorClass),
        initiative: value_of(DerivedField::Initiative),
        max_hit_points: value_of(DerivedField::MaxHitPoints),
        speed: value_of(DerivedField::Speed),
        carried_weight: value_of(DerivedField::CarriedWeight),
    };
    let senses = SensesStats {
        passive_perception: value_of(DerivedField::PassivePerception),
        darkvision: value_of(DerivedField::Darkvision),
        blindsight: value_of(DerivedField::Blindsight),
        tremorsense: value_of(DerivedField::Tremorsense),
        truesight: value_of(DerivedField::Truesight),
    };
    let spellcasting = state.spellcasting.as_ref().map(|block| SpellcastingStats {
        ability: block.ability.clone(),
        save_dc: value_of(DerivedField::SpellSaveDc),
        attack_bonus: value_of(DerivedField::SpellAttackBonus),
        slots: fields
            .iter()
            .filter_map(|entry| entry.field.spell_tier().map(|tier| (tier, entry.value)))
            .filter(|(_, count)| *count > 0)
            .collect(),
        known_spells: block.known_spells.clone(),
        extras: block.extras.clone(),
    });

    Ok(DerivedSnapshot {
        character_id,
        version: previous_version.unwrap_or(0) + 1,
        computed_at,
        level: state.level,
        abilities: ability_scores(state, rules),
        combat,
        senses,
        spellcasting,
        inventory: inventory(state),
        resistances: resistances(state),
        conditions,
        exhaustion_level: state.exhaustion_at(computed_at),
        fields,
        modifiers,
        extras: BlockExtras {
            combat: state.combat.extras.clone(),
            senses: state.senses.extras.clone(),
        },
    })
}

fn compose_field(
    field: DerivedField,
    base: Option<i64>,
    modifiers: &[&Modifier],
) -> Result<i64, CompositionError> {
    let override_value = of_op(modifiers, ModifierOp::Override).last().map(|m| m.amount());
    if field.is_required() && base.is_none() && override_value.is_none() {
        return Err(CompositionError::new(
            field,
            "required field has no base value and no override",
        ));
    }

    let mut value = base.unwrap_or(0);
    for m in of_op(modifiers, ModifierOp::Additive) {
        value = value.checked_add(m.amount()).ok_or_else(|| overflow(field))?;
    }

    // Exact ratio reduced after every step, floored once.
    let mut numerator = i128::from(value);
    let mut denominator = 1_i128;
    for m in of_op(modifiers, ModifierOp::Multiplicative) {
        numerator = numerator
            .checked_mul(i128::from(m.amount()))
            .ok_or_else(|| overflow(field))?;
        denominator = denominator.checked_mul(100).ok_or_else(|| overflow(field))?;
        let divisor = gcd(numerator, denominator);
        numerator /= divisor;
        denominator /= divisor;
    }
    value = i64::try_from(numerator.div_euclid(denominator)).map_err(|_| overflow(field))?;

    if let Some(replacement) = override_value {
        value = replacement;
    }

    let floor = of_op(modifiers, ModifierOp::MinCap).map(|m| m.amount()).max();
    let ceiling = of_op(modifiers, ModifierOp::MaxCap).map(|m| m.amount()).min();
    if let (Some(floor), Some(ceiling)) = (floor, ceiling) {
        if floor > ceiling {
            return Err(CompositionError::new(
                field,
                format!("minimum cap {floor} is above maximum cap {ceiling}"),
            ));
        }
    }
    if let Some(floor) = floor {
        value = value.max(floor);
    }
    if let Some(ceiling) = ceiling {
        value = value.min(ceiling);
    }

    if let Some(natural) = field.natural_floor() {
        value = value.max(natural);
    }
    Ok(value)
}

fn overflow(field: DerivedField) -> CompositionError {
    CompositionError::new(field, "value does not fit in a 64-bit integer")
}

/// Greatest common divisor of `a` and a positive `b`.
fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    // a divides the positive denominator, so it fits.
    a as i128
}

fn of_op<'a>(modifiers: &'a [&'a Modifier], op: ModifierOp) -> impl Iterator<Item = &'a Modifier> {
    modifiers.iter().copied().filter(move |m| m.op() == op)
}

/// Required abilities in rule-set order, then any extra abilities.
fn ability_scores(state: &CharacterState, rules: &RuleSet) -> Vec<AbilityScore> {
    let scores = state.attributes.scores();
    let required = rules.abilities.iter().filter_map(|ability| {
        scores
            .get(ability)
            .map(|score| (ability, *score))
    });
    let extras = scores
        .iter()
        .filter(|(ability, _)| !rules.is_known_ability(ability))
        .map(|(ability, score)| (ability, *score));

    required
        .chain(extras)
        .map(|(ability, score)| AbilityScore {
            ability: ability.clone(),
            score,
            modifier: rules.ability_modifier(score),
        })
        .collect()
}

fn inventory(state: &CharacterState) -> Vec<ItemSummary> {
    state
        .inventory
        .items
        .iter()
        .map(|item| ItemSummary {
            id: item.id.clone(),
            name: item.name.clone(),
            equipped: item.equipped,
            weight: item.weight,
            extras: item.extras.clone(),
        })
        .collect()
}

/// Resistance tags from equipped items, first appearance order.
fn resistances(state: &CharacterState) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in state.inventory.equipped().flat_map(|item| &item.resistances) {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::sample_rules;
    use crate::validation::normalize_state;
    use crate::validation::test_support::sample_raw_state;
    use crate::value_objects::ModifierSource;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn modifier(target: DerivedField, op: ModifierOp, amount: i64) -> Modifier {
        Modifier::new(ModifierSource::equipment("test"), target, op, amount)
    }

    fn compose_with(modifiers: Vec<Modifier>) -> Result<DerivedSnapshot, CompositionError> {
        let rules = sample_rules();
        let state = normalize_state(&sample_raw_state(), &rules).unwrap();
        compose(CompositionInput {
            character_id: CharacterId::new(),
            bases: base_values(&state, &rules).unwrap(),
            state: &state,
            rules: &rules,
            modifiers,
            conditions: Vec::new(),
            previous_version: None,
            computed_at: at(),
        })
    }

    #[test]
    fn field_order_is_additive_multiply_override_cap() {
        use DerivedField::Speed;
        use ModifierOp::*;

        // 30 + 10 = 40, x50% = 20
        let snapshot = compose_with(vec![
            modifier(Speed, Multiplicative, 50),
            modifier(Speed, Additive, 10),
        ])
        .unwrap();
        assert_eq!(snapshot.field(Speed), Some(20));

        // override replaces the scaled value, then caps clamp it
        let snapshot = compose_with(vec![
            modifier(Speed, Additive, 10),
            modifier(Speed, Override, 60),
            modifier(Speed, MaxCap, 45),
        ])
        .unwrap();
        assert_eq!(snapshot.field(Speed), Some(45));
    }

    #[test]
    fn multiplier_is_combined_then_floored() {
        // 31 x 50% x 50% = 7.75 -> 7
        let snapshot = compose_with(vec![
            modifier(DerivedField::ArmorClass, ModifierOp::Additive, 20),
            modifier(DerivedField::ArmorClass, ModifierOp::Multiplicative, 50),
            modifier(DerivedField::ArmorClass, ModifierOp::Multiplicative, 50),
        ])
        .unwrap();
        assert_eq!(snapshot.field(DerivedField::ArmorClass), Some(7));
    }

    #[test]
    fn last_override_wins() {
        let snapshot = compose_with(vec![
            modifier(DerivedField::Speed, ModifierOp::Override, 40),
            modifier(DerivedField::Speed, ModifierOp::Override, 50),
        ])
        .unwrap();
        assert_eq!(snapshot.field(DerivedField::Speed), Some(50));
    }

    #[test]
    fn tightest_caps_apply() {
        use DerivedField::Initiative;
        let snapshot = compose_with(vec![
            modifier(Initiative, ModifierOp::MaxCap, 5),
            modifier(Initiative, ModifierOp::MaxCap, 2),
            modifier(Initiative, ModifierOp::Additive, 10),
        ])
        .unwrap();
        assert_eq!(snapshot.field(Initiative), Some(2));

        let snapshot = compose_with(vec![
            modifier(Initiative, ModifierOp::MinCap, 1),
            modifier(Initiative, ModifierOp::MinCap, 4),
        ])
        .unwrap();
        assert_eq!(snapshot.field(Initiative), Some(4));
    }

    #[test]
    fn min_caps_two_and_five_raise_base_one_to_five() {
        let rules = sample_rules();
        let state = normalize_state(&sample_raw_state(), &rules).unwrap();
        let mut bases = base_values(&state, &rules).unwrap();
        bases.insert(DerivedField::Initiative, 1);

        let snapshot = compose(CompositionInput {
            character_id: CharacterId::new(),
            state: &state,
            rules: &rules,
            bases,
            modifiers: vec![
                modifier(DerivedField::Initiative, ModifierOp::MinCap, 2),
                modifier(DerivedField::Initiative, ModifierOp::MinCap, 5),
            ],
            conditions: Vec::new(),
            previous_version: None,
            computed_at: at(),
        })
        .unwrap();
        assert_eq!(snapshot.field(DerivedField::Initiative), Some(5));
        let initiative = snapshot
            .fields()
            .iter()
            .find(|entry| entry.field == DerivedField::Initiative)
            .unwrap();
        assert_eq!(initiative.base, 1);
    }

    #[test]
    fn contradictory_caps_are_an_error() {
        let err = compose_with(vec![
            modifier(DerivedField::Speed, ModifierOp::MinCap, 40),
            modifier(DerivedField::Speed, ModifierOp::MaxCap, 20),
        ])
        .unwrap_err();
        assert_eq!(err.field, "speed");
    }

    #[test]
    fn natural_floors_hold() {
        let snapshot = compose_with(vec![
            modifier(DerivedField::MaxHitPoints, ModifierOp::Additive, -500),
            modifier(DerivedField::Speed, ModifierOp::Additive, -500),
            modifier(DerivedField::Initiative, ModifierOp::Additive, -500),
        ])
        .unwrap();
        assert_eq!(snapshot.combat().max_hit_points, 1);
        assert_eq!(snapshot.combat().speed, 0);
        assert_eq!(snapshot.combat().initiative, -500);
    }

    #[test]
    fn many_full_multipliers_leave_the_value_unchanged() {
        let modifiers = (0..40)
            .map(|_| modifier(DerivedField::Speed, ModifierOp::Multiplicative, 100))
            .collect();
        let snapshot = compose_with(modifiers).unwrap();
        assert_eq!(snapshot.field(DerivedField::Speed), Some(30));
    }

    #[test]
    fn long_multiplier_chains_stay_exact() {
        // 30 x 200% x 50%, forty times over, is still 30.
        let modifiers = (0..40)
            .flat_map(|_| {
                [
                    modifier(DerivedField::Speed, ModifierOp::Multiplicative, 200),
                    modifier(DerivedField::Speed, ModifierOp::Multiplicative, 50),
                ]
            })
            .collect();
        let snapshot = compose_with(modifiers).unwrap();
        assert_eq!(snapshot.field(DerivedField::Speed), Some(30));
    }

    #[test]
    fn unrepresentable_product_is_an_error() {
        let modifiers = (0..70)
            .map(|_| modifier(DerivedField::Speed, ModifierOp::Multiplicative, 200))
            .collect();
        let err = compose_with(modifiers).unwrap_err();
        assert_eq!(err.field, "speed");
    }

    #[test]
    fn additive_overflow_is_an_error() {
        let err = compose_with(vec![
            modifier(DerivedField::ArmorClass, ModifierOp::Additive, i64::MAX),
            modifier(DerivedField::ArmorClass, ModifierOp::Additive, i64::MAX),
        ])
        .unwrap_err();
        assert_eq!(err.field, "armorClass");
    }

    #[test]
    fn overflowing_perception_base_is_an_error() {
        let rules = sample_rules();
        let mut state = normalize_state(&sample_raw_state(), &rules).unwrap();
        state.senses.perception_bonus = i64::MAX;
        let err = base_values(&state, &rules).unwrap_err();
        assert_eq!(err.field, "passivePerception");
    }

    #[test]
    fn out_of_range_spell_tier_is_an_error() {
        let err = compose_with(vec![modifier(
            DerivedField::SpellSlots(12),
            ModifierOp::Additive,
            1,
        )])
        .unwrap_err();
        assert_eq!(err.field, "spellSlots.12");
    }

    #[test]
    fn spell_modifiers_are_dropped_for_non_casters() {
        let snapshot = compose_with(vec![modifier(
            DerivedField::SpellSaveDc,
            ModifierOp::Additive,
            1,
        )])
        .unwrap();
        assert!(snapshot.spellcasting().is_none());
        assert_eq!(snapshot.field(DerivedField::SpellSaveDc), None);
        assert!(snapshot.modifiers().is_empty());
    }

    #[test]
    fn required_field_without_base_or_override_is_an_error() {
        let rules = sample_rules();
        let state = normalize_state(&sample_raw_state(), &rules).unwrap();
        let mut bases = base_values(&state, &rules).unwrap();
        bases.remove(&DerivedField::ArmorClass);

        let input = |modifiers| CompositionInput {
            character_id: CharacterId::new(),
            state: &state,
            rules: &rules,
            bases: bases.clone(),
            modifiers,
            conditions: Vec::new(),
            previous_version: None,
            computed_at: at(),
        };

        let err = compose(input(Vec::new())).unwrap_err();
        assert_eq!(err.field, "armorClass");

        let snapshot = compose(input(vec![modifier(
            DerivedField::ArmorClass,
            ModifierOp::Override,
            15,
        )]))
        .unwrap();
        assert_eq!(snapshot.combat().armor_class, 15);
    }

    #[test]
    fn version_follows_previous() {
        let rules = sample_rules();
        let state = normalize_state(&sample_raw_state(), &rules).unwrap();
        let snapshot = compose(CompositionInput {
            character_id: CharacterId::new(),
            state: &state,
            rules: &rules,
            bases: base_values(&state, &rules).unwrap(),
            modifiers: Vec::new(),
            conditions: Vec::new(),
            previous_version: Some(4),
            computed_at: at(),
        })
        .unwrap();
        assert_eq!(snapshot.version(), 5);
        assert_eq!(compose_with(Vec::new()).unwrap().version(), 1);
    }
}
