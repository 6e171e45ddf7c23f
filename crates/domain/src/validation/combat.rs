//! Combat and senses base block validators.
//!
//! Both blocks are flat field tables with a history of renamed keys, so
//! they share one table-driven reader.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::coerce::{as_int, as_non_negative, as_object, keep_extra, kind_of, normalize_key};
use crate::character::{CombatBlockBase, SensesBlockBase};
use crate::error::{BlockKind, SchemaError};
use crate::rules::RuleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CombatField {
    MaxHitPoints,
    ArmorClass,
    Speed,
    InitiativeBonus,
}

/// Normalized key -> field, current spelling first.
const COMBAT_KEYS: &[(&str, CombatField)] = &[
    ("maxhitpoints", CombatField::MaxHitPoints),
    ("maxhp", CombatField::MaxHitPoints),
    ("hitpoints", CombatField::MaxHitPoints),
    ("hp", CombatField::MaxHitPoints),
    ("armorclass", CombatField::ArmorClass),
    ("basearmorclass", CombatField::ArmorClass),
    ("ac", CombatField::ArmorClass),
    ("baseac", CombatField::ArmorClass),
    ("speed", CombatField::Speed),
    ("basespeed", CombatField::Speed),
    ("walkspeed", CombatField::Speed),
    ("initiativebonus", CombatField::InitiativeBonus),
    ("initiative", CombatField::InitiativeBonus),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SenseField {
    Darkvision,
    Blindsight,
    Tremorsense,
    Truesight,
    PerceptionBonus,
}

const SENSE_KEYS: &[(&str, SenseField)] = &[
    ("darkvision", SenseField::Darkvision),
    ("darkvisionrange", SenseField::Darkvision),
    ("blindsight", SenseField::Blindsight),
    ("blindsightrange", SenseField::Blindsight),
    ("tremorsense", SenseField::Tremorsense),
    ("tremorsenserange", SenseField::Tremorsense),
    ("truesight", SenseField::Truesight),
    ("truesightrange", SenseField::Truesight),
    ("perceptionbonus", SenseField::PerceptionBonus),
    ("perception", SenseField::PerceptionBonus),
    ("passiveperceptionbonus", SenseField::PerceptionBonus),
];

/// Fields found in a table-driven block, plus preserved scalar extras.
struct FieldTable<K> {
    values: BTreeMap<K, (String, Value)>,
    extras: BTreeMap<String, Value>,
}

fn read_table<K: Copy + Ord>(
    entries: &[(&String, &Value)],
    keys: &[(&str, K)],
    block: BlockKind,
) -> Result<FieldTable<K>, SchemaError> {
    let mut table = FieldTable {
        values: BTreeMap::new(),
        extras: BTreeMap::new(),
    };
    for (key, value) in entries {
        let normalized = normalize_key(key);
        match keys.iter().find(|(name, _)| *name == normalized) {
            Some((_, field)) => {
                if let Some((previous, _)) = table.values.get(field) {
                    return Err(SchemaError::new(
                        block,
                        key.as_str(),
                        format!("duplicates field `{previous}` under a legacy name"),
                    ));
                }
                table
                    .values
                    .insert(*field, (key.to_string(), (*value).clone()));
            }
            None => keep_extra(&mut table.extras, key, value, block, key)?,
        }
    }
    Ok(table)
}

impl<K: Ord> FieldTable<K> {
    fn int(&self, field: K, block: BlockKind) -> Result<Option<i64>, SchemaError> {
        self.values
            .get(&field)
            .map(|(key, value)| as_int(value, block, key))
            .transpose()
    }

    fn non_negative(&self, field: K, block: BlockKind) -> Result<Option<i64>, SchemaError> {
        self.values
            .get(&field)
            .map(|(key, value)| as_non_negative(value, block, key))
            .transpose()
    }
}

/// Accepted shapes: camelCase keys; legacy snake_case and short names
/// (`hp`, `ac`, `base_speed`). Optional fields default from the rule set.
pub fn validate_combat(raw: &Value, rules: &RuleSet) -> Result<CombatBlockBase, SchemaError> {
    const BLOCK: BlockKind = BlockKind::Combat;

    if raw.is_null() {
        return Err(SchemaError::new(BLOCK, "", "combat block is missing"));
    }
    let map = as_object(raw, BLOCK, "")?;
    let entries: Vec<_> = map.iter().collect();
    let table = read_table(&entries, COMBAT_KEYS, BLOCK)?;

    let max_hit_points = table
        .int(CombatField::MaxHitPoints, BLOCK)?
        .ok_or_else(|| SchemaError::new(BLOCK, "maxHitPoints", "required field is missing"))?;
    if max_hit_points < 1 {
        return Err(SchemaError::new(
            BLOCK,
            "maxHitPoints",
            format!("must be at least 1, found {max_hit_points}"),
        ));
    }

    Ok(CombatBlockBase {
        max_hit_points,
        armor_class: table
            .non_negative(CombatField::ArmorClass, BLOCK)?
            .unwrap_or(rules.defaults.armor_class),
        speed: table
            .non_negative(CombatField::Speed, BLOCK)?
            .unwrap_or(rules.defaults.speed),
        initiative_bonus: table.int(CombatField::InitiativeBonus, BLOCK)?.unwrap_or(0),
        extras: table.extras,
    })
}

/// Accepted shapes: camelCase keys; snake_case and `*_range` legacy keys;
/// legacy `{ "vision": { ... } }` wrapper. A missing block means no
/// special senses.
pub fn validate_senses(raw: &Value) -> Result<SensesBlockBase, SchemaError> {
    const BLOCK: BlockKind = BlockKind::Senses;

    let map = match raw {
        Value::Null => return Ok(SensesBlockBase::default()),
        Value::Object(map) => map,
        other => {
            return Err(SchemaError::new(
                BLOCK,
                "",
                format!("expected an object, found {}", kind_of(other)),
            ))
        }
    };

    let entries = flatten_vision(map)?;
    let table = read_table(&entries, SENSE_KEYS, BLOCK)?;

    Ok(SensesBlockBase {
        darkvision: table.non_negative(SenseField::Darkvision, BLOCK)?.unwrap_or(0),
        blindsight: table.non_negative(SenseField::Blindsight, BLOCK)?.unwrap_or(0),
        tremorsense: table.non_negative(SenseField::Tremorsense, BLOCK)?.unwrap_or(0),
        truesight: table.non_negative(SenseField::Truesight, BLOCK)?.unwrap_or(0),
        perception_bonus: table.int(SenseField::PerceptionBonus, BLOCK)?.unwrap_or(0),
        extras: table.extras,
    })
}

fn flatten_vision(map: &Map<String, Value>) -> Result<Vec<(&String, &Value)>, SchemaError> {
    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        if normalize_key(key) == "vision" {
            let inner = as_object(value, BlockKind::Senses, key)?;
            entries.extend(inner.iter());
        } else {
            entries.push((key, value));
        }
    }
    Ok(entries)
}
