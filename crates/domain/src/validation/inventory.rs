//! Inventory block validator.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::coerce::{
    as_bool, as_identifier, as_int, as_non_negative, as_object, keep_extra, kind_of,
    normalize_key,
};
use crate::character::{InventoryBlock, InventoryItem, ItemBonus};
use crate::error::{BlockKind, SchemaError};
use crate::rules::RuleSet;
use crate::value_objects::{DerivedField, ModifierOp};

const BLOCK: BlockKind = BlockKind::Inventory;

/// Accepted shapes: an array of items, or the legacy `{ "items": [...] }`
/// wrapper. A missing block is an empty inventory. Stored order is kept.
pub fn validate_inventory(raw: &Value, rules: &RuleSet) -> Result<InventoryBlock, SchemaError> {
    let entries = match raw {
        Value::Null => return Ok(InventoryBlock::default()),
        Value::Array(entries) => entries,
        Value::Object(map) => match (map.get("items"), map.len()) {
            (Some(Value::Array(entries)), 1) => entries,
            _ => {
                return Err(SchemaError::new(
                    BLOCK,
                    "",
                    "expected an item array or a legacy `{ items: [...] }` wrapper",
                ))
            }
        },
        other => {
            return Err(SchemaError::new(
                BLOCK,
                "",
                format!("expected an array, found {}", kind_of(other)),
            ))
        }
    };

    let items = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let path = format!("items[{index}]");
            validate_item(as_object(entry, BLOCK, &path)?, rules, &path)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InventoryBlock { items })
}

fn validate_item(
    map: &Map<String, Value>,
    rules: &RuleSet,
    path: &str,
) -> Result<InventoryItem, SchemaError> {
    let mut id = None;
    let mut name = None;
    let mut equipped = false;
    let mut weight = 0;
    let mut bonuses = Vec::new();
    let mut legacy_ac_bonus = None;
    let mut resistances = Vec::new();
    let mut extras = BTreeMap::new();

    for (key, value) in map {
        let field_path = format!("{path}.{key}");
        match normalize_key(key).as_str() {
            "id" | "itemid" => id = Some(as_identifier(value, BLOCK, &field_path)?),
            "name" | "label" => name = Some(as_identifier(value, BLOCK, &field_path)?),
            "equipped" | "isequipped" => equipped = as_bool(value, BLOCK, &field_path)?,
            "weight" => weight = as_non_negative(value, BLOCK, &field_path)?,
            "bonuses" | "modifiers" => bonuses = validate_bonuses(value, rules, &field_path)?,
            "acbonus" => legacy_ac_bonus = Some(as_int(value, BLOCK, &field_path)?),
            "resistances" | "resistance" | "resistancetags" => {
                resistances = validate_resistances(value, &field_path)?
            }
            _ => keep_extra(&mut extras, key, value, BLOCK, &field_path)?,
        }
    }

    if let Some(amount) = legacy_ac_bonus {
        bonuses.push(ItemBonus {
            target: DerivedField::ArmorClass,
            op: ModifierOp::Additive,
            amount,
        });
    }

    let id = match (id, &name) {
        (Some(id), _) => id,
        (None, Some(name)) => name.clone(),
        (None, None) => {
            return Err(SchemaError::new(BLOCK, path, "item needs an id or a name"));
        }
    };

    Ok(InventoryItem {
        name: name.unwrap_or_else(|| id.clone()),
        id,
        equipped,
        weight,
        bonuses,
        resistances,
        extras,
    })
}

/// Bonuses as `[{ "target", "op", "amount" }]`, or the legacy object map
/// `{ "armorClass": 1 }` meaning additive bonuses.
fn validate_bonuses(raw: &Value, rules: &RuleSet, path: &str) -> Result<Vec<ItemBonus>, SchemaError> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let entry_path = format!("{path}[{index}]");
                validate_bonus(as_object(entry, BLOCK, &entry_path)?, rules, &entry_path)
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(target, amount)| {
                let entry_path = format!("{path}.{target}");
                Ok(ItemBonus {
                    target: parse_target(target, rules, &entry_path)?,
                    op: ModifierOp::Additive,
                    amount: as_int(amount, BLOCK, &entry_path)?,
                })
            })
            .collect(),
        other => Err(SchemaError::new(
            BLOCK,
            path,
            format!("expected an array of bonuses, found {}", kind_of(other)),
        )),
    }
}

fn validate_bonus(
    map: &Map<String, Value>,
    rules: &RuleSet,
    path: &str,
) -> Result<ItemBonus, SchemaError> {
    let mut target = None;
    let mut op = ModifierOp::Additive;
    let mut amount = None;

    for (key, value) in map {
        let field_path = format!("{path}.{key}");
        match normalize_key(key).as_str() {
            "target" | "field" | "stat" => {
                let name = value.as_str().ok_or_else(|| {
                    SchemaError::new(BLOCK, &field_path, "expected a field name")
                })?;
                target = Some(parse_target(name, rules, &field_path)?);
            }
            "op" | "operation" | "kind" => {
                let name = value.as_str().ok_or_else(|| {
                    SchemaError::new(BLOCK, &field_path, "expected an operation name")
                })?;
                op = name
                    .parse()
                    .map_err(|e: crate::error::ParseError| {
                        SchemaError::new(BLOCK, &field_path, e.to_string())
                    })?;
            }
            "amount" | "value" => amount = Some(as_int(value, BLOCK, &field_path)?),
            _ => {
                return Err(SchemaError::new(
                    BLOCK,
                    field_path,
                    "unrecognized bonus field",
                ))
            }
        }
    }

    let target = target.ok_or_else(|| SchemaError::new(BLOCK, path, "bonus has no target"))?;
    let amount = amount.ok_or_else(|| SchemaError::new(BLOCK, path, "bonus has no amount"))?;
    if op == ModifierOp::Multiplicative && amount < 0 {
        return Err(SchemaError::new(
            BLOCK,
            path,
            "multiplicative percentage cannot be negative",
        ));
    }

    Ok(ItemBonus { target, op, amount })
}

fn parse_target(name: &str, rules: &RuleSet, path: &str) -> Result<DerivedField, SchemaError> {
    let field: DerivedField = name
        .parse()
        .map_err(|e: crate::error::ParseError| SchemaError::new(BLOCK, path, e.to_string()))?;
    if !rules.allows_field(field) {
        return Err(SchemaError::new(
            BLOCK,
            path,
            format!(
                "{field} is outside spell tiers 1..={}",
                rules.spellcasting.max_tier
            ),
        ));
    }
    Ok(field)
}

/// Tags as an array of strings, or a legacy comma-separated string.
fn validate_resistances(raw: &Value, path: &str) -> Result<Vec<String>, SchemaError> {
    let tags: Vec<String> = match raw {
        Value::Null => Vec::new(),
        Value::String(text) => text.split(',').map(str::to_string).collect(),
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry.as_str().map(str::to_string).ok_or_else(|| {
                    SchemaError::new(BLOCK, format!("{path}[{index}]"), "expected a tag string")
                })
            })
            .collect::<Result<_, _>>()?,
        other => {
            return Err(SchemaError::new(
                BLOCK,
                path,
                format!("expected tags, found {}", kind_of(other)),
            ))
        }
    };

    Ok(tags
        .into_iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect())
}
