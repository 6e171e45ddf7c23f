//! Attributes block validator.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::coerce::{as_int, as_object, is_scalar, kind_of, lookup};
use crate::character::AttributesBlock;
use crate::error::{BlockKind, SchemaError};
use crate::rules::RuleSet;
use crate::value_objects::AbilityId;

const BLOCK: BlockKind = BlockKind::Attributes;

/// Accepted shapes:
/// - `{ "STR": 15, "dex": "14", ... }` (keys case-insensitive, aliases honored)
/// - legacy `{ "scores": { ... } }` wrapper
/// - legacy `[{ "ability": "STR", "score": 15 }, ...]` (`name`/`value` also accepted)
pub fn validate_attributes(raw: &Value, rules: &RuleSet) -> Result<AttributesBlock, SchemaError> {
    let mut scores = BTreeMap::new();

    match raw {
        Value::Object(map) => {
            for (key, value) in unwrap_legacy_scores(map)? {
                insert_score(&mut scores, rules, key, value, key)?;
            }
        }
        Value::Array(entries) => {
            for (index, entry) in entries.iter().enumerate() {
                let path = format!("[{index}]");
                let entry = as_object(entry, BLOCK, &path)?;
                let name = lookup(entry, &["ability", "name", "id"])
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        SchemaError::new(BLOCK, &path, "entry has no ability name")
                    })?;
                let score = lookup(entry, &["score", "value"]).ok_or_else(|| {
                    SchemaError::new(BLOCK, &path, "entry has no score")
                })?;
                insert_score(&mut scores, rules, name, score, &format!("{path}.score"))?;
            }
        }
        Value::Null => {
            return Err(SchemaError::new(BLOCK, "", "attributes block is missing"));
        }
        other => {
            return Err(SchemaError::new(
                BLOCK,
                "",
                format!("expected an object or array, found {}", kind_of(other)),
            ));
        }
    }

    for required in &rules.abilities {
        if !scores.contains_key(required) {
            return Err(SchemaError::new(
                BLOCK,
                required.as_str(),
                "required ability is missing",
            ));
        }
    }

    Ok(AttributesBlock::new(scores))
}

fn unwrap_legacy_scores(map: &Map<String, Value>) -> Result<&Map<String, Value>, SchemaError> {
    match map.get("scores") {
        Some(inner) if map.len() == 1 => as_object(inner, BLOCK, "scores"),
        Some(_) => Err(SchemaError::new(
            BLOCK,
            "scores",
            "legacy `scores` wrapper cannot be mixed with top-level scores",
        )),
        None => Ok(map),
    }
}

fn insert_score(
    scores: &mut BTreeMap<AbilityId, i64>,
    rules: &RuleSet,
    key: &str,
    value: &Value,
    path: &str,
) -> Result<(), SchemaError> {
    let ability = rules.canonical_ability(key);
    if ability.as_str().is_empty() {
        return Err(SchemaError::new(BLOCK, path, "ability name is empty"));
    }
    if !is_scalar(value) {
        return Err(SchemaError::new(
            BLOCK,
            path,
            format!("expected a score, found {}", kind_of(value)),
        ));
    }
    let score = as_int(value, BLOCK, path)?;
    if !rules.score_range.contains(score) {
        return Err(SchemaError::new(
            BLOCK,
            path,
            format!(
                "score {score} is outside the valid range {}..={}",
                rules.score_range.min, rules.score_range.max
            ),
        ));
    }
    if scores.insert(ability.clone(), score).is_some() {
        return Err(SchemaError::new(
            BLOCK,
            path,
            format!("ability {ability} is listed more than once"),
        ));
    }
    Ok(())
}
