//! Conditions and exhaustion validators.
//!
//! Older sheets tracked fatigue as an `exhaustion` entry in the conditions
//! list. Those entries are lifted out here and folded into the dedicated
//! exhaustion level so the pipeline sees one source of truth. Entries with
//! an expiry stay timed: they count only until they expire.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::coerce::{
    as_identifier, as_timestamp, as_u32, keep_extra, kind_of, lookup, normalize_key,
};
use crate::character::ConditionEntry;
use crate::error::{BlockKind, SchemaError};
use crate::rules::RuleSet;

const LEGACY_EXHAUSTION_ID: &str = "exhaustion";

const ID_KEYS: &[&str] = &["id", "condition", "name"];
const MAGNITUDE_KEYS: &[&str] = &["magnitude", "level", "tier", "severity"];
const EXPIRY_KEYS: &[&str] = &["expiresat", "expires", "expiry"];

/// Condition entries plus any exhaustion found among them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedConditions {
    pub entries: Vec<ConditionEntry>,
    /// Highest legacy exhaustion entry without an expiry.
    pub migrated_exhaustion: u32,
    /// Legacy exhaustion entries with an expiry.
    pub timed_exhaustion: Vec<ConditionEntry>,
}

/// Accepted entry shapes: a bare id string, or an object with
/// `id`/`condition`/`name`, an optional magnitude (`magnitude`, `level`,
/// `tier`, `severity`; default 1) and an optional expiry (`expiresAt`,
/// `expires`, `expiry`). A missing block means no conditions.
///
/// Ids the rule set does not know are kept; they simply have no effect.
/// Other scalar keys on an entry are kept as display extras.
pub fn validate_conditions(raw: &Value) -> Result<NormalizedConditions, SchemaError> {
    let entries = match raw {
        Value::Null => return Ok(NormalizedConditions::default()),
        Value::Array(entries) => entries,
        other => {
            return Err(SchemaError::new(
                BlockKind::Conditions,
                "",
                format!("expected an array, found {}", kind_of(other)),
            ))
        }
    };

    let mut normalized = NormalizedConditions::default();
    for (index, entry) in entries.iter().enumerate() {
        let path = format!("[{index}]");
        let condition = match entry {
            Value::String(_) => {
                ConditionEntry::new(as_identifier(entry, BlockKind::Conditions, &path)?, 1)
            }
            Value::Object(map) => validate_entry(map, &path)?,
            other => {
                return Err(SchemaError::new(
                    BlockKind::Conditions,
                    path,
                    format!("expected a condition, found {}", kind_of(other)),
                ))
            }
        };

        if condition.id != LEGACY_EXHAUSTION_ID {
            normalized.entries.push(condition);
        } else if condition.expires_at.is_some() {
            normalized.timed_exhaustion.push(condition);
        } else {
            normalized.migrated_exhaustion = normalized.migrated_exhaustion.max(condition.magnitude);
        }
    }
    Ok(normalized)
}

fn validate_entry(map: &Map<String, Value>, path: &str) -> Result<ConditionEntry, SchemaError> {
    const BLOCK: BlockKind = BlockKind::Conditions;

    let mut extras = BTreeMap::new();
    for (key, value) in map {
        let normalized = normalize_key(key);
        let known = [ID_KEYS, MAGNITUDE_KEYS, EXPIRY_KEYS]
            .iter()
            .any(|keys| keys.contains(&normalized.as_str()));
        if !known {
            keep_extra(&mut extras, key, value, BLOCK, &format!("{path}.{key}"))?;
        }
    }

    let id = lookup(map, ID_KEYS)
        .ok_or_else(|| SchemaError::new(BLOCK, path, "condition has no id"))?;
    let id = as_identifier(id, BLOCK, &format!("{path}.id"))?;

    let magnitude = match lookup(map, MAGNITUDE_KEYS) {
        Some(value) => as_u32(value, BLOCK, &format!("{path}.magnitude"))?,
        None => 1,
    };
    if magnitude == 0 {
        return Err(SchemaError::new(
            BLOCK,
            format!("{path}.magnitude"),
            "magnitude must be at least 1",
        ));
    }

    let mut entry = ConditionEntry::new(id, magnitude);
    entry.extras = extras;
    if let Some(value) = lookup(map, EXPIRY_KEYS).filter(|value| !value.is_null()) {
        entry = entry.with_expiry(as_timestamp(value, BLOCK, &format!("{path}.expiresAt"))?);
    }
    Ok(entry)
}

/// The stored level, raised to any level migrated out of the conditions
/// list. A level past the end of the rule set's ladder is rejected, as is
/// a timed legacy entry past it.
pub fn validate_exhaustion(
    raw: &Value,
    conditions: &NormalizedConditions,
    rules: &RuleSet,
) -> Result<u32, SchemaError> {
    const BLOCK: BlockKind = BlockKind::Exhaustion;

    if let Some(entry) = conditions
        .timed_exhaustion
        .iter()
        .find(|entry| entry.magnitude > rules.max_exhaustion())
    {
        return Err(SchemaError::new(
            BLOCK,
            "exhaustionLevel",
            format!(
                "timed level {} exceeds the maximum of {}",
                entry.magnitude,
                rules.max_exhaustion()
            ),
        ));
    }

    let stored = if raw.is_null() {
        0
    } else {
        as_u32(raw, BLOCK, "exhaustionLevel")?
    };
    let level = stored.max(conditions.migrated_exhaustion);
    if level > rules.max_exhaustion() {
        return Err(SchemaError::new(
            BLOCK,
            "exhaustionLevel",
            format!(
                "level {level} exceeds the maximum of {}",
                rules.max_exhaustion()
            ),
        ));
    }
    Ok(level)
}
