//! Type coercions shared by the block validators.
//!
//! Legacy sheets stored numbers as strings and flags as "yes"/"no"; these
//! helpers accept those spellings and reject anything that would need a
//! guess.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::{BlockKind, SchemaError};

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Lowercase with separators removed, so `max_hp`, `maxHp` and `max-hp`
/// compare equal.
pub(crate) fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

pub(crate) fn as_int(value: &Value, block: BlockKind, field: &str) -> Result<i64, SchemaError> {
    let parsed = match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        SchemaError::new(
            block,
            field,
            format!("expected an integer, found {} `{}`", kind_of(value), value),
        )
    })
}

pub(crate) fn as_non_negative(
    value: &Value,
    block: BlockKind,
    field: &str,
) -> Result<i64, SchemaError> {
    let parsed = as_int(value, block, field)?;
    if parsed < 0 {
        return Err(SchemaError::new(
            block,
            field,
            format!("must not be negative, found {parsed}"),
        ));
    }
    Ok(parsed)
}

pub(crate) fn as_u32(value: &Value, block: BlockKind, field: &str) -> Result<u32, SchemaError> {
    let parsed = as_non_negative(value, block, field)?;
    u32::try_from(parsed)
        .map_err(|_| SchemaError::new(block, field, format!("{parsed} is out of range")))
}

pub(crate) fn as_bool(value: &Value, block: BlockKind, field: &str) -> Result<bool, SchemaError> {
    let parsed = match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| {
        SchemaError::new(
            block,
            field,
            format!("expected a boolean, found {} `{}`", kind_of(value), value),
        )
    })
}

/// Identifiers: strings, or integers from sheets that used numeric ids.
pub(crate) fn as_identifier(
    value: &Value,
    block: BlockKind,
    field: &str,
) -> Result<String, SchemaError> {
    let parsed = match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(number.to_string()),
        _ => None,
    };
    match parsed {
        Some(id) if !id.is_empty() => Ok(id),
        Some(_) => Err(SchemaError::new(block, field, "identifier is empty")),
        None => Err(SchemaError::new(
            block,
            field,
            format!("expected an identifier, found {}", kind_of(value)),
        )),
    }
}

pub(crate) fn as_object<'a>(
    value: &'a Value,
    block: BlockKind,
    field: &str,
) -> Result<&'a Map<String, Value>, SchemaError> {
    value.as_object().ok_or_else(|| {
        SchemaError::new(
            block,
            field,
            format!("expected an object, found {}", kind_of(value)),
        )
    })
}

/// RFC 3339 strings, or integer unix seconds from older records.
pub(crate) fn as_timestamp(
    value: &Value,
    block: BlockKind,
    field: &str,
) -> Result<DateTime<Utc>, SchemaError> {
    let parsed = match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    };
    parsed.ok_or_else(|| {
        SchemaError::new(
            block,
            field,
            format!("expected an RFC 3339 timestamp, found `{value}`"),
        )
    })
}

/// Keep an unrecognized field if it is a harmless scalar; reject anything
/// structured, since it most likely carries data we would misread.
pub(crate) fn keep_extra(
    extras: &mut BTreeMap<String, Value>,
    key: &str,
    value: &Value,
    block: BlockKind,
    path: &str,
) -> Result<(), SchemaError> {
    if is_scalar(value) {
        extras.insert(key.to_string(), value.clone());
        Ok(())
    } else {
        Err(SchemaError::new(
            block,
            path,
            format!("unrecognized {} field", kind_of(value)),
        ))
    }
}

/// First present key among `aliases` (compared with `normalize_key`).
pub(crate) fn lookup<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    map.iter()
        .find(|(key, _)| aliases.contains(&normalize_key(key).as_str()))
        .map(|(_, value)| value)
}

pub(crate) fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}
