//! Error types for the derivation pipeline.
//!
//! Each stage has its own error so callers can tell an input-data defect
//! (`SchemaError`) from a rule configuration defect (`CompositionError`,
//! `RuleSetError`). `DerivationError` is what the full pipeline returns.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named sub-document of a character's stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    Level,
    Attributes,
    Combat,
    Senses,
    Inventory,
    Spellcasting,
    Conditions,
    Exhaustion,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Attributes => "attributes",
            Self::Combat => "combat",
            Self::Senses => "senses",
            Self::Inventory => "inventory",
            Self::Spellcasting => "spellcasting",
            Self::Conditions => "conditions",
            Self::Exhaustion => "exhaustion",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored block could not be normalized into its strict shape.
///
/// Input-data defect: never retried, surfaced with the offending block and
/// field path (e.g. `items[2].bonuses[0].target`).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Schema error in {block} block at `{field}`: {reason}")]
pub struct SchemaError {
    pub block: BlockKind,
    pub field: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(block: BlockKind, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            block,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Composing the snapshot would leave a derived field undefined or
/// inconsistent. Indicates a rule configuration defect.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Composition error for `{field}`: {reason}")]
pub struct CompositionError {
    pub field: String,
    pub reason: String,
}

impl CompositionError {
    pub fn new(field: impl ToString, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure of the full derivation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Composition(#[from] CompositionError),
}

/// The rule set is internally inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSetError {
    #[error("Invalid rule set: {0}")]
    Invalid(String),
}

impl RuleSetError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// A string did not name a known value of a closed enumeration
/// (derived field, modifier operation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: `{value}`")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
