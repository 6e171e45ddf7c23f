//! Ability identifiers and scored abilities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Short ability identifier (e.g. `STR`, `DEX`).
///
/// Always stored trimmed and uppercase so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AbilityId(String);

impl AbilityId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AbilityId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for AbilityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<AbilityId> for String {
    fn from(value: AbilityId) -> Self {
        value.0
    }
}

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ability score with its derived modifier, as rendered on the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityScore {
    pub ability: AbilityId,
    pub score: i64,
    pub modifier: i64,
}
