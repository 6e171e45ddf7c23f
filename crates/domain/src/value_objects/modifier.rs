//! Modifier, ModifierOp, and ModifierSource - attributed contributions to
//! derived fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::value_objects::{AbilityId, DerivedField};

/// How a modifier combines with the running value of its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModifierOp {
    Additive,
    /// Amount is a percentage: 50 halves, 200 doubles.
    Multiplicative,
    Override,
    MinCap,
    MaxCap,
}

impl ModifierOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Additive => "additive",
            Self::Multiplicative => "multiplicative",
            Self::Override => "override",
            Self::MinCap => "minCap",
            Self::MaxCap => "maxCap",
        }
    }
}

impl fmt::Display for ModifierOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModifierOp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "additive" | "add" | "bonus" | "+" => Ok(Self::Additive),
            "multiplicative" | "multiply" | "mul" | "x" | "*" => Ok(Self::Multiplicative),
            "override" | "set" => Ok(Self::Override),
            "mincap" | "min" | "floor" => Ok(Self::MinCap),
            "maxcap" | "max" | "ceiling" | "cap" => Ok(Self::MaxCap),
            _ => Err(ParseError::new("modifier operation", s)),
        }
    }
}

/// Where a modifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Level,
    Attribute,
    Equipment,
    Spellcasting,
    Condition,
    Exhaustion,
}

/// Attribution for a modifier, so the sheet can explain "why" a number is
/// what it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierSource {
    kind: SourceKind,
    id: String,
}

impl ModifierSource {
    pub fn new(kind: SourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn level(level: u32) -> Self {
        Self::new(SourceKind::Level, level.to_string())
    }

    pub fn attribute(ability: &AbilityId) -> Self {
        Self::new(SourceKind::Attribute, ability.as_str())
    }

    pub fn equipment(item_id: impl Into<String>) -> Self {
        Self::new(SourceKind::Equipment, item_id)
    }

    pub fn spellcasting(id: impl Into<String>) -> Self {
        Self::new(SourceKind::Spellcasting, id)
    }

    pub fn condition(condition_id: impl Into<String>) -> Self {
        Self::new(SourceKind::Condition, condition_id)
    }

    pub fn exhaustion(tier: usize) -> Self {
        Self::new(SourceKind::Exhaustion, tier.to_string())
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ModifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            SourceKind::Level => "level",
            SourceKind::Attribute => "attribute",
            SourceKind::Equipment => "equipment",
            SourceKind::Spellcasting => "spellcasting",
            SourceKind::Condition => "condition",
            SourceKind::Exhaustion => "exhaustion",
        };
        write!(f, "{kind}:{}", self.id)
    }
}

/// A single named contribution to a derived field.
///
/// This is an immutable value object; the pipeline only ever appends new
/// modifiers, it never edits one in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    source: ModifierSource,
    target: DerivedField,
    op: ModifierOp,
    amount: i64,
}

impl Modifier {
    pub fn new(source: ModifierSource, target: DerivedField, op: ModifierOp, amount: i64) -> Self {
        Self {
            source,
            target,
            op,
            amount,
        }
    }

    pub fn additive(source: ModifierSource, target: DerivedField, amount: i64) -> Self {
        Self::new(source, target, ModifierOp::Additive, amount)
    }

    pub fn source(&self) -> &ModifierSource {
        &self.source
    }

    pub fn target(&self) -> DerivedField {
        self.target
    }

    pub fn op(&self) -> ModifierOp {
        self.op
    }

    /// Signed amount; a percentage for `Multiplicative`.
    pub fn amount(&self) -> i64 {
        self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_op_accepts_legacy_spellings() {
        assert_eq!("add".parse::<ModifierOp>(), Ok(ModifierOp::Additive));
        assert_eq!("min-cap".parse::<ModifierOp>(), Ok(ModifierOp::MinCap));
        assert_eq!("max_cap".parse::<ModifierOp>(), Ok(ModifierOp::MaxCap));
        assert_eq!("SET".parse::<ModifierOp>(), Ok(ModifierOp::Override));
        assert!("divide".parse::<ModifierOp>().is_err());
    }

    #[test]
    fn source_displays_kind_and_id() {
        let source = ModifierSource::equipment("ring-of-protection");
        assert_eq!(source.to_string(), "equipment:ring-of-protection");
        assert_eq!(ModifierSource::exhaustion(2).to_string(), "exhaustion:2");
    }

    #[test]
    fn modifier_serializes_with_camel_case_fields() {
        let modifier = Modifier::new(
            ModifierSource::condition("restrained"),
            DerivedField::Speed,
            ModifierOp::Override,
            0,
        );
        let json = serde_json::to_value(&modifier).unwrap();
        assert_eq!(json["target"], "speed");
        assert_eq!(json["op"], "override");
        assert_eq!(json["source"]["kind"], "condition");
    }
}
