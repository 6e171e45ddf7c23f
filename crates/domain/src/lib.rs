pub mod character;
pub mod derivation;
pub mod error;
pub mod ids;
pub mod rules;
pub mod snapshot;
pub mod validation;
pub mod value_objects;

// Re-export character state types
pub use character::{
    AttributesBlock, CharacterState, CombatBlockBase, ConditionEntry, InventoryBlock,
    InventoryItem, ItemBonus, RawCharacterState, SensesBlockBase, SpellcastingBlockBase,
};

// Re-export the pipeline entry points
pub use derivation::{
    apply_conditions_and_exhaustion, base_values, compose, derive_snapshot, resolve_modifiers,
    CompositionInput, DerivationRequest, LayeredModifiers,
};
pub use validation::normalize_state;

pub use error::{
    BlockKind, CompositionError, DerivationError, ParseError, RuleSetError, SchemaError,
};

// Re-export ID types
pub use ids::{CharacterId, UserId};

pub use rules::{
    AbilityFieldRule, AbilityModifierFormula, BaseDefaults, BonusSlotRule, ConditionRule,
    EffectRule, ExhaustionTier, RuleSet, ScoreRange, SpellcastingRules,
};

pub use snapshot::{
    BlockExtras, CombatStats, DerivedSnapshot, EffectiveCondition, FieldValue, ItemSummary,
    SensesStats, SpellcastingStats,
};

pub use value_objects::{
    AbilityId, AbilityScore, DerivedField, Modifier, ModifierOp, ModifierSource, SourceKind,
};
