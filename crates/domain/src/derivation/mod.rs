//! The derivation pipeline.
//!
//! `derive_snapshot` runs every stage in order:
//! validators -> resolver -> condition/exhaustion layer -> compositor.
//! Each stage is a pure function of its inputs, so the whole pipeline is
//! deterministic for a given stored state, rule set and evaluation instant.

mod compositor;
mod conditions;
mod resolver;

pub use compositor::{base_values, compose, CompositionInput};
pub use conditions::{apply_conditions_and_exhaustion, LayeredModifiers};
pub use resolver::resolve_modifiers;

use chrono::{DateTime, Utc};

use crate::character::RawCharacterState;
use crate::error::DerivationError;
use crate::ids::CharacterId;
use crate::rules::RuleSet;
use crate::snapshot::DerivedSnapshot;
use crate::validation::normalize_state;

/// Inputs for one full derivation.
#[derive(Debug, Clone, Copy)]
pub struct DerivationRequest<'a> {
    pub character_id: CharacterId,
    pub raw: &'a RawCharacterState,
    pub rules: &'a RuleSet,
    /// Decides which conditions have expired; also stamps the snapshot.
    pub as_of: DateTime<Utc>,
    pub previous_version: Option<u64>,
}

pub fn derive_snapshot(request: DerivationRequest<'_>) -> Result<DerivedSnapshot, DerivationError> {
    let DerivationRequest {
        character_id,
        raw,
        rules,
        as_of,
        previous_version,
    } = request;

    let state = normalize_state(raw, rules)?;
    let resolved = resolve_modifiers(&state, rules)?;
    let layered = apply_conditions_and_exhaustion(
        resolved,
        &state.conditions,
        state.exhaustion_at(as_of),
        rules,
        as_of,
    )?;

    let snapshot = compose(CompositionInput {
        character_id,
        state: &state,
        rules,
        bases: base_values(&state, rules)?,
        modifiers: layered.modifiers,
        conditions: layered.conditions,
        previous_version,
        computed_at: as_of,
    })?;
    Ok(snapshot)
}
