//! Value objects - Immutable objects defined by their attributes

mod ability;
mod derived_field;
mod modifier;

pub use ability::{AbilityId, AbilityScore};
pub use derived_field::DerivedField;
pub use modifier::{Modifier, ModifierOp, ModifierSource, SourceKind};
