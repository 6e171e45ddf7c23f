//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod clock;
pub mod correlation;
pub mod persistence;
pub mod ports;
pub mod retry;
pub mod rules;
