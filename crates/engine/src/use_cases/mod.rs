//! Use cases - User story orchestration.
//!
//! Each module contains use cases for a specific domain area.
//! Use cases orchestrate across ports and the domain pipeline.

pub mod recompute;

pub use recompute::{RecomputeCoordinator, RecomputeError};
