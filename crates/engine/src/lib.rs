//! Sigilforge Engine library.
//!
//! Server-side half of the derived character snapshot engine.
//!
//! ## Structure
//!
//! - `use_cases/` - Recompute coordination (single-flight, persistence retry)
//! - `infrastructure/` - Ports, store adapters, rule loading, retry
//! - `api/` - HTTP entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

/// Test fixtures shared by unit tests across modules.
#[cfg(test)]
pub mod test_fixtures;

pub use app::App;
