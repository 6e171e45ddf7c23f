//! Application state and composition.

use std::sync::Arc;

use sigilforge_domain::RuleSet;

use crate::infrastructure::ports::{CharacterStore, ClockPort};
use crate::infrastructure::retry::RetryConfig;
use crate::use_cases;

/// Main application state.
///
/// Handlers reach the store and rule set only through the use cases.
/// Passed to HTTP handlers via Axum state.
pub struct App {
    pub use_cases: UseCases,
}

/// Container for all use cases.
pub struct UseCases {
    pub recompute: Arc<use_cases::RecomputeCoordinator>,
}

impl App {
    pub fn new(
        store: Arc<dyn CharacterStore>,
        clock: Arc<dyn ClockPort>,
        rules: RuleSet,
        retry: RetryConfig,
    ) -> Self {
        let recompute = Arc::new(use_cases::RecomputeCoordinator::new(
            store,
            clock,
            Arc::new(rules),
            retry,
        ));

        Self {
            use_cases: UseCases { recompute },
        }
    }
}
