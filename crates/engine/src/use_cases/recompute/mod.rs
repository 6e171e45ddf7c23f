//! Snapshot recompute use case.
//!
//! Loads a character's base state, runs the derivation pipeline and
//! persists the resulting snapshot. Concurrent requests for one character
//! coalesce onto a single computation; different characters never wait on
//! each other.

mod error;
mod single_flight;

pub use error::RecomputeError;
pub use single_flight::SingleFlight;

use std::sync::Arc;

use sigilforge_domain::{
    derive_snapshot, normalize_state, CharacterId, DerivationError, DerivationRequest,
    DerivedSnapshot, RawCharacterState, RuleSet,
};
use tracing::{instrument, Instrument};

use crate::infrastructure::correlation::RequestContext;
use crate::infrastructure::ports::{CharacterStore, ClockPort, StoreError};
use crate::infrastructure::retry::{retry_with_backoff, RetryConfig};

/// Coordinates snapshot recomputation and persistence.
pub struct RecomputeCoordinator {
    store: Arc<dyn CharacterStore>,
    clock: Arc<dyn ClockPort>,
    rules: Arc<RuleSet>,
    retry: RetryConfig,
    in_flight: SingleFlight<CharacterId, Arc<DerivedSnapshot>, RecomputeError>,
}

impl RecomputeCoordinator {
    pub fn new(
        store: Arc<dyn CharacterStore>,
        clock: Arc<dyn ClockPort>,
        rules: Arc<RuleSet>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            clock,
            rules,
            retry,
            in_flight: SingleFlight::new(),
        }
    }

    /// Recompute and persist the snapshot for `id`.
    ///
    /// Joins a computation already running for the same character instead
    /// of starting a second one. The computation runs on its own task, so
    /// dropping this future never interrupts a write.
    #[instrument(
        skip(self, ctx),
        fields(character_id = %id, correlation_id = %ctx.correlation_id, user = %ctx.user_label())
    )]
    pub async fn recompute(
        &self,
        ctx: &RequestContext,
        id: CharacterId,
    ) -> Result<Arc<DerivedSnapshot>, RecomputeError> {
        let job = RecomputeJob {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            rules: Arc::clone(&self.rules),
            retry: self.retry.clone(),
            id,
        };
        self.in_flight
            .run(id, move || job.run().in_current_span(), RecomputeError::Aborted)
            .await
    }

    /// The last persisted snapshot, `None` if the character has never been
    /// derived.
    pub async fn latest_snapshot(
        &self,
        id: CharacterId,
    ) -> Result<Option<DerivedSnapshot>, RecomputeError> {
        let record = self
            .store
            .load(id)
            .await?
            .ok_or(RecomputeError::NotFound(id))?;
        Ok(record.snapshot)
    }

    /// Replace the base state, then recompute.
    ///
    /// The state is validated before anything is written. A computation
    /// that started before the write is allowed to finish first so the
    /// returned snapshot always reflects the new state.
    #[instrument(
        skip(self, ctx, state),
        fields(character_id = %id, correlation_id = %ctx.correlation_id, user = %ctx.user_label())
    )]
    pub async fn update_state(
        &self,
        ctx: &RequestContext,
        id: CharacterId,
        state: RawCharacterState,
    ) -> Result<Arc<DerivedSnapshot>, RecomputeError> {
        if let Err(e) = normalize_state(&state, &self.rules) {
            tracing::warn!(error = %e, "Rejected character state update");
            return Err(e.into());
        }
        self.store.save_state(id, &state).await?;
        tracing::debug!("Stored new base state");

        self.in_flight.wait(&id).await;
        self.recompute(ctx, id).await
    }
}

/// Everything one computation needs, owned so it can run on its own task.
struct RecomputeJob {
    store: Arc<dyn CharacterStore>,
    clock: Arc<dyn ClockPort>,
    rules: Arc<RuleSet>,
    retry: RetryConfig,
    id: CharacterId,
}

impl RecomputeJob {
    async fn run(self) -> Result<Arc<DerivedSnapshot>, RecomputeError> {
        let record = self
            .store
            .load(self.id)
            .await?
            .ok_or(RecomputeError::NotFound(self.id))?;
        let previous_version = record.snapshot.as_ref().map(DerivedSnapshot::version);

        let snapshot = derive_snapshot(DerivationRequest {
            character_id: self.id,
            raw: &record.state,
            rules: &self.rules,
            as_of: self.clock.now(),
            previous_version,
        })
        .map_err(|e| {
            match &e {
                DerivationError::Schema(err) => {
                    tracing::warn!(error = %err, "Stored character state is invalid")
                }
                DerivationError::Composition(err) => {
                    tracing::error!(error = %err, "Snapshot composition failed")
                }
            }
            RecomputeError::from(e)
        })?;

        retry_with_backoff(&self.retry, "save_snapshot", StoreError::is_retryable, || {
            self.store.save_snapshot(self.id, &snapshot)
        })
        .await?;

        tracing::info!(
            version = snapshot.version(),
            conditions = snapshot.conditions().len(),
            exhaustion_level = snapshot.exhaustion_level(),
            "Snapshot recomputed"
        );
        Ok(Arc::new(snapshot))
    }
}
