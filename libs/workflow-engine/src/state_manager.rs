//! Mediates every `Instance` mutation through `Storage` (§2 C7): nothing
//! outside this module writes to an instance's persisted record, and every
//! state-affecting operation is followed immediately by a `save`.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use conduit_domain::{FailedStep, Instance, InstanceId, InstanceState, StateTransitionError};
use conduit_storage::{Storage, StorageError};
use thiserror::Error;

use crate::context::merge_into;

/// Errors raised while mutating an instance through the `StateManager`.
#[derive(Debug, Error)]
pub enum StateManagerError {
    #[error("instance not found: {0}")]
    NotFound(InstanceId),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transition(#[from] StateTransitionError),
}

/// The single mediator through which `Instance` mutations are persisted.
///
/// Every method here mutates the in-memory `Instance` and immediately
/// persists it before returning, bumping `updated_at` strictly forward (see
/// `next_timestamp`) so the monotonicity invariant (§8) holds even when two
/// mutations land within the same clock tick.
#[derive(Clone)]
pub struct StateManager {
    storage: Arc<dyn Storage>,
}

impl StateManager {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Persist a brand-new instance, bumping its in-memory version to match
    /// what `Storage::save` just stored (every `save` increments the
    /// stored version by one). Without this, the caller's copy stays at
    /// its pre-save version and the very next mutation through this
    /// mediator would be rejected as a stale write.
    pub async fn create(&self, instance: &mut Instance) -> Result<(), StateManagerError> {
        self.storage.save(instance).await?;
        instance.version += 1;
        Ok(())
    }

    pub async fn load(&self, id: &InstanceId) -> Result<Instance, StateManagerError> {
        self.storage
            .load(id)
            .await?
            .ok_or(StateManagerError::NotFound(*id))
    }

    /// Transition `instance.state` to `target`, rejecting the move if it's
    /// not allowed from the current state (§4.3).
    pub async fn transition(
        &self,
        instance: &mut Instance,
        target: InstanceState,
    ) -> Result<(), StateManagerError> {
        instance.state = instance.state.transition(target)?;
        self.persist(instance).await
    }

    /// Pin the step the executor is about to attempt.
    pub async fn set_current_step(
        &self,
        instance: &mut Instance,
        step_id: Option<String>,
    ) -> Result<(), StateManagerError> {
        instance.current_step_id = step_id;
        self.persist(instance).await
    }

    /// Record a step as completed and merge its result data into the
    /// instance's data. Idempotent: re-marking an already-completed step
    /// leaves `completed_steps` unchanged (§8 idempotence).
    pub async fn complete_step(
        &self,
        instance: &mut Instance,
        step_id: &str,
        result_data: &serde_json::Value,
    ) -> Result<(), StateManagerError> {
        if !instance.has_completed(step_id) {
            instance.completed_steps.push(step_id.to_string());
        }
        merge_into(&mut instance.data, result_data);
        self.persist(instance).await
    }

    /// Append a step failure to the append-only `failed_steps` log.
    pub async fn record_step_failure(
        &self,
        instance: &mut Instance,
        step_id: &str,
        error: &str,
    ) -> Result<(), StateManagerError> {
        instance.failed_steps.push(FailedStep {
            step_id: step_id.to_string(),
            error: error.to_string(),
            failed_at: Utc::now(),
        });
        self.persist(instance).await
    }

    /// Transition to `Failed` and set `error_message` (§4.6 step 4).
    pub async fn fail_workflow(
        &self,
        instance: &mut Instance,
        error: &str,
    ) -> Result<(), StateManagerError> {
        instance.state = instance.state.transition(InstanceState::Failed)?;
        instance.error_message = Some(error.to_string());
        self.persist(instance).await
    }

    async fn persist(&self, instance: &mut Instance) -> Result<(), StateManagerError> {
        instance.updated_at = next_timestamp(instance.updated_at);
        self.storage.save(instance).await?;
        instance.version += 1;
        Ok(())
    }
}

/// `Utc::now()`, nudged forward by at least one microsecond past `previous`
/// so successive persisted revisions of the same instance never share (or
/// regress) a timestamp, even on platforms with coarse clock resolution.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    let floor = previous + ChronoDuration::microseconds(1);
    now.max(floor)
}
