//! The durable, mutable execution record of a workflow definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::InstanceId;
use crate::state::InstanceState;

/// A single recorded step failure. Append-only: instances accumulate these
/// across retries and across distinct steps, they are never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedStep {
    pub step_id: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// A durable execution of a `Definition`.
///
/// `Instance` is the only mutable aggregate in the system; every mutation is
/// expected to go through a mediator that persists the result immediately
/// (see `conduit_workflow_engine::state_manager::StateManager`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,

    /// Name of the definition this instance was started from.
    pub definition_name: String,
    /// Version tag of the definition this instance was started from.
    pub definition_version: String,
    /// A serialized snapshot of the definition at start time, so that later
    /// edits to a named definition don't desynchronize in-flight instances.
    pub definition_snapshot: serde_json::Value,

    pub state: InstanceState,

    /// Merged data context, updated by successful step results.
    pub data: serde_json::Value,

    /// The step currently selected for execution, if any.
    pub current_step_id: Option<String>,

    /// Steps completed so far, in completion order. Each id appears at most once.
    pub completed_steps: Vec<String>,

    /// Append-only log of step failures (including retried attempts).
    pub failed_steps: Vec<FailedStep>,

    /// Set when the instance enters `Failed`.
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Optimistic-concurrency version. Storage implementations that support
    /// conflict detection bump this on every `save` and reject a `save`
    /// whose incoming version does not match what is currently stored.
    pub version: u64,
}

impl Instance {
    /// Construct a brand-new instance in `Pending` state.
    #[must_use]
    pub fn new(
        definition_name: impl Into<String>,
        definition_version: impl Into<String>,
        definition_snapshot: serde_json::Value,
        initial_data: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InstanceId::new(),
            definition_name: definition_name.into(),
            definition_version: definition_version.into(),
            definition_snapshot,
            state: InstanceState::Pending,
            data: initial_data,
            current_step_id: None,
            completed_steps: Vec::new(),
            failed_steps: Vec::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[must_use]
    pub fn is_complete(&self, total_steps: usize) -> bool {
        self.state == InstanceState::Completed && self.completed_steps.len() <= total_steps
    }

    /// `|completed_steps| / |definition.steps| * 100`, per the progress contract.
    #[must_use]
    pub fn progress(&self, total_steps: usize) -> f64 {
        if total_steps == 0 {
            return 100.0;
        }
        (self.completed_steps.len() as f64 / total_steps as f64) * 100.0
    }

    #[must_use]
    pub fn has_completed(&self, step_id: &str) -> bool {
        self.completed_steps.iter().any(|s| s == step_id)
    }
}
