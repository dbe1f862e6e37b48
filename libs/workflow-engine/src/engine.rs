//! Public facade (§4.7, C9): start / resume / cancel / get / list / status,
//! composing `ActionRegistry`, `StateManager`, `Executor`, `Storage`, and
//! the `EventSink`.

use std::sync::Arc;

use tokio::sync::Semaphore;

use conduit_common::config::EngineConfig;
use conduit_domain::{Instance, InstanceId, InstanceState, StateTransitionError};
use conduit_storage::{InstanceFilter, Page, Storage, StorageError};
use serde_json::Value;
use thiserror::Error;

use crate::definition::{Definition, DefinitionError};
use crate::events::{Event, EventPayload, EventSink, NullEventSink};
use crate::executor::{Executor, ExecutorError};
use crate::parser::{self, ParseError};
use crate::registry::ActionRegistry;
use crate::state_manager::{StateManager, StateManagerError};

/// Errors the facade can raise. Validation errors (`Definition`/`Parse`)
/// surface before any `Instance` is created; everything else is raised
/// after the attempted mutation, per §7's propagation rules.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    State(#[from] StateManagerError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("an instance already exists with id {0}")]
    DuplicateInstance(InstanceId),

    #[error("cannot resume a terminal instance (state: {0})")]
    CannotResumeTerminal(InstanceState),

    #[error("cannot cancel a terminal instance (state: {0})")]
    CannotCancelTerminal(InstanceState),
}

impl From<StateTransitionError> for EngineError {
    fn from(err: StateTransitionError) -> Self {
        EngineError::State(StateManagerError::Transition(err))
    }
}

/// The `status(workflow_id)` projection (§4.7).
#[derive(Debug, Clone)]
pub struct WorkflowStatus {
    pub id: InstanceId,
    pub name: String,
    pub state: InstanceState,
    pub current_step: Option<String>,
    pub progress: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Composes the engine's components into the public API surface.
///
/// Different instances are independent and may execute in parallel (§5);
/// `concurrency` bounds how many `start`/`resume` calls this `Engine` drives
/// at once, sized by `EngineConfig::max_concurrent_instances`. It never
/// limits concurrency *within* one instance — the executor is still strictly
/// sequential per instance regardless of this bound.
pub struct Engine {
    storage: Arc<dyn Storage>,
    state: StateManager,
    executor: Executor,
    events: Arc<dyn EventSink>,
    concurrency: Arc<Semaphore>,
}

impl Engine {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        registry: ActionRegistry,
        events: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        let state = StateManager::new(storage.clone());
        let concurrency = Arc::new(Semaphore::new(config.max_concurrent_instances.max(1)));
        let executor = Executor::new(storage.clone(), registry, events.clone(), config);
        Self { storage, state, executor, events, concurrency }
    }

    /// Convenience constructor: bundled actions, a discarding event sink,
    /// default configuration.
    #[must_use]
    pub fn with_defaults(storage: Arc<dyn Storage>) -> Self {
        Self::new(storage, ActionRegistry::with_builtins(), Arc::new(NullEventSink), EngineConfig::default())
    }

    /// Start a new instance with a freshly generated id.
    pub async fn start(&self, definition: Definition, initial_data: Value) -> Result<InstanceId, EngineError> {
        self.start_with_id(InstanceId::new(), definition, initial_data).await
    }

    /// Start a new instance under a caller-chosen id, failing with
    /// `DuplicateInstance` if it's already in use.
    pub async fn start_with_id(
        &self,
        id: InstanceId,
        definition: Definition,
        initial_data: Value,
    ) -> Result<InstanceId, EngineError> {
        if self.storage.exists(&id).await? {
            return Err(EngineError::DuplicateInstance(id));
        }

        let snapshot = serde_json::to_value(&definition).map_err(ExecutorError::from)?;
        let mut instance = Instance::new(
            definition.name.clone(),
            definition.version.clone(),
            snapshot,
            initial_data.clone(),
        );
        instance.id = id;

        self.state.create(&mut instance).await?;
        self.emit(&instance, EventPayload::WorkflowStarted { initial_data }).await;

        let _permit = self.concurrency.acquire().await.expect("semaphore is never closed");
        self.executor.execute(instance).await?;
        Ok(id)
    }

    /// Parse `raw` as a declarative definition (§6.1) and start it.
    pub async fn start_declarative(&self, raw: Value, initial_data: Value) -> Result<InstanceId, EngineError> {
        let definition = parser::parse_definition(raw)?;
        self.start(definition, initial_data).await
    }

    /// Resume execution of a persisted, non-terminal instance.
    pub async fn resume(&self, id: InstanceId) -> Result<Instance, EngineError> {
        let instance = self.state.load(&id).await?;
        if instance.state.is_terminal() {
            return Err(EngineError::CannotResumeTerminal(instance.state));
        }
        let _permit = self.concurrency.acquire().await.expect("semaphore is never closed");
        Ok(self.executor.execute(instance).await?)
    }

    /// Cooperatively cancel an instance: persists `Cancelled` and emits the
    /// event, but does not interrupt an in-flight action (§5).
    pub async fn cancel(&self, id: InstanceId, reason: Option<String>) -> Result<Instance, EngineError> {
        let mut instance = self.state.load(&id).await?;
        if instance.state.is_terminal() {
            return Err(EngineError::CannotCancelTerminal(instance.state));
        }
        self.state.transition(&mut instance, InstanceState::Cancelled).await?;
        self.emit(&instance, EventPayload::WorkflowCancelled { reason }).await;
        Ok(instance)
    }

    pub async fn get(&self, id: InstanceId) -> Result<Instance, EngineError> {
        Ok(self.state.load(&id).await?)
    }

    /// List instances matching `filter`, most recently updated first by
    /// default (§4.7, §6.3).
    pub async fn list(&self, filter: InstanceFilter) -> Result<Page<Instance>, EngineError> {
        Ok(self.storage.find_instances(&filter).await?)
    }

    pub async fn status(&self, id: InstanceId) -> Result<WorkflowStatus, EngineError> {
        let instance = self.state.load(&id).await?;
        let definition: Definition =
            serde_json::from_value(instance.definition_snapshot.clone()).map_err(ExecutorError::from)?;

        Ok(WorkflowStatus {
            id: instance.id,
            name: instance.definition_name.clone(),
            state: instance.state,
            current_step: instance.current_step_id.clone(),
            progress: instance.progress(definition.steps().len()),
            created_at: instance.created_at,
            updated_at: instance.updated_at,
        })
    }

    /// Thin pass-through matching §6.2's named helper; identical to `start`.
    pub async fn start_workflow(&self, definition: Definition, initial_data: Value) -> Result<InstanceId, EngineError> {
        self.start(definition, initial_data).await
    }

    /// Thin pass-through matching §6.2's named helper; identical to `get`.
    pub async fn get_workflow(&self, id: InstanceId) -> Result<Instance, EngineError> {
        self.get(id).await
    }

    /// Thin pass-through matching §6.2's named helper; identical to `cancel`.
    pub async fn cancel_workflow(&self, id: InstanceId, reason: Option<String>) -> Result<Instance, EngineError> {
        self.cancel(id, reason).await
    }

    /// Thin pass-through matching §6.2's named helper; identical to `list`.
    pub async fn list_workflows(&self, filter: InstanceFilter) -> Result<Page<Instance>, EngineError> {
        self.list(filter).await
    }

    async fn emit(&self, instance: &Instance, payload: EventPayload) {
        let event = Event::new(instance.id, instance.definition_name.clone(), payload);
        if let Err(err) = self.events.emit(event).await {
            tracing::warn!(instance_id = %instance.id, %err, "event sink delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use conduit_storage::InMemoryStorage;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::with_defaults(Arc::new(InMemoryStorage::new()))
    }

    #[tokio::test]
    async fn start_runs_to_completion_and_get_reflects_it() {
        let engine = engine();
        let definition = Builder::create("t").log("a", "hi").unwrap().build().unwrap();

        let id = engine.start(definition, json!({})).await.unwrap();
        let instance = engine.get(id).await.unwrap();

        assert_eq!(instance.state, InstanceState::Completed);
    }

    #[tokio::test]
    async fn start_with_id_rejects_a_duplicate() {
        let engine = engine();
        let definition = Builder::create("t").log("a", "hi").unwrap().build().unwrap();
        let id = InstanceId::new();

        engine.start_with_id(id, definition.clone(), json!({})).await.unwrap();
        let err = engine.start_with_id(id, definition, json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateInstance(_)));
    }

    #[tokio::test]
    async fn resume_rejects_a_terminal_instance() {
        let engine = engine();
        let definition = Builder::create("t").log("a", "hi").unwrap().build().unwrap();
        let id = engine.start(definition, json!({})).await.unwrap();

        let err = engine.resume(id).await.unwrap_err();
        assert!(matches!(err, EngineError::CannotResumeTerminal(InstanceState::Completed)));
    }

    #[tokio::test]
    async fn cancel_transitions_to_cancelled_and_blocks_further_cancel() {
        let engine = engine();
        let definition = Builder::create("t").delay("wait", 60_000).unwrap().build().unwrap();
        let id = InstanceId::new();

        // Seed directly so the instance is Running without waiting out the delay.
        let snapshot = serde_json::to_value(&definition).unwrap();
        let mut instance = Instance::new(definition.name.clone(), definition.version.clone(), snapshot, json!({}));
        instance.id = id;
        instance.state = InstanceState::Running;
        instance.current_step_id = Some("wait".to_string());
        engine.storage.save(&instance).await.unwrap();

        let cancelled = engine.cancel(id, Some("user request".to_string())).await.unwrap();
        assert_eq!(cancelled.state, InstanceState::Cancelled);

        let err = engine.cancel(id, None).await.unwrap_err();
        assert!(matches!(err, EngineError::CannotCancelTerminal(InstanceState::Cancelled)));
    }

    #[tokio::test]
    async fn concurrency_bound_serializes_instances_past_the_configured_limit() {
        let config = EngineConfig { max_concurrent_instances: 1, ..EngineConfig::default() };
        let engine = Engine::new(
            Arc::new(InMemoryStorage::new()),
            ActionRegistry::with_builtins(),
            Arc::new(NullEventSink),
            config,
        );
        let definition = Builder::create("t").delay("wait", 30).unwrap().build().unwrap();

        let started = tokio::time::Instant::now();
        let (a, b) = tokio::join!(
            engine.start(definition.clone(), json!({})),
            engine.start(definition, json!({})),
        );
        a.unwrap();
        b.unwrap();

        assert!(started.elapsed() >= std::time::Duration::from_millis(60));
    }

    #[tokio::test]
    async fn status_reports_progress_and_current_step() {
        let engine = engine();
        let definition = Builder::create("t")
            .log("a", "hi")
            .unwrap()
            .log("b", "hi")
            .unwrap()
            .build()
            .unwrap();
        let id = engine.start(definition, json!({})).await.unwrap();

        let status = engine.status(id).await.unwrap();
        assert_eq!(status.state, InstanceState::Completed);
        assert_eq!(status.progress, 100.0);
    }
}
