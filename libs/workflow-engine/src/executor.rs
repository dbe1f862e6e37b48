//! The core scheduling loop (§4.4–4.6, C8): selects the next step(s),
//! invokes actions, applies retry/timeout/compensation, and persists every
//! state-affecting operation through the `StateManager`.
//!
//! The spec describes this as a recursive "on success, recurse to step 2"
//! procedure; per §9's design note we convert that to the `loop` below to
//! bound the call stack on long-running workflows.

use std::sync::Arc;
use std::time::Duration;

use conduit_common::config::{BackoffStrategy, EngineConfig};
use conduit_domain::{Instance, InstanceState};
use conduit_storage::Storage;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::action::ActionResult;
use crate::context::Context;
use crate::definition::{Definition, Step};
use crate::events::{Event, EventPayload, EventSink};
use crate::registry::ActionRegistry;
use crate::state_manager::{StateManager, StateManagerError};

/// Errors the executor can raise. Per §7, a step's exhausted failure is
/// recovered locally (persisted `FAILED` + `WorkflowFailed`) and then
/// re-raised here for the caller of `start`/`resume`.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    State(#[from] StateManagerError),

    #[error("malformed definition snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// A step failed (after any retries) and the instance has been
    /// persisted as `FAILED`.
    #[error("step '{step_id}' failed: {error}")]
    StepExecutionFailed { step_id: String, error: String },

    /// A safety bound on how many candidate-selection passes a single
    /// `execute` call may run, guarding against a definition whose graph
    /// somehow never converges. Should not occur for any definition that
    /// passed `Definition::new`'s validation.
    #[error("exceeded the maximum number of scheduling passes for this instance")]
    PassBudgetExceeded,
}

/// Bound on scheduling passes per `execute` call: generous enough that no
/// legitimate workflow should ever hit it, but finite so a defect in graph
/// construction can't hang a caller forever.
const MAX_PASSES_PER_STEP: usize = 64;

/// Drives a single `Instance` through the step-selection/execution loop.
pub struct Executor {
    registry: ActionRegistry,
    state: StateManager,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl Executor {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        registry: ActionRegistry,
        events: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            state: StateManager::new(storage),
            events,
            config,
        }
    }

    /// Run the scheduling loop on `instance` until it completes, fails,
    /// stalls waiting on an external signal, or a fatal error occurs.
    pub async fn execute(&self, mut instance: Instance) -> Result<Instance, ExecutorError> {
        if instance.state.is_terminal() {
            return Ok(instance);
        }

        let definition: Definition = serde_json::from_value(instance.definition_snapshot.clone())?;

        if instance.state != InstanceState::Running {
            self.state.transition(&mut instance, InstanceState::Running).await?;
        }

        let max_passes = MAX_PASSES_PER_STEP * (definition.steps().len() + 1);
        for _ in 0..max_passes {
            let candidates = self.select_candidates(&definition, &instance);

            if candidates.is_empty() {
                self.state.transition(&mut instance, InstanceState::Completed).await?;
                self.emit(&instance, EventPayload::WorkflowCompleted).await;
                return Ok(instance);
            }

            match self.run_pass(&definition, &mut instance, &candidates).await? {
                PassOutcome::Advanced => continue,
                PassOutcome::Stalled => {
                    if instance.state == InstanceState::Running {
                        self.state.transition(&mut instance, InstanceState::Waiting).await?;
                    }
                    return Ok(instance);
                }
                PassOutcome::Failed { step_id, error } => {
                    return Err(ExecutorError::StepExecutionFailed { step_id, error });
                }
            }
        }

        Err(ExecutorError::PassBudgetExceeded)
    }

    /// §4.4 step 2, refined for resume: if `current_step_id` points at a
    /// step that hasn't completed yet, that step was pinned mid-attempt
    /// (possibly by a process that has since crashed, §8 scenario 6) and is
    /// retried directly rather than recomputed from the graph.
    fn select_candidates<'a>(&self, definition: &'a Definition, instance: &Instance) -> Vec<&'a Step> {
        if let Some(current) = instance.current_step_id.as_deref() {
            if !instance.has_completed(current) {
                return definition.step(current).into_iter().collect();
            }
        }
        definition.next_steps(instance.current_step_id.as_deref(), &instance.data)
    }

    /// Attempt every candidate from a single `select_candidates` pass, in
    /// declaration order (§4.4 "ordering and fan-out"). Stops at the first
    /// candidate that actually executes (success recurses; failure
    /// terminates the instance), matching the spec's per-candidate recurse.
    async fn run_pass(
        &self,
        definition: &Definition,
        instance: &mut Instance,
        candidates: &[&Step],
    ) -> Result<PassOutcome, ExecutorError> {
        let mut advanced = false;

        for step in candidates {
            if instance.has_completed(&step.id) {
                continue;
            }
            if step.prerequisites.iter().any(|p| !instance.has_completed(p)) {
                continue;
            }
            if !step.conditions_hold(&instance.data) {
                // Advance `current_step_id` to the skipped step itself, not
                // just mark it completed — otherwise the next pass recomputes
                // `next_steps` from the same `current_step_id` as this pass,
                // sees the (now-completed) step again, and stalls instead of
                // continuing the chain past it.
                self.state.set_current_step(instance, Some(step.id.clone())).await?;
                self.state.complete_step(instance, &step.id, &Value::Object(Map::new())).await?;
                advanced = true;
                continue;
            }

            self.state.set_current_step(instance, Some(step.id.clone())).await?;

            let action = match self.registry.resolve(step.action_ref.as_deref().unwrap_or(&step.id)) {
                Ok(action) => action,
                Err(err) => {
                    return self.handle_step_failure(definition, instance, step, err.to_string()).await;
                }
            };

            let mut config = action.default_config();
            for (key, value) in &step.config {
                config.insert(key.clone(), value.clone());
            }
            let context = Context::new(instance.id, step.id.clone(), instance.data.clone(), config);

            if !action.can_execute(&context).await {
                continue;
            }

            let result = self.invoke_with_retry(action.as_ref(), &context, step, instance).await?;

            match result {
                ActionResult::Success { data, .. } => {
                    let result_data = Value::Object(data);
                    self.state
                        .complete_step(instance, &step.id, &result_data)
                        .await?;
                    self.emit(
                        instance,
                        EventPayload::StepCompleted {
                            step_id: step.id.clone(),
                            result_data,
                        },
                    )
                    .await;
                    return Ok(PassOutcome::Advanced);
                }
                ActionResult::Failure { error, .. } => {
                    return self.handle_step_failure(definition, instance, step, error).await;
                }
            }
        }

        Ok(if advanced { PassOutcome::Advanced } else { PassOutcome::Stalled })
    }

    /// §4.5: invoke `action.execute`, bounded by `step.timeout` if set,
    /// retrying on failure up to `step.retry_attempts` additional times
    /// with backoff. Every failed attempt (including the final one) is
    /// appended to `failed_steps` and emits `StepFailed`.
    async fn invoke_with_retry(
        &self,
        action: &dyn crate::action::Action,
        context: &Context,
        step: &Step,
        instance: &mut Instance,
    ) -> Result<ActionResult, ExecutorError> {
        let max_attempts = 1 + u32::from(step.retry_attempts);
        let (strategy, base_delay_ms, max_delay_ms) = self.backoff_params(step);

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let result = match step.timeout.or(self.default_timeout()) {
                Some(timeout) => match tokio::time::timeout(timeout, action.execute(context)).await {
                    Ok(result) => result,
                    Err(_) => ActionResult::failure("timeout"),
                },
                None => action.execute(context).await,
            };

            if result.is_success() || attempt >= max_attempts {
                return Ok(result);
            }

            let error = result.error().unwrap_or("unknown error").to_string();
            self.state.record_step_failure(instance, &step.id, &error).await?;
            self.emit(
                instance,
                EventPayload::StepFailed {
                    step_id: step.id.clone(),
                    error,
                    attempt,
                },
            )
            .await;

            tokio::time::sleep(backoff_delay(strategy, base_delay_ms, max_delay_ms, attempt)).await;
        }
    }

    /// §4.6: record the final failure, run compensations over previously
    /// completed steps in reverse completion order, transition to `Failed`,
    /// and emit `WorkflowFailed`.
    async fn handle_step_failure(
        &self,
        definition: &Definition,
        instance: &mut Instance,
        step: &Step,
        error: String,
    ) -> Result<PassOutcome, ExecutorError> {
        self.state.record_step_failure(instance, &step.id, &error).await?;
        self.emit(
            instance,
            EventPayload::StepFailed {
                step_id: step.id.clone(),
                error: error.clone(),
                attempt: 1 + u32::from(step.retry_attempts),
            },
        )
        .await;

        self.run_compensations(definition, instance).await;

        self.state.fail_workflow(instance, &error).await?;
        self.emit(
            instance,
            EventPayload::WorkflowFailed {
                error: error.clone(),
                failed_step: Some(step.id.clone()),
            },
        )
        .await;

        Ok(PassOutcome::Failed { step_id: step.id.clone(), error })
    }

    /// Runs the `compensation_ref` of every completed step that declares
    /// one, in reverse order of completion. A compensation's own failure is
    /// logged and does not cascade further (§4.6).
    async fn run_compensations(&self, definition: &Definition, instance: &mut Instance) {
        let completed: Vec<String> = instance.completed_steps.clone();
        for step_id in completed.into_iter().rev() {
            let Some(step) = definition.step(&step_id) else { continue };
            let Some(compensation_ref) = step.compensation_ref.clone() else { continue };

            let action = match self.registry.resolve(&compensation_ref) {
                Ok(action) => action,
                Err(err) => {
                    let _ = self
                        .state
                        .record_step_failure(instance, &step_id, &format!("compensation failed: {err}"))
                        .await;
                    continue;
                }
            };

            let mut config = action.default_config();
            for (key, value) in &step.config {
                config.insert(key.clone(), value.clone());
            }
            let context = Context::new(instance.id, step_id.clone(), instance.data.clone(), config);
            let result = action.execute(&context).await;
            if let ActionResult::Failure { error, .. } = result {
                let _ = self
                    .state
                    .record_step_failure(instance, &step_id, &format!("compensation failed: {error}"))
                    .await;
            }
        }
    }

    async fn emit(&self, instance: &Instance, payload: EventPayload) {
        let event = Event::new(instance.id, instance.definition_name.clone(), payload);
        if let Err(err) = self.events.emit(event).await {
            tracing::warn!(instance_id = %instance.id, %err, "event sink delivery failed");
        }
    }

    fn backoff_params(&self, step: &Step) -> (BackoffStrategy, u64, u64) {
        let strategy = step
            .config
            .get("backoff_strategy")
            .and_then(Value::as_str)
            .and_then(parse_backoff_strategy)
            .unwrap_or(self.config.default_backoff_strategy);
        let base_delay_ms = step
            .config
            .get("backoff_delay_ms")
            .and_then(Value::as_u64)
            .unwrap_or(self.config.default_delay_ms);
        let max_delay_ms = step
            .config
            .get("backoff_max_delay_ms")
            .and_then(Value::as_u64)
            .unwrap_or(self.config.default_max_delay_ms);
        (strategy, base_delay_ms, max_delay_ms)
    }

    fn default_timeout(&self) -> Option<Duration> {
        self.config.default_step_timeout_secs.map(Duration::from_secs)
    }
}

enum PassOutcome {
    Advanced,
    Stalled,
    Failed { step_id: String, error: String },
}

fn parse_backoff_strategy(s: &str) -> Option<BackoffStrategy> {
    match s {
        "fixed" => Some(BackoffStrategy::Fixed),
        "linear" => Some(BackoffStrategy::Linear),
        "exponential" => Some(BackoffStrategy::Exponential),
        _ => None,
    }
}

/// Delay before the `attempt`-th retry (1-indexed: `attempt` is the count
/// of the failure that just occurred), capped at `max_delay_ms`.
fn backoff_delay(strategy: BackoffStrategy, base_delay_ms: u64, max_delay_ms: u64, attempt: u32) -> Duration {
    let raw = match strategy {
        BackoffStrategy::Fixed => base_delay_ms,
        BackoffStrategy::Linear => base_delay_ms.saturating_mul(u64::from(attempt)),
        BackoffStrategy::Exponential => {
            let shift = attempt.saturating_sub(1).min(32);
            base_delay_ms.saturating_mul(1u64 << shift)
        }
    };
    Duration::from_millis(raw.min(max_delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::builder::Builder;
    use crate::events::InMemoryEventSink;
    use async_trait::async_trait;
    use conduit_storage::InMemoryStorage;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instance_for(definition: &Definition, data: Value) -> Instance {
        let snapshot = serde_json::to_value(definition).unwrap();
        Instance::new(definition.name.clone(), definition.version.clone(), snapshot, data)
    }

    fn executor(registry: ActionRegistry, events: Arc<dyn EventSink>) -> (Executor, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let executor = Executor::new(storage.clone(), registry, events, EngineConfig::default());
        (executor, storage)
    }

    #[tokio::test]
    async fn happy_sequential_path_completes_all_steps_in_order() {
        let definition = Builder::create("t1")
            .log("a", "hi")
            .unwrap()
            .log("b", "hi")
            .unwrap()
            .log("c", "hi")
            .unwrap()
            .build()
            .unwrap();

        let events = Arc::new(InMemoryEventSink::new());
        let (executor, _storage) = executor(ActionRegistry::with_builtins(), events.clone());
        let instance = instance_for(&definition, json!({"n": 1}));

        let result = executor.execute(instance).await.unwrap();

        assert_eq!(result.state, InstanceState::Completed);
        assert_eq!(result.completed_steps, vec!["a", "b", "c"]);
        assert_eq!(result.progress(3), 100.0);

        let kinds: Vec<&str> = events
            .events()
            .iter()
            .map(|e| match e.payload {
                EventPayload::WorkflowStarted { .. } => "started",
                EventPayload::StepCompleted { .. } => "step_completed",
                EventPayload::WorkflowCompleted => "completed",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["step_completed", "step_completed", "step_completed", "completed"]);
    }

    #[tokio::test]
    async fn conditional_transition_skips_premium_branch() {
        // Built via the declarative parser rather than the builder: fan-out
        // branching transitions aren't expressible through the builder's
        // sequential-chaining API (see builder.rs's module doc).
        let definition = crate::parser::parse_definition(json!({
            "name": "branch",
            "steps": [
                {"id": "validate", "action": "log"},
                {"id": "premium", "action": "log"},
                {"id": "finalize", "action": "log"},
            ],
            "transitions": [
                {"from": "validate", "to": "premium", "condition": "user.plan === \"premium\""},
                {"from": "validate", "to": "finalize", "condition": "user.plan !== \"premium\""},
                {"from": "premium", "to": "finalize"},
            ],
        }))
        .unwrap();

        let (executor, _storage) = executor(ActionRegistry::with_builtins(), Arc::new(InMemoryEventSink::new()));
        let instance = instance_for(&definition, json!({"user": {"plan": "basic"}}));

        let result = executor.execute(instance).await.unwrap();

        assert_eq!(result.state, InstanceState::Completed);
        assert_eq!(result.completed_steps, vec!["validate", "finalize"]);
    }

    #[tokio::test]
    async fn step_level_condition_skip_does_not_stall_the_chain() {
        // Unlike the transition-condition test above, `premium_perks` here
        // carries its own `conditions` (via `when`), set false by the data;
        // `finalize` must still run afterward instead of the instance
        // stalling in `Waiting` forever.
        let definition = Builder::create("t")
            .add_step("validate", "log")
            .unwrap()
            .when("user.plan === \"premium\"", |b| b.add_step("premium_perks", "log"))
            .unwrap()
            .add_step("finalize", "log")
            .unwrap()
            .build()
            .unwrap();

        let (executor, _storage) = executor(ActionRegistry::with_builtins(), Arc::new(InMemoryEventSink::new()));
        let instance = instance_for(&definition, json!({"user": {"plan": "basic"}}));

        let result = executor.execute(instance).await.unwrap();

        assert_eq!(result.state, InstanceState::Completed);
        assert_eq!(result.completed_steps, vec!["validate", "premium_perks", "finalize"]);
    }

    struct ProfileAction;
    #[async_trait]
    impl Action for ProfileAction {
        async fn execute(&self, _context: &Context) -> ActionResult {
            let mut data = Map::new();
            data.insert("profile_id".to_string(), json!(42));
            ActionResult::success(data)
        }
        fn name(&self) -> &str {
            "assign_profile"
        }
    }

    struct EmailIfProfiledAction;
    #[async_trait]
    impl Action for EmailIfProfiledAction {
        async fn execute(&self, context: &Context) -> ActionResult {
            assert_eq!(context.get("profile_id"), Some(&json!(42)));
            let mut data = Map::new();
            data.insert("emailed".to_string(), json!(true));
            ActionResult::success(data)
        }
        fn name(&self) -> &str {
            "email_if_profiled"
        }
    }

    #[tokio::test]
    async fn successful_step_data_is_merged_and_visible_to_the_next_step() {
        let definition = Builder::create("t")
            .add_step("a", "assign_profile")
            .unwrap()
            .add_step("b", "email_if_profiled")
            .unwrap()
            .build()
            .unwrap();

        let mut registry = ActionRegistry::with_builtins();
        registry.register(Arc::new(ProfileAction));
        registry.register(Arc::new(EmailIfProfiledAction));

        let (executor, _storage) = executor(registry, Arc::new(InMemoryEventSink::new()));
        let instance = instance_for(&definition, json!({}));

        let result = executor.execute(instance).await.unwrap();

        assert_eq!(result.data, json!({"profile_id": 42, "emailed": true}));
    }

    #[tokio::test]
    async fn step_completed_event_carries_only_that_steps_result_data() {
        let definition = Builder::create("t")
            .add_step("a", "assign_profile")
            .unwrap()
            .add_step("b", "email_if_profiled")
            .unwrap()
            .build()
            .unwrap();

        let mut registry = ActionRegistry::with_builtins();
        registry.register(Arc::new(ProfileAction));
        registry.register(Arc::new(EmailIfProfiledAction));

        let events = Arc::new(InMemoryEventSink::new());
        let (executor, _storage) = executor(registry, events.clone());
        let instance = instance_for(&definition, json!({}));

        executor.execute(instance).await.unwrap();

        let step_completed_payloads: Vec<Value> = events
            .events()
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::StepCompleted { result_data, .. } => Some(result_data.clone()),
                _ => None,
            })
            .collect();

        // Each event carries only its own step's result, not the
        // accumulated instance data (which by step "b" also holds
        // `profile_id` from step "a").
        assert_eq!(step_completed_payloads, vec![json!({"profile_id": 42}), json!({"emailed": true})]);
    }

    struct FlakyAction {
        failures_remaining: AtomicU32,
    }
    #[async_trait]
    impl Action for FlakyAction {
        async fn execute(&self, _context: &Context) -> ActionResult {
            if self.failures_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 { Some(n - 1) } else { Some(0) }
            }).unwrap() > 0
            {
                ActionResult::failure("not yet")
            } else {
                ActionResult::success(Map::new())
            }
        }
        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds_emitting_a_step_failed_per_attempt() {
        let definition = Builder::create("t")
            .add_step("flaky", "flaky")
            .unwrap()
            .retry_attempts(3)
            .unwrap()
            .config("backoff_strategy", json!("linear"))
            .config("backoff_delay_ms", json!(10))
            .build()
            .unwrap();

        let mut registry = ActionRegistry::with_builtins();
        registry.register(Arc::new(FlakyAction { failures_remaining: AtomicU32::new(2) }));

        let events = Arc::new(InMemoryEventSink::new());
        let (executor, _storage) = executor(registry, events.clone());
        let instance = instance_for(&definition, json!({}));

        let started = tokio::time::Instant::now();
        let result = executor.execute(instance).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(result.state, InstanceState::Completed);
        assert!(elapsed >= Duration::from_millis(20), "elapsed={elapsed:?}");

        let failures: Vec<u32> = events
            .events()
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::StepFailed { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec![1, 2]);
    }

    struct AlwaysFailsAction;
    #[async_trait]
    impl Action for AlwaysFailsAction {
        async fn execute(&self, _context: &Context) -> ActionResult {
            ActionResult::failure("ship failed")
        }
        fn name(&self) -> &str {
            "always_fails"
        }
    }

    struct RecordingCompensation {
        label: &'static str,
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }
    #[async_trait]
    impl Action for RecordingCompensation {
        async fn execute(&self, _context: &Context) -> ActionResult {
            self.log.lock().unwrap().push(self.label);
            ActionResult::success(Map::new())
        }
        fn name(&self) -> &str {
            self.label
        }
    }

    #[tokio::test]
    async fn exhausted_retries_trigger_compensation_in_reverse_completion_order() {
        let definition = Builder::create("t")
            .add_step("reserve", "log")
            .unwrap()
            .compensation("reserve.comp")
            .add_step("charge", "log")
            .unwrap()
            .compensation("charge.comp")
            .add_step("ship", "always_fails")
            .unwrap()
            .retry_attempts(2)
            .unwrap()
            .build()
            .unwrap();

        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = ActionRegistry::with_builtins();
        registry.register(Arc::new(AlwaysFailsAction));
        registry.register_as(
            "reserve.comp",
            Arc::new(RecordingCompensation { label: "reserve.comp", log: log.clone() }),
        );
        registry.register_as(
            "charge.comp",
            Arc::new(RecordingCompensation { label: "charge.comp", log: log.clone() }),
        );

        let (executor, _storage) = executor(registry, Arc::new(InMemoryEventSink::new()));
        let instance = instance_for(&definition, json!({}));

        let err = executor.execute(instance).await.unwrap_err();
        assert!(matches!(err, ExecutorError::StepExecutionFailed { step_id, .. } if step_id == "ship"));

        assert_eq!(*log.lock().unwrap(), vec!["charge.comp", "reserve.comp"]);
    }

    #[tokio::test]
    async fn resume_after_restart_does_not_re_execute_completed_steps() {
        let definition = Builder::create("t")
            .log("a", "hi")
            .unwrap()
            .delay("long_wait", 5)
            .unwrap()
            .log("b", "hi")
            .unwrap()
            .build()
            .unwrap();

        let (executor, storage) = executor(ActionRegistry::with_builtins(), Arc::new(InMemoryEventSink::new()));
        let mut instance = instance_for(&definition, json!({}));
        instance.state = InstanceState::Running;
        instance.current_step_id = Some("long_wait".to_string());
        instance.completed_steps.push("a".to_string());
        storage.save(&instance).await.unwrap();

        let result = executor.execute(instance).await.unwrap();

        assert_eq!(result.state, InstanceState::Completed);
        assert_eq!(result.completed_steps, vec!["a", "long_wait", "b"]);
    }

    #[tokio::test]
    async fn executing_an_already_completed_instance_is_a_no_op() {
        let definition = Builder::create("t").log("a", "hi").unwrap().build().unwrap();
        let (executor, _storage) = executor(ActionRegistry::with_builtins(), Arc::new(InMemoryEventSink::new()));
        let mut instance = instance_for(&definition, json!({}));
        instance.state = InstanceState::Completed;
        instance.completed_steps.push("a".to_string());

        let result = executor.execute(instance.clone()).await.unwrap();
        assert_eq!(result.state, instance.state);
        assert_eq!(result.completed_steps, instance.completed_steps);
    }

    struct GreeterAction;
    #[async_trait]
    impl Action for GreeterAction {
        async fn execute(&self, context: &Context) -> ActionResult {
            let mut data = Map::new();
            data.insert(
                "greeting".to_string(),
                context.config_value("greeting").cloned().unwrap_or(Value::Null),
            );
            ActionResult::success(data)
        }
        fn name(&self) -> &str {
            "greeter"
        }
        fn default_config(&self) -> Map<String, Value> {
            let mut defaults = Map::new();
            defaults.insert("greeting".to_string(), json!("hello"));
            defaults
        }
    }

    #[tokio::test]
    async fn step_config_wins_over_an_actions_declarative_default() {
        let mut registry = ActionRegistry::with_builtins();
        registry.register(Arc::new(GreeterAction));

        let defaulted = Builder::create("t").add_step("a", "greeter").unwrap().build().unwrap();
        let (executor, _storage) = executor(registry.clone(), Arc::new(InMemoryEventSink::new()));
        let result = executor.execute(instance_for(&defaulted, json!({}))).await.unwrap();
        assert_eq!(result.data, json!({"greeting": "hello"}));

        let overridden = Builder::create("t")
            .add_step("a", "greeter")
            .unwrap()
            .config("greeting", json!("bonjour"))
            .build()
            .unwrap();
        let (executor, _storage) = executor(registry, Arc::new(InMemoryEventSink::new()));
        let result = executor.execute(instance_for(&overridden, json!({}))).await.unwrap();
        assert_eq!(result.data, json!({"greeting": "bonjour"}));
    }
}
