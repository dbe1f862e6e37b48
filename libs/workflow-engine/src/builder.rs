//! Fluent constructor for a `Definition` (§4.1, C4).
//!
//! The builder only ever produces steps chained sequentially in declaration
//! order — `when(...)` attaches a step-level condition rather than creating
//! a branching transition, so a caller who wants fan-out transitions
//! reaches for the declarative parser instead (§6.1).

use std::time::Duration;

use serde_json::{Map, Value};

use crate::definition::{Definition, DefinitionError, Step, Transition};

/// Fluent accumulator for a `Definition`. Consumed by `build()`.
pub struct Builder {
    name: String,
    version: String,
    steps: Vec<Step>,
    metadata: Map<String, Value>,
    /// Active `when(...)` conditions, innermost last; ANDed onto every
    /// step added while they're in scope.
    condition_stack: Vec<String>,
}

impl Builder {
    /// Start building a `Definition` named `name` (version defaults to
    /// `"1.0"`; override with `version(...)`).
    #[must_use]
    pub fn create(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0".to_string(),
            steps: Vec::new(),
            metadata: Map::new(),
            condition_stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Add a step. `retry_attempts` and `timeout` default to `0` and
    /// `None`; use the `_with_*` variants below or mutate the returned
    /// builder's last step via `configure_last` for the rest of §3's
    /// per-step fields.
    pub fn add_step(
        mut self,
        id: impl Into<String>,
        action_ref: impl Into<String>,
    ) -> Result<Self, DefinitionError> {
        let id = id.into();
        if self.steps.iter().any(|s| s.id == id) {
            return Err(DefinitionError::DuplicateStepId(id));
        }
        let mut step = Step::new(id);
        step.action_ref = Some(action_ref.into());
        step.conditions = self.condition_stack.clone();
        self.steps.push(step);
        Ok(self)
    }

    /// Apply `f` to the most recently added step. Panics if no step has
    /// been added yet — a programmer error in the caller, not a runtime
    /// condition the spec asks us to recover from.
    #[must_use]
    pub fn configure_last(mut self, f: impl FnOnce(&mut Step)) -> Self {
        let step = self.steps.last_mut().expect("configure_last called before add_step");
        f(step);
        self
    }

    #[must_use]
    pub fn config(self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        self.configure_last(|step| {
            step.config.insert(key, value);
        })
    }

    pub fn timeout(self, timeout: Duration) -> Result<Self, DefinitionError> {
        if timeout.is_zero() {
            return Err(DefinitionError::InvalidTimeout);
        }
        Ok(self.configure_last(|step| step.timeout = Some(timeout)))
    }

    pub fn retry_attempts(self, attempts: u8) -> Result<Self, DefinitionError> {
        if attempts > 10 {
            return Err(DefinitionError::InvalidRetryAttempts(u32::from(attempts)));
        }
        Ok(self.configure_last(|step| step.retry_attempts = attempts))
    }

    #[must_use]
    pub fn compensation(self, action_ref: impl Into<String>) -> Self {
        let action_ref = action_ref.into();
        self.configure_last(|step| step.compensation_ref = Some(action_ref))
    }

    #[must_use]
    pub fn prerequisite(self, step_id: impl Into<String>) -> Self {
        let step_id = step_id.into();
        self.configure_last(|step| step.prerequisites.push(step_id))
    }

    /// Run `body` with `condition` ANDed onto every step it adds.
    /// `when` blocks nest: a step added inside two nested `when` calls
    /// carries both conditions.
    pub fn when(
        mut self,
        condition: impl Into<String>,
        body: impl FnOnce(Self) -> Result<Self, DefinitionError>,
    ) -> Result<Self, DefinitionError> {
        self.condition_stack.push(condition.into());
        let mut result = body(self)?;
        result.condition_stack.pop();
        Ok(result)
    }

    /// Sugar for `add_step(id, "delay")` with `duration_ms` preset.
    pub fn delay(self, id: impl Into<String>, duration_ms: u64) -> Result<Self, DefinitionError> {
        Ok(self
            .add_step(id, "delay")?
            .config("duration_ms", Value::from(duration_ms)))
    }

    /// Sugar for `add_step(id, "log")` with `message` preset.
    pub fn log(self, id: impl Into<String>, message: impl Into<String>) -> Result<Self, DefinitionError> {
        Ok(self.add_step(id, "log")?.config("message", Value::from(message.into())))
    }

    /// Sugar for `add_step(id, "email")` with `to`/`subject`/`body` preset.
    pub fn email(
        self,
        id: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, DefinitionError> {
        Ok(self
            .add_step(id, "email")?
            .config("to", Value::from(to.into()))
            .config("subject", Value::from(subject.into()))
            .config("body", Value::from(body.into())))
    }

    /// Sugar for `add_step(id, "http")` with `url`/`method` preset.
    pub fn http(
        self,
        id: impl Into<String>,
        url: impl Into<String>,
        method: impl Into<String>,
    ) -> Result<Self, DefinitionError> {
        Ok(self
            .add_step(id, "http")?
            .config("url", Value::from(url.into()))
            .config("method", Value::from(method.into())))
    }

    /// Sugar for `add_step(id, "condition")` with `expression` preset.
    pub fn condition(self, id: impl Into<String>, expression: impl Into<String>) -> Result<Self, DefinitionError> {
        Ok(self
            .add_step(id, "condition")?
            .config("expression", Value::from(expression.into())))
    }

    /// Finalize into an immutable `Definition`, chaining each declared step
    /// to the next in declaration order. Fails with `EmptyWorkflow` on zero
    /// steps (via `Definition::new`'s shared validation).
    pub fn build(self) -> Result<Definition, DefinitionError> {
        let transitions = self
            .steps
            .windows(2)
            .map(|pair| Transition {
                from_step_id: pair[0].id.clone(),
                to_step_id: pair[1].id.clone(),
                condition: None,
            })
            .collect();

        Definition::new(self.name, self.version, self.steps, transitions, self.metadata)
    }
}
