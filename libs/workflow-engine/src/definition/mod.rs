//! The immutable workflow graph: steps, transitions, and the queries the
//! executor drives off of them.

use std::collections::HashSet;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::evaluate_condition;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid regex"));

/// Errors raised while assembling or validating a `Definition`, whether from
/// the fluent builder or a declarative parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("invalid workflow name '{0}': must match ^[A-Za-z][A-Za-z0-9_-]*$")]
    InvalidName(String),
    #[error("duplicate step id: {0}")]
    DuplicateStepId(String),
    #[error("transition references unknown step id: {0}")]
    InvalidStepId(String),
    #[error("retry_attempts must be between 0 and 10, got {0}")]
    InvalidRetryAttempts(u32),
    #[error("timeout must be a positive duration")]
    InvalidTimeout,
    #[error("workflow must contain at least one step")]
    EmptyWorkflow,
    #[error("transition from '{from}' to '{to}' references an unknown step")]
    InvalidTransition { from: String, to: String },
}

/// A single node in a `Definition`'s graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub action_ref: Option<String>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default, with = "duration_secs_opt")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub retry_attempts: u8,
    pub compensation_ref: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl Step {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action_ref: None,
            config: serde_json::Map::new(),
            timeout: None,
            retry_attempts: 0,
            compensation_ref: None,
            conditions: Vec::new(),
            prerequisites: Vec::new(),
        }
    }

    /// Whether every one of this step's conditions holds against `data`.
    /// Per §4.1, an unparseable condition at the step level is conservative
    /// in the opposite direction from a transition condition: it evaluates
    /// to `true` so a malformed predicate never spuriously blocks a step.
    #[must_use]
    pub fn conditions_hold(&self, data: &serde_json::Value) -> bool {
        self.conditions
            .iter()
            .all(|c| evaluate_condition(c, data).unwrap_or(true))
    }
}

/// A directed edge between two steps, optionally guarded by a predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from_step_id: String,
    pub to_step_id: String,
    pub condition: Option<String>,
}

/// The immutable blueprint a `Definition` is built from: steps in
/// insertion order plus the transitions between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub version: String,
    steps: Vec<Step>,
    transitions: Vec<Transition>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Definition {
    /// Assemble and validate a `Definition`. Both the builder and the
    /// parser route through here so the invariants in §3 hold regardless of
    /// entry point.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        steps: Vec<Step>,
        transitions: Vec<Transition>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        if !NAME_PATTERN.is_match(&name) {
            return Err(DefinitionError::InvalidName(name));
        }
        if steps.is_empty() {
            return Err(DefinitionError::EmptyWorkflow);
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id.as_str()) {
                return Err(DefinitionError::DuplicateStepId(step.id.clone()));
            }
            if step.retry_attempts > 10 {
                return Err(DefinitionError::InvalidRetryAttempts(
                    u32::from(step.retry_attempts),
                ));
            }
            if step.timeout.is_some_and(|t| t.is_zero()) {
                return Err(DefinitionError::InvalidTimeout);
            }
        }

        let step_ids: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();
        for t in &transitions {
            if !step_ids.contains(t.from_step_id.as_str()) || !step_ids.contains(t.to_step_id.as_str())
            {
                return Err(DefinitionError::InvalidTransition {
                    from: t.from_step_id.clone(),
                    to: t.to_step_id.clone(),
                });
            }
        }

        Ok(Self {
            name,
            version: version.into(),
            steps,
            transitions,
            metadata,
        })
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[must_use]
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// The step with no incoming transition, or the first declared step if
    /// there is no unambiguous entry point.
    #[must_use]
    pub fn first_step(&self) -> Option<&Step> {
        let has_incoming: HashSet<&str> = self
            .transitions
            .iter()
            .map(|t| t.to_step_id.as_str())
            .collect();

        self.steps
            .iter()
            .find(|s| !has_incoming.contains(s.id.as_str()))
            .or_else(|| self.steps.first())
    }

    /// All candidate next steps from `current`, per §4.1's fan-out rule:
    /// every outgoing transition whose condition holds (or carries none) is
    /// returned, in declaration order.
    #[must_use]
    pub fn next_steps(&self, current: Option<&str>, data: &serde_json::Value) -> Vec<&Step> {
        let Some(current) = current else {
            return self.first_step().into_iter().collect();
        };

        self.transitions
            .iter()
            .filter(|t| t.from_step_id == current)
            .filter(|t| match &t.condition {
                Some(cond) => evaluate_condition(cond, data).unwrap_or(false),
                None => true,
            })
            .filter_map(|t| self.step(&t.to_step_id))
            .collect()
    }

    /// True iff `step_id` has no outgoing transitions.
    #[must_use]
    pub fn is_terminal(&self, step_id: &str) -> bool {
        !self.transitions.iter().any(|t| t.from_step_id == step_id)
    }
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|d| d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
