//! The immutable data + step-scoped config bundle passed to an action.
//!
//! `Context` values are never mutated in place; `with`/`with_data` return a
//! new value, mirroring the value-type discipline the rest of the
//! definition model follows (see DESIGN.md).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use conduit_domain::InstanceId;

/// Data and step configuration handed to an action for a single step
/// invocation. Constructed fresh per step from the instance's current data
/// plus that step's config; discarded after the step runs.
#[derive(Debug, Clone)]
pub struct Context {
    pub workflow_id: InstanceId,
    pub step_id: String,
    data: Value,
    config: Map<String, Value>,
    pub executed_at: DateTime<Utc>,
}

impl Context {
    #[must_use]
    pub fn new(
        workflow_id: InstanceId,
        step_id: impl Into<String>,
        data: Value,
        config: Map<String, Value>,
    ) -> Self {
        Self {
            workflow_id,
            step_id: step_id.into(),
            data,
            config,
            executed_at: Utc::now(),
        }
    }

    /// Read a dot-path addressed value out of the data map.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.data;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }

    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    #[must_use]
    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Return a new `Context` with `path` set to `value`. `path` supports
    /// the same dot addressing as `get`; intermediate objects are created
    /// as needed. Does not mutate `self`.
    #[must_use]
    pub fn with(&self, path: &str, value: Value) -> Self {
        let mut data = self.data.clone();
        set_path(&mut data, path, value);
        Self {
            data,
            ..self.clone()
        }
    }

    /// Return a new `Context` with `patch` shallow-merged into the data map
    /// at the top level. Does not mutate `self`.
    #[must_use]
    pub fn with_data(&self, patch: &Value) -> Self {
        let mut data = self.data.clone();
        merge_into(&mut data, patch);
        Self {
            data,
            ..self.clone()
        }
    }
}

/// Shallow/recursive merge of `patch` into `target`: object keys are merged
/// recursively, any other value (including arrays) replaces the existing
/// one outright. This is the same rule `ActionResult::merge` applies to
/// instance data.
pub fn merge_into(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                merge_into(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => {
            *target = patch.clone();
        }
    }
}

fn set_path(data: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = data;
    for segment in &segments[..segments.len().saturating_sub(1)] {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = current
            .as_object_mut()
            .expect("just ensured object")
            .entry((*segment).to_string())
            .or_insert(Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(last) = segments.last() {
        current
            .as_object_mut()
            .expect("just ensured object")
            .insert((*last).to_string(), value);
    }
}
