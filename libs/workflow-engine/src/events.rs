//! Lifecycle event sink (§6.4, C10): best-effort delivery of the six named
//! events. A delivery failure is logged and never rolls back a state
//! transition (§7) — the executor always swallows `EventSink::emit` errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_domain::InstanceId;
use serde_json::Value;
use std::sync::Mutex;
use thiserror::Error;

/// The payload carried by each event kind.
#[derive(Debug, Clone)]
pub enum EventPayload {
    WorkflowStarted { initial_data: Value },
    WorkflowCompleted,
    WorkflowFailed { error: String, failed_step: Option<String> },
    WorkflowCancelled { reason: Option<String> },
    StepCompleted { step_id: String, result_data: Value },
    StepFailed { step_id: String, error: String, attempt: u32 },
}

/// A single lifecycle event. Always carries the instance id, the
/// definition name, and a timestamp alongside its payload.
#[derive(Debug, Clone)]
pub struct Event {
    pub instance_id: InstanceId,
    pub definition_name: String,
    pub at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    #[must_use]
    pub fn new(instance_id: InstanceId, definition_name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            instance_id,
            definition_name: definition_name.into(),
            at: Utc::now(),
            payload,
        }
    }
}

/// Error an `EventSink` implementation can raise. The executor logs and
/// discards it rather than propagating it (§7).
#[derive(Debug, Error)]
#[error("event sink delivery failed: {0}")]
pub struct EventSinkError(#[from] pub anyhow::Error);

/// Receives lifecycle events emitted by the `Executor`.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event) -> Result<(), EventSinkError>;
}

/// Discards every event. The default sink for callers with no use for
/// lifecycle notifications.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event: Event) -> Result<(), EventSinkError> {
        Ok(())
    }
}

/// Collects every event in memory, in emission order. Used by tests that
/// assert on the exact event sequence a scenario produces.
#[derive(Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of everything emitted so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("event sink mutex poisoned").clone()
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn emit(&self, event: Event) -> Result<(), EventSinkError> {
        self.events.lock().expect("event sink mutex poisoned").push(event);
        Ok(())
    }
}
