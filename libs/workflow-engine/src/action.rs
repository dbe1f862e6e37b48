//! The action contract (§4.2): the one capability user code implements,
//! and the value the executor threads back into instance data.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::Context;

/// What an action invocation produced.
///
/// `Success` data is merged into the instance's data by the executor;
/// `Failure` never contributes data, regardless of what it carries in
/// `metadata`.
#[derive(Debug, Clone)]
pub enum ActionResult {
    Success {
        data: Map<String, Value>,
        metadata: Map<String, Value>,
    },
    Failure {
        error: String,
        metadata: Map<String, Value>,
    },
}

impl ActionResult {
    #[must_use]
    pub fn success(data: Map<String, Value>) -> Self {
        Self::Success {
            data,
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(self, metadata: Map<String, Value>) -> Self {
        match self {
            Self::Success { data, .. } => Self::Success { data, metadata },
            Self::Failure { error, .. } => Self::Failure { error, metadata },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The error string, present only on `Failure`.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error, .. } => Some(error),
            Self::Success { .. } => None,
        }
    }
}

/// A unit of work a `Step` can reference. Implementations are registered
/// with an `ActionRegistry` under a name or qualified reference.
///
/// `can_execute` is a pre-flight check the executor runs before `execute`;
/// returning `false` defers the step rather than failing it, so an action
/// can gate on an external signal the engine doesn't otherwise model (a
/// human approval, an inbound webhook, ...).
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(&self, context: &Context) -> ActionResult;

    async fn can_execute(&self, _context: &Context) -> bool {
        true
    }

    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Declarative config defaults this action carries for any step that
    /// references it. There is no runtime reflection in Rust to pull these
    /// off an annotation, so an action states them here instead; the
    /// executor only fills in a key from this map when the step's own
    /// `config` leaves it unset, so step-level config always wins (§4.2).
    fn default_config(&self) -> Map<String, Value> {
        Map::new()
    }
}
