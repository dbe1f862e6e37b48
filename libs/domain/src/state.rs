//! Instance state enum with transition guards.
//!
//! Uses an enum-based state (not type-state) so state can be deserialized
//! from storage and driven by data loaded at runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while transitioning an instance's state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateTransitionError {
    /// Attempted transition is not allowed from the current state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: InstanceState, to: InstanceState },
}

/// The lifecycle state of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Waiting,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl InstanceState {
    /// Check whether a transition from `self` to `target` is permitted.
    #[must_use]
    pub fn can_transition_to(self, target: InstanceState) -> bool {
        use InstanceState::{Cancelled, Completed, Failed, Paused, Pending, Running, Waiting};
        matches!(
            (self, target),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Waiting)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Waiting, Running)
                | (Waiting, Failed)
                | (Waiting, Cancelled)
                | (Paused, Running)
                | (Paused, Cancelled)
        )
    }

    /// Transitions exiting a terminal state are never valid.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Attempt the transition, returning the target state or an error.
    pub fn transition(self, target: InstanceState) -> Result<InstanceState, StateTransitionError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(StateTransitionError::InvalidTransition { from: self, to: target })
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
