//! Resolves a `Step`'s `action_ref`/`compensation_ref` to a callable
//! `Action` implementation (§4.2, C1).

pub mod builtins;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::action::Action;

/// Errors raised while resolving or registering an action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("action not found: {0}")]
    ActionNotFound(String),

    /// Kept for API completeness with §4.2's error taxonomy. Trait objects
    /// registered through `register` are checked against the `Action`
    /// contract by the compiler, so this can't occur through the typed
    /// entry point — only a hypothetical dynamic-loading backend would need
    /// to raise it at runtime.
    #[error("registered target for '{0}' does not implement the action contract")]
    InvalidActionClass(String),
}

/// Maps a reference string to a constructed `Action`.
///
/// Resolution order per §4.2: a caller-registered fully-qualified
/// identifier and a bundled short name both live in the same map (the
/// bundled names are seeded by `with_builtins`); whichever was registered
/// last under a given key wins, so application registration can shadow a
/// built-in deliberately. Everything not found in the map raises
/// `ActionNotFound` before any side effect occurs.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the bundled helper actions: `log`, `delay`,
    /// `email`, `http`, `condition`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtins::LogAction));
        registry.register(Arc::new(builtins::DelayAction));
        registry.register(Arc::new(builtins::EmailAction));
        registry.register(Arc::new(builtins::HttpAction::new()));
        registry.register(Arc::new(builtins::ConditionAction));
        registry
    }

    /// Register (or replace) an action under its own `name()`.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_string(), action);
    }

    /// Register an action under an explicit reference, independent of its
    /// own `name()` — useful for aliasing a single implementation under
    /// several fully-qualified identifiers.
    pub fn register_as(&mut self, reference: impl Into<String>, action: Arc<dyn Action>) {
        self.actions.insert(reference.into(), action);
    }

    /// Resolve `reference` to its `Action`, or `ActionNotFound`.
    pub fn resolve(&self, reference: &str) -> Result<Arc<dyn Action>, RegistryError> {
        self.actions
            .get(reference)
            .cloned()
            .ok_or_else(|| RegistryError::ActionNotFound(reference.to_string()))
    }

    #[must_use]
    pub fn contains(&self, reference: &str) -> bool {
        self.actions.contains_key(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionResult;
    use crate::context::Context;
    use async_trait::async_trait;
    use conduit_domain::InstanceId;
    use serde_json::Map;

    struct Noop;

    #[async_trait]
    impl Action for Noop {
        async fn execute(&self, _context: &Context) -> ActionResult {
            ActionResult::success(Map::new())
        }

        fn name(&self) -> &str {
            "noop"
        }
    }

    #[test]
    fn resolves_builtins_by_short_name() {
        let registry = ActionRegistry::with_builtins();
        for name in ["log", "delay", "email", "http", "condition"] {
            assert!(registry.resolve(name).is_ok(), "missing builtin {name}");
        }
    }

    #[test]
    fn unregistered_reference_is_action_not_found() {
        let registry = ActionRegistry::with_builtins();
        let err = registry.resolve("nothing.here").unwrap_err();
        assert!(matches!(err, RegistryError::ActionNotFound(_)));
    }

    #[test]
    fn user_registration_can_shadow_a_builtin() {
        let mut registry = ActionRegistry::with_builtins();
        registry.register_as("log", Arc::new(Noop));
        assert_eq!(registry.resolve("log").unwrap().name(), "noop");
    }

    #[test]
    fn register_as_aliases_under_a_qualified_name() {
        let mut registry = ActionRegistry::new();
        registry.register_as("com.example.Noop", Arc::new(Noop));
        assert!(registry.resolve("com.example.Noop").is_ok());
    }
}
