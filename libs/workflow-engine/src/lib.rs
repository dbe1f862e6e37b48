//! Durable workflow orchestration: executes declaratively or programmatically
//! defined, multi-step processes with persistent state, conditional
//! branching, retries, timeouts, and compensation.
//!
//! [`engine::Engine`] is the public entry point; everything else here is the
//! machinery it composes.

pub mod action;
pub mod builder;
pub mod condition;
pub mod context;
pub mod definition;
pub mod engine;
pub mod events;
pub mod executor;
pub mod parser;
pub mod registry;
pub mod state_manager;

pub use action::{Action, ActionResult};
pub use builder::Builder;
pub use context::Context;
pub use definition::{Definition, DefinitionError, Step, Transition};
pub use engine::{Engine, EngineError, WorkflowStatus};
pub use events::{Event, EventPayload, EventSink};
pub use executor::{Executor, ExecutorError};
pub use registry::{ActionRegistry, RegistryError};
pub use state_manager::{StateManager, StateManagerError};
