//! Domain models shared by the storage layer and the workflow engine.
//!
//! This crate holds the value types and identifiers both depend on: the
//! prefixed ID newtypes, the instance-level state machine, and the
//! `Instance` record itself.

pub mod ids;
pub mod instance;
pub mod state;

pub use ids::{IdParseError, InstanceId};
pub use instance::{FailedStep, Instance};
pub use state::{InstanceState, StateTransitionError};
