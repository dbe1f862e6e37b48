//! Common utilities shared across the engine's crates.
//!
//! Provides layered configuration, telemetry initialization, and nothing
//! else — everything here is ambient plumbing, not engine logic.

pub mod config;
pub mod telemetry;

pub use config::EngineConfig;
pub use telemetry::init_tracing;
