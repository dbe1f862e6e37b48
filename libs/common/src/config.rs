//! Engine configuration, layered from defaults, an optional file, and
//! environment variables (`CONDUIT_*`), following the same `config` +
//! `dotenvy` combination used elsewhere in this workspace.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading `EngineConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Default backoff strategy applied to a step's retries when the step
/// declares no `backoff` override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Default backoff strategy for retries that don't specify one.
    #[serde(default)]
    pub default_backoff_strategy: BackoffStrategy,

    /// Default base delay between retries, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,

    /// Default cap on retry backoff, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub default_max_delay_ms: u64,

    /// Default step timeout when a step declares none, in seconds.
    /// `None` means unbounded.
    #[serde(default)]
    pub default_step_timeout_secs: Option<u64>,

    /// Bound on the number of instances the engine will drive concurrently.
    #[serde(default = "default_max_concurrent_instances")]
    pub max_concurrent_instances: usize,

    /// Connection string for the optional storage backend. Unused by the
    /// in-memory reference storage.
    #[serde(default)]
    pub storage_dsn: Option<String>,
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_concurrent_instances() -> usize {
    32
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_backoff_strategy: BackoffStrategy::default(),
            default_delay_ms: default_delay_ms(),
            default_max_delay_ms: default_max_delay_ms(),
            default_step_timeout_secs: None,
            max_concurrent_instances: default_max_concurrent_instances(),
            storage_dsn: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from (in ascending precedence): built-in defaults,
    /// an optional `config/engine.{toml,yaml,json}` file, a `.env` file, and
    /// `CONDUIT_`-prefixed environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let cfg = config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .add_source(config::File::with_name("config/engine").required(false))
            .add_source(config::Environment::with_prefix("CONDUIT").separator("__"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}
