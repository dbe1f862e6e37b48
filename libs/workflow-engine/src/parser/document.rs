//! Declarative workflow document shape (§6.1), deserialized straight off
//! `serde_json::Value`/YAML before being normalized into `Definition`
//! construction arguments.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RawDocument {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub steps: StepsInput,
    #[serde(default)]
    pub transitions: Vec<RawTransition>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Steps may be given as an ordered list (each record carrying its own
/// `id`) or as an id-keyed map. The parser normalizes both into the same
/// shape; see `normalize` in `parser/mod.rs`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StepsInput {
    List(Vec<RawStep>),
    /// `BTreeMap` rather than `HashMap` so iteration order — and therefore
    /// the sequential transitions implied for this form — is at least
    /// deterministic (alphabetical by id) across runs, even though it's
    /// not the declaration order a JSON/YAML map doesn't preserve anyway.
    Map(BTreeMap<String, RawStep>),
}

#[derive(Debug, Deserialize, Default)]
pub struct RawStep {
    pub id: Option<String>,
    pub action: Option<String>,
    pub parameters: Option<Map<String, Value>>,
    pub config: Option<Map<String, Value>>,
    pub timeout: Option<Value>,
    pub retry_attempts: Option<u8>,
    pub compensation: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTransition {
    pub from: String,
    pub to: String,
    pub condition: Option<String>,
}
