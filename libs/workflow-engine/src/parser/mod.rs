//! Declarative parser: turns the §6.1 map shape into a validated
//! `Definition`, normalizing list-form and map-form step records to the
//! same semantics the fluent `Builder` produces.

mod document;
mod duration;

pub use duration::parse_timeout;

use thiserror::Error;

use crate::definition::{Definition, DefinitionError, Step, Transition};
use document::{RawDocument, RawStep, RawTransition, StepsInput};

/// Errors raised while parsing a declarative workflow document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid document structure: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("list-form step is missing its 'id' field")]
    MissingStepId,

    #[error("invalid timeout value: {0}")]
    InvalidTimeout(String),

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// Parse a declarative definition already represented as a `serde_json::Value`.
pub fn parse_definition(value: serde_json::Value) -> Result<Definition, ParseError> {
    let doc: RawDocument = serde_json::from_value(value)?;
    build_definition(doc)
}

/// Parse a declarative definition from a JSON string.
pub fn parse_json(json: &str) -> Result<Definition, ParseError> {
    let doc: RawDocument = serde_json::from_str(json)?;
    build_definition(doc)
}

/// Parse a declarative definition from a YAML string.
pub fn parse_yaml(yaml: &str) -> Result<Definition, ParseError> {
    let doc: RawDocument = serde_yml::from_str(yaml)?;
    build_definition(doc)
}

fn build_definition(doc: RawDocument) -> Result<Definition, ParseError> {
    let ordered_ids_and_steps = normalize_steps(doc.steps)?;

    let mut steps = Vec::with_capacity(ordered_ids_and_steps.len());
    for (id, raw) in &ordered_ids_and_steps {
        steps.push(build_step(id.clone(), raw)?);
    }

    let transitions = if doc.transitions.is_empty() {
        implicit_sequential_transitions(&ordered_ids_and_steps)
    } else {
        doc.transitions.into_iter().map(build_transition).collect()
    };

    Definition::new(doc.name, doc.version, steps, transitions, doc.metadata).map_err(ParseError::from)
}

/// Normalize either step representation into `(id, raw_step)` pairs in the
/// order they'll become sequential transitions (list form: declaration
/// order; map form: key order).
fn normalize_steps(input: StepsInput) -> Result<Vec<(String, RawStep)>, ParseError> {
    match input {
        StepsInput::List(list) => list
            .into_iter()
            .map(|raw| {
                let id = raw.id.clone().ok_or(ParseError::MissingStepId)?;
                Ok((id, raw))
            })
            .collect(),
        StepsInput::Map(map) => Ok(map.into_iter().collect()),
    }
}

fn build_step(id: String, raw: &RawStep) -> Result<Step, ParseError> {
    let mut config = raw.parameters.clone().unwrap_or_default();
    if let Some(explicit_config) = &raw.config {
        for (k, v) in explicit_config {
            config.insert(k.clone(), v.clone());
        }
    }

    let timeout = raw.timeout.as_ref().map(parse_timeout).transpose()?;

    Ok(Step {
        id,
        action_ref: raw.action.clone(),
        config,
        timeout,
        retry_attempts: raw.retry_attempts.unwrap_or(0),
        compensation_ref: raw.compensation.clone(),
        conditions: raw.conditions.clone(),
        prerequisites: raw.prerequisites.clone(),
    })
}

fn build_transition(raw: RawTransition) -> Transition {
    Transition {
        from_step_id: raw.from,
        to_step_id: raw.to,
        condition: raw.condition,
    }
}

fn implicit_sequential_transitions(ordered: &[(String, RawStep)]) -> Vec<Transition> {
    ordered
        .windows(2)
        .map(|pair| Transition {
            from_step_id: pair[0].0.clone(),
            to_step_id: pair[1].0.clone(),
            condition: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_list_form_with_implicit_sequential_transitions() {
        let def = parse_definition(json!({
            "name": "onboarding",
            "steps": [
                {"id": "a", "action": "log"},
                {"id": "b", "action": "log"},
                {"id": "c", "action": "log"},
            ],
        }))
        .unwrap();

        assert_eq!(def.version, "1.0");
        assert_eq!(def.transitions().len(), 2);
        assert_eq!(def.first_step().unwrap().id, "a");
    }

    #[test]
    fn parses_map_form_steps() {
        let def = parse_definition(json!({
            "name": "onboarding",
            "steps": {
                "a": {"action": "log"},
                "b": {"action": "log"},
            },
        }))
        .unwrap();

        assert_eq!(def.steps().len(), 2);
        assert!(def.step("a").is_some());
        assert!(def.step("b").is_some());
    }

    #[test]
    fn explicit_transitions_override_implicit_chaining() {
        let def = parse_definition(json!({
            "name": "branch",
            "steps": [
                {"id": "validate", "action": "log"},
                {"id": "premium", "action": "log"},
                {"id": "finalize", "action": "log"},
            ],
            "transitions": [
                {"from": "validate", "to": "premium", "condition": "user.plan === \"premium\""},
                {"from": "validate", "to": "finalize", "condition": "user.plan !== \"premium\""},
                {"from": "premium", "to": "finalize"},
            ],
        }))
        .unwrap();

        assert_eq!(def.transitions().len(), 3);
    }

    #[test]
    fn parameters_is_an_alias_for_config() {
        let def = parse_definition(json!({
            "name": "t",
            "steps": [
                {"id": "a", "action": "email", "parameters": {"to": "user@example.com"}},
            ],
        }))
        .unwrap();

        assert_eq!(def.step("a").unwrap().config.get("to").unwrap(), "user@example.com");
    }

    #[test]
    fn config_wins_over_parameters_on_key_conflict() {
        let def = parse_definition(json!({
            "name": "t",
            "steps": [
                {"id": "a", "action": "email", "parameters": {"to": "a@example.com"}, "config": {"to": "b@example.com"}},
            ],
        }))
        .unwrap();

        assert_eq!(def.step("a").unwrap().config.get("to").unwrap(), "b@example.com");
    }

    #[test]
    fn timeout_accepts_duration_strings_and_seconds() {
        let def = parse_definition(json!({
            "name": "t",
            "steps": [
                {"id": "a", "action": "log", "timeout": "30s"},
                {"id": "b", "action": "log", "timeout": 60},
            ],
        }))
        .unwrap();

        assert_eq!(def.step("a").unwrap().timeout, Some(std::time::Duration::from_secs(30)));
        assert_eq!(def.step("b").unwrap().timeout, Some(std::time::Duration::from_secs(60)));
    }

    #[test]
    fn bare_unitless_timeout_string_is_rejected() {
        let err = parse_definition(json!({
            "name": "t",
            "steps": [{"id": "a", "action": "log", "timeout": "30"}],
        }))
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimeout(_)));
    }

    #[test]
    fn list_form_step_missing_id_is_rejected() {
        let err = parse_definition(json!({
            "name": "t",
            "steps": [{"action": "log"}],
        }))
        .unwrap_err();
        assert!(matches!(err, ParseError::MissingStepId));
    }

    #[test]
    fn transition_to_unknown_step_is_rejected() {
        let err = parse_definition(json!({
            "name": "t",
            "steps": [{"id": "a", "action": "log"}],
            "transitions": [{"from": "a", "to": "ghost"}],
        }))
        .unwrap_err();
        assert!(matches!(err, ParseError::Definition(DefinitionError::InvalidTransition { .. })));
    }

    #[test]
    fn parses_from_yaml_string() {
        let yaml = r#"
name: onboarding
steps:
  - id: a
    action: log
  - id: b
    action: log
"#;
        let def = parse_yaml(yaml).unwrap();
        assert_eq!(def.name, "onboarding");
        assert_eq!(def.steps().len(), 2);
    }
}
