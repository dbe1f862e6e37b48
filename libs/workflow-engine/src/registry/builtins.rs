//! Bundled helper actions. Per spec §1 these are intentionally thin — only
//! their configuration shapes matter, not production-grade delivery
//! guarantees for the external side effect they wrap.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::action::{Action, ActionResult};
use crate::context::Context;

/// Logs `context.config["message"]` (or the whole data map if absent) via
/// `tracing` and always succeeds.
pub struct LogAction;

#[async_trait]
impl Action for LogAction {
    async fn execute(&self, context: &Context) -> ActionResult {
        let message = context
            .config_value("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| context.data().to_string());

        tracing::info!(step_id = %context.step_id, %message, "log action");
        ActionResult::success(Map::new())
    }

    fn name(&self) -> &str {
        "log"
    }

    fn description(&self) -> &str {
        "Writes a message to the structured log"
    }
}

/// Sleeps for `context.config["duration_ms"]` (default 0) and succeeds.
/// The sleep itself is one of the executor's named suspension points (§5).
pub struct DelayAction;

#[async_trait]
impl Action for DelayAction {
    async fn execute(&self, context: &Context) -> ActionResult {
        let millis = context
            .config_value("duration_ms")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        ActionResult::success(Map::new())
    }

    fn name(&self) -> &str {
        "delay"
    }

    fn description(&self) -> &str {
        "Pauses step execution for a configured duration"
    }
}

/// Configuration shape for the `email` builtin: `to`, `subject`, `body`.
/// Delivery itself is out of scope (§1): this stands in for a real mailer
/// integration a caller would register under the same name.
pub struct EmailAction;

#[async_trait]
impl Action for EmailAction {
    async fn execute(&self, context: &Context) -> ActionResult {
        let to = context.config_value("to").and_then(Value::as_str);
        let Some(to) = to else {
            return ActionResult::failure("email action requires config.to");
        };
        let subject = context
            .config_value("subject")
            .and_then(Value::as_str)
            .unwrap_or("");

        tracing::info!(step_id = %context.step_id, %to, %subject, "email action (stub)");
        ActionResult::success(Map::new())
    }

    fn name(&self) -> &str {
        "email"
    }

    fn description(&self) -> &str {
        "Sends an email (configuration shape only; wire up a real mailer to replace it)"
    }
}

/// Configuration shape for the `http` builtin: `url`, `method` (default
/// `GET`), `body`. Performs a best-effort real request via `reqwest`;
/// network failures surface as an `ActionResult::Failure` so the executor's
/// retry/timeout machinery applies to them like any other action failure.
pub struct HttpAction {
    client: reqwest::Client,
}

impl HttpAction {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for HttpAction {
    async fn execute(&self, context: &Context) -> ActionResult {
        let Some(url) = context.config_value("url").and_then(Value::as_str) else {
            return ActionResult::failure("http action requires config.url");
        };
        let method = context
            .config_value("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();

        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            "PATCH" => self.client.patch(url),
            other => return ActionResult::failure(format!("unsupported http method: {other}")),
        };
        if let Some(body) = context.config_value("body") {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                let mut data = Map::new();
                data.insert("status".to_string(), Value::from(response.status().as_u16()));
                ActionResult::success(data)
            }
            Ok(response) => ActionResult::failure(format!("http status {}", response.status())),
            Err(e) => ActionResult::failure(format!("http request failed: {e}")),
        }
    }

    fn name(&self) -> &str {
        "http"
    }

    fn description(&self) -> &str {
        "Issues an HTTP request"
    }
}

/// The action behind the builder's `.condition(...)` sugar: evaluates
/// `context.config["expression"]` against the current data and succeeds or
/// fails accordingly, so a condition can be modeled as an ordinary step
/// rather than only as a transition/step guard.
pub struct ConditionAction;

#[async_trait]
impl Action for ConditionAction {
    async fn execute(&self, context: &Context) -> ActionResult {
        let Some(expression) = context.config_value("expression").and_then(Value::as_str) else {
            return ActionResult::failure("condition action requires config.expression");
        };

        match crate::condition::evaluate_condition(expression, context.data()) {
            Some(true) => ActionResult::success(Map::new()),
            Some(false) => ActionResult::failure(format!("condition not met: {expression}")),
            None => ActionResult::failure(format!("unparseable condition: {expression}")),
        }
    }

    fn name(&self) -> &str {
        "condition"
    }

    fn description(&self) -> &str {
        "Evaluates a predicate against the workflow data"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_domain::InstanceId;
    use serde_json::json;

    fn ctx(data: Value, config: Map<String, Value>) -> Context {
        Context::new(InstanceId::new(), "step1", data, config)
    }

    #[tokio::test]
    async fn log_action_always_succeeds() {
        let result = LogAction.execute(&ctx(json!({}), Map::new())).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn delay_action_with_no_config_completes_immediately() {
        let result = DelayAction.execute(&ctx(json!({}), Map::new())).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn email_action_requires_recipient() {
        let result = EmailAction.execute(&ctx(json!({}), Map::new())).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn condition_action_reflects_predicate_result() {
        let mut config = Map::new();
        config.insert("expression".to_string(), json!("n == 1"));
        let result = ConditionAction.execute(&ctx(json!({"n": 1}), config)).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn condition_action_fails_when_predicate_is_false() {
        let mut config = Map::new();
        config.insert("expression".to_string(), json!("n == 2"));
        let result = ConditionAction.execute(&ctx(json!({"n": 1}), config)).await;
        assert!(!result.is_success());
    }
}
