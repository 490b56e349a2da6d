//! Success criterion for tool-calling probes.

use crate::Classifier;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// The widest brace-delimited span in a string.
///
/// Greedy on purpose: with two separate objects in one text the span covers
/// both, fails to parse and the payload is classified as a failure.
static EMBEDDED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("embedded json pattern is valid"));

/// Accepts a payload in which the model called `tool` with `argument`
/// set to `expected`.
///
/// The call is looked for first in `message.tool_calls`, then as a JSON
/// fragment embedded in `message.content` for models that write the call
/// out as text. A fragment may be `{"name", "arguments"}`,
/// `{"name", "parameters"}` or nested under `"function"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallCriterion {
    /// Expected function name
    pub tool: String,
    /// Argument to check
    pub argument: String,
    /// Exact value the argument must have
    pub expected: String,
}

impl ToolCallCriterion {
    /// Create a criterion.
    pub fn new(
        tool: impl Into<String>,
        argument: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            argument: argument.into(),
            expected: expected.into(),
        }
    }

    /// Whether `payload` satisfies the criterion.
    pub fn matches(&self, payload: &Value) -> bool {
        let parsed;
        let payload = match payload {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value) => {
                    parsed = value;
                    &parsed
                }
                Err(_) => return false,
            },
            other => other,
        };

        let message = &payload["message"];
        let structured = message["tool_calls"]
            .as_array()
            .is_some_and(|calls| calls.iter().any(|call| self.call_matches(call)));
        if structured {
            return true;
        }

        message["content"]
            .as_str()
            .is_some_and(|content| self.content_matches(content))
    }

    fn content_matches(&self, content: &str) -> bool {
        let Some(span) = EMBEDDED_JSON.find(content) else {
            return false;
        };
        match serde_json::from_str::<Value>(span.as_str()) {
            Ok(fragment) => self.call_matches(&fragment),
            Err(e) => {
                tracing::trace!("embedded fragment does not parse: {e}");
                false
            }
        }
    }

    fn call_matches(&self, call: &Value) -> bool {
        let call = match call.get("function") {
            Some(function) if function.is_object() => function,
            _ => call,
        };
        if call["name"].as_str() != Some(self.tool.as_str()) {
            return false;
        }

        let arguments = call
            .get("arguments")
            .or_else(|| call.get("parameters"))
            .cloned()
            .unwrap_or(Value::Null);
        let arguments = match arguments {
            Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::Null),
            other => other,
        };
        arguments[self.argument.as_str()].as_str() == Some(self.expected.as_str())
    }
}

impl Classifier for ToolCallCriterion {
    fn classify(&self, payload: &Value) -> bool {
        self.matches(payload)
    }
}
