//! Tool definitions and tool calls

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function tool offered to the model
///
/// Serializes to the `{"type": "function", "function": {...}}` shape both
/// Ollama and OpenAI-compatible servers accept.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tool {
    /// The type of tool (currently only "function")
    #[serde(rename = "type")]
    pub kind: String,

    /// The function definition
    pub function: FunctionDef,
}

impl Tool {
    /// Create a function tool with a JSON schema for its parameters
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            kind: "function".into(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// The name of the function
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// The function half of a [`Tool`]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FunctionDef {
    /// The name of the function
    pub name: String,

    /// The description of the function
    #[serde(default)]
    pub description: String,

    /// JSON schema of the parameters
    #[serde(default)]
    pub parameters: Value,
}

/// A tool call made by the model
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ToolCall {
    /// The ID of the tool call
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// The function to call
    pub function: FunctionCall,
}

impl ToolCall {
    /// Create a tool call from a name and arguments
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: String::new(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// A function call within a tool call
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FunctionCall {
    /// The name of the function to call
    #[serde(default)]
    pub name: String,

    /// The arguments, either a JSON object or a JSON-encoded string
    #[serde(default)]
    pub arguments: Value,
}

impl FunctionCall {
    /// Arguments as a JSON object, decoding string-encoded arguments.
    pub fn arguments_object(&self) -> Option<serde_json::Map<String, Value>> {
        match &self.arguments {
            Value::Object(map) => Some(map.clone()),
            Value::String(raw) => match serde_json::from_str(raw) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            },
            _ => None,
        }
    }
}
