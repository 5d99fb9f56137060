//! Tool input/output types

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parsed arguments handed to a tool executor
///
/// The language model emits arguments as JSON text; the dispatcher parses them
/// into this key/value mapping before the tool ever sees them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArgs {
    pub params: Map<String, Value>,
}

impl ToolArgs {
    /// Create an empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw argument payload produced by the model.
    ///
    /// An empty or whitespace-only payload is treated as `{}`, since some
    /// providers send that for tools without parameters. Anything that is not
    /// a JSON object is rejected.
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new());
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(params)) => Ok(Self { params }),
            Ok(other) => Err(ToolError::InvalidArguments(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(ToolError::InvalidArguments(e.to_string())),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a string parameter
    pub fn param_str(&self, key: &str) -> Result<String, ToolError> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional string parameter. Empty strings count as absent.
    pub fn param_str_opt(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
    }

    /// Get an i64 parameter
    pub fn param_i64(&self, key: &str) -> Result<i64, ToolError> {
        self.params
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional bool parameter
    pub fn param_bool_opt(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(|v| v.as_bool())
    }

    /// Get a parameter as a JSON value
    pub fn param_json(&self, key: &str) -> Result<&Value, ToolError> {
        self.params
            .get(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Deserialize the whole argument set into a typed record.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.params.clone()))
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Value returned by a tool executor
#[derive(Debug, Clone, PartialEq)]
pub enum ToolValue {
    /// Already human/model-readable text, passed through verbatim
    Text(String),

    /// Structured data, encoded to canonical JSON text before it reaches the model
    Json(Value),
}

impl ToolValue {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn json(data: Value) -> Self {
        Self::Json(data)
    }

    /// Render the value as the text the model will see.
    ///
    /// JSON objects serialize with sorted keys, so equal values always
    /// produce identical text.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(Value::String(text)) => text,
            Self::Json(data) => canonicalize(data).to_string(),
        }
    }
}

/// Rebuild every object with its keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

impl From<String> for ToolValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for ToolValue {
    fn from(data: Value) -> Self {
        Self::Json(data)
    }
}

/// Tool-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// True when the caller (the model) sent bad input, as opposed to the
    /// tool itself failing while doing its work.
    pub fn is_argument_error(&self) -> bool {
        !matches!(self, Self::ExecutionFailed(_))
    }
}
