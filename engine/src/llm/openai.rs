use super::{GatewayError, LLMProvider, OracleReply, Role, ToolCall, Turn};
use crate::config::OpenAIConfig;
use async_trait::async_trait;
use sdk::ToolDescriptor;
use serde_json::{json, Value};

/// OpenAI-compatible chat-completions transport with native function calling
pub struct OpenAIProvider {
    config: OpenAIConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig, api_key: Option<String>) -> Self {
        Self {
            config,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Build a provider reading the key from the configured environment variable
    pub fn from_env(config: OpenAIConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(config, api_key)
    }
}

/// Encode a turn in the chat-completions wire format
pub(crate) fn turn_to_wire(turn: &Turn) -> Value {
    let mut msg = json!({ "role": turn.role.to_string() });

    match turn.role {
        Role::Assistant if !turn.tool_calls.is_empty() => {
            msg["content"] = turn.content.as_deref().map_or(Value::Null, Value::from);
            msg["tool_calls"] = turn
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments,
                        }
                    })
                })
                .collect();
        }
        Role::Tool => {
            msg["content"] = json!(turn.text());
            msg["tool_call_id"] = json!(turn.tool_call_id);
        }
        _ => msg["content"] = json!(turn.text()),
    }

    msg
}

fn parse_tool_call(raw: &Value) -> Result<ToolCall, GatewayError> {
    let function = raw
        .get("function")
        .ok_or_else(|| GatewayError::ParseError("Tool call without function".to_string()))?;

    let name = function
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| GatewayError::ParseError("Tool call without name".to_string()))?;

    // Arguments are normally a JSON string; some compatible servers send an object
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let id = raw
        .get("id")
        .and_then(|i| i.as_str())
        .map(String::from)
        .unwrap_or_else(ToolCall::generate_id);

    Ok(ToolCall::new(id, name, arguments))
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn check_health(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        messages: &[Turn],
        tools: &[ToolDescriptor],
    ) -> super::Result<OracleReply> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GatewayError::AuthenticationFailed(format!(
                "environment variable {} is not set",
                self.config.api_key_env
            ))
        })?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let api_messages: Vec<Value> = messages.iter().map(turn_to_wire).collect();

        let mut payload = json!({
            "model": self.config.model,
            "messages": api_messages,
        });
        if !tools.is_empty() {
            payload["tools"] = tools.iter().map(|t| t.to_function_schema()).collect();
            payload["tool_choice"] = json!("auto");
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => GatewayError::AuthenticationFailed(text),
                429 => GatewayError::RateLimitExceeded,
                500..=599 => GatewayError::ProviderUnavailable(format!("HTTP {}: {}", status, text)),
                _ => GatewayError::InvalidRequest(text),
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::ParseError(e.to_string()))?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| GatewayError::ParseError("No choices in response".to_string()))?;

        let message = choice
            .get("message")
            .ok_or_else(|| GatewayError::ParseError("No message in choice".to_string()))?;

        let tool_calls = match message.get("tool_calls").and_then(|t| t.as_array()) {
            Some(calls) => calls
                .iter()
                .map(parse_tool_call)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(OracleReply {
            finish_reason: choice
                .get("finish_reason")
                .and_then(|f| f.as_str())
                .map(String::from),
            content: message
                .get("content")
                .and_then(|c| c.as_str())
                .map(String::from),
            tool_calls,
        })
    }
}
