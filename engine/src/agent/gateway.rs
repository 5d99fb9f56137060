//! Model Gateway
//!
//! Sends the conversation plus the tool schemas to the language model and
//! interprets the reply. The gateway is the only component that appends
//! assistant turns.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, warn};

use sdk::ToolDescriptor;

use super::Conversation;
use crate::llm::{GatewayError, LLMProvider, OracleReply, ToolCall, Turn};

/// Default upper bound on a single model call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Interpreted reply of one model call
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// The model answered in text
    FinalAnswer(String),

    /// The model asked for tools to run; any accompanying text is ignored
    ToolRequests(Vec<ToolCall>),
}

/// Gateway between the conversation log and a language-model transport
#[derive(Clone)]
pub struct ModelGateway {
    provider: Arc<dyn LLMProvider>,
    request_timeout: Duration,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one model call over the current conversation
    ///
    /// On success the model's own turn has been appended to `conversation`.
    /// On failure nothing is appended.
    pub async fn complete(
        &self,
        conversation: &mut Conversation,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, GatewayError> {
        let reply = self.call(conversation, tools).await?;

        let (turn, response) = if reply.has_tool_calls() {
            debug!("Model requested {} tool calls", reply.tool_calls.len());
            (
                Turn::assistant_tool_calls(reply.tool_calls.clone()),
                ModelResponse::ToolRequests(reply.tool_calls),
            )
        } else {
            let content = reply.content.unwrap_or_default();
            (
                Turn::assistant(content.clone()),
                ModelResponse::FinalAnswer(content),
            )
        };

        append_assistant(conversation, turn)?;
        Ok(response)
    }

    /// Ask a one-off question without offering tools
    ///
    /// Appends `prompt` as a user turn, then calls the model. Tool calls in
    /// the reply are dropped and only its text is recorded, so nothing is
    /// left waiting for a tool result.
    pub async fn complete_once(
        &self,
        conversation: &mut Conversation,
        prompt: impl Into<String>,
    ) -> Result<String, GatewayError> {
        conversation
            .append(Turn::user(prompt))
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

        let reply = self.call(conversation, &[]).await?;
        if reply.has_tool_calls() {
            warn!(
                "Ignoring {} tool calls in a reply that offered no tools",
                reply.tool_calls.len()
            );
        }

        let content = reply.content.unwrap_or_default();
        append_assistant(conversation, Turn::assistant(content.clone()))?;
        Ok(content)
    }

    /// Send the conversation and validate the raw reply
    async fn call(
        &self,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
    ) -> Result<OracleReply, GatewayError> {
        debug!(
            "Calling {} with {} turns and {} tools",
            self.provider.name(),
            conversation.len(),
            tools.len()
        );

        let reply = match timeout(
            self.request_timeout,
            self.provider.generate(conversation.snapshot(), tools),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                error!("Model call failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                error!(
                    "Model call timed out after {}s",
                    self.request_timeout.as_secs()
                );
                return Err(GatewayError::Timeout);
            }
        };

        // Call ids key the tool results; a repeated id could never be answered twice
        let duplicate = {
            let mut seen = HashSet::new();
            reply
                .tool_calls
                .iter()
                .find(|call| !seen.insert(call.id.as_str()))
                .map(|call| call.id.clone())
        };
        if let Some(id) = duplicate {
            error!("Model reused tool call id '{}'", id);
            return Err(GatewayError::ParseError(format!(
                "Duplicate tool call id '{}'",
                id
            )));
        }

        Ok(reply)
    }
}

// Assistant turns never reference call ids, so this cannot be an orphan
fn append_assistant(conversation: &mut Conversation, turn: Turn) -> Result<(), GatewayError> {
    conversation
        .append(turn)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use async_trait::async_trait;

    struct Fixed(OracleReply);

    #[async_trait]
    impl LLMProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(
            &self,
            _messages: &[Turn],
            _tools: &[ToolDescriptor],
        ) -> crate::llm::Result<OracleReply> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    #[async_trait]
    impl LLMProvider for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(
            &self,
            _messages: &[Turn],
            _tools: &[ToolDescriptor],
        ) -> crate::llm::Result<OracleReply> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(OracleReply::text("late"))
        }
    }

    #[tokio::test]
    async fn test_final_answer_appends_assistant_turn() {
        let gateway = ModelGateway::new(Arc::new(Fixed(OracleReply::text("Hello!"))));
        let mut conv = Conversation::new("sys");

        let response = gateway.complete(&mut conv, &[]).await.unwrap();

        assert_eq!(response, ModelResponse::FinalAnswer("Hello!".to_string()));
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.last().unwrap().role, Role::Assistant);
        assert_eq!(conv.last().unwrap().text(), "Hello!");
    }

    #[tokio::test]
    async fn test_tool_calls_win_over_content() {
        let reply = OracleReply {
            finish_reason: Some("tool_calls".to_string()),
            content: Some("let me check".to_string()),
            tool_calls: vec![ToolCall::new("c1", "calendar_tool", "{}")],
        };
        let gateway = ModelGateway::new(Arc::new(Fixed(reply)));
        let mut conv = Conversation::new("sys");

        let response = gateway.complete(&mut conv, &[]).await.unwrap();

        assert!(matches!(response, ModelResponse::ToolRequests(ref calls) if calls.len() == 1));
        let turn = conv.last().unwrap();
        assert!(turn.content.is_none());
        assert_eq!(turn.tool_calls[0].id, "c1");
        assert!(conv.is_outstanding("c1"));
    }

    #[tokio::test]
    async fn test_missing_content_is_empty_answer() {
        let gateway = ModelGateway::new(Arc::new(Fixed(OracleReply::default())));
        let mut conv = Conversation::new("sys");

        let response = gateway.complete(&mut conv, &[]).await.unwrap();
        assert_eq!(response, ModelResponse::FinalAnswer(String::new()));
    }

    #[tokio::test]
    async fn test_timeout_appends_nothing() {
        let gateway = ModelGateway::new(Arc::new(Slow)).with_timeout(Duration::from_millis(20));
        let mut conv = Conversation::new("sys");

        let err = gateway.complete(&mut conv, &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout));
        assert_eq!(conv.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_once_appends_prompt() {
        let gateway = ModelGateway::new(Arc::new(Fixed(OracleReply::text("1. Step"))));
        let mut conv = Conversation::new("sys");

        let text = gateway.complete_once(&mut conv, "Plan this").await.unwrap();

        assert_eq!(text, "1. Step");
        assert_eq!(conv.snapshot()[1].role, Role::User);
        assert_eq!(conv.snapshot()[1].text(), "Plan this");
        assert_eq!(conv.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_call_ids_are_rejected() {
        let reply = OracleReply {
            finish_reason: Some("tool_calls".to_string()),
            content: None,
            tool_calls: vec![
                ToolCall::new("dup", "calendar_tool", "{}"),
                ToolCall::new("dup", "reminders", "{}"),
            ],
        };
        let gateway = ModelGateway::new(Arc::new(Fixed(reply)));
        let mut conv = Conversation::new("sys");

        let err = gateway.complete(&mut conv, &[]).await.unwrap_err();

        assert!(matches!(err, GatewayError::ParseError(ref msg) if msg.contains("'dup'")));
        assert_eq!(conv.len(), 1);
        assert!(!conv.is_outstanding("dup"));
    }

    #[tokio::test]
    async fn test_complete_once_drops_tool_calls() {
        let reply = OracleReply {
            finish_reason: Some("tool_calls".to_string()),
            content: Some("1. Check the calendar".to_string()),
            tool_calls: vec![ToolCall::new("c7", "calendar_tool", "{}")],
        };
        let gateway = ModelGateway::new(Arc::new(Fixed(reply)));
        let mut conv = Conversation::new("sys");

        let text = gateway.complete_once(&mut conv, "Plan this").await.unwrap();

        assert_eq!(text, "1. Check the calendar");
        let turn = conv.last().unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.tool_calls.is_empty());
        assert!(!conv.is_outstanding("c7"));
    }
}
