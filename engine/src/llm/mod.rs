//! LLM Provider Abstraction Layer
//!
//! This module defines the conversation vocabulary shared by the whole engine
//! ([`Turn`], [`Role`], [`ToolCall`]) and the [`LLMProvider`] trait that every
//! language-model transport implements. The engine depends only on the
//! request/response shape captured by [`OracleReply`], never on a vendor
//! protocol directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use sdk::ToolDescriptor;

pub mod ollama;
pub mod openai;
pub mod retry;

pub use sdk::errors::GatewayError;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Role of a turn's author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Operating instructions and injected context
    System,

    /// The human asking
    User,

    /// The language model
    Assistant,

    /// Result of a tool invocation
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Tool invocation requested by the language model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    /// Opaque identifier, unique within one assistant turn
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool (JSON text, unparsed)
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Generate a call id for providers that don't supply one
    pub fn generate_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// One entry in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,

    /// Absent only for assistant turns that are pure tool-call requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Present only on assistant turns that request tool execution
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Present only on tool turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Turn {
    fn with_content(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_content(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_content(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_content(Role::Assistant, content)
    }

    /// Assistant turn that only requests tool execution
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Content as a string slice, empty when absent
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Raw reply from a language-model transport
///
/// Mirrors the `{finish_reason, content?, tool_calls?}` shape every hosted
/// chat-completion service returns. Interpretation (final answer versus tool
/// requests) is the gateway's job, not the transport's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleReply {
    pub finish_reason: Option<String>,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl OracleReply {
    /// Reply carrying only text
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            finish_reason: Some("stop".to_string()),
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Reply carrying only tool-call requests
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            finish_reason: Some("tool_calls".to_string()),
            content: None,
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// LLM Provider trait that all transports must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "openai", "ollama")
    fn name(&self) -> &str;

    /// Generate the next assistant reply
    ///
    /// # Arguments
    /// * `messages` - The full conversation so far, oldest first
    /// * `tools` - Tools the model may request; empty disables tool calling
    async fn generate(&self, messages: &[Turn], tools: &[ToolDescriptor]) -> Result<OracleReply>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}
