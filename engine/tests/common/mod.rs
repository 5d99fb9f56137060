//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use exa_engine::llm::{GatewayError, LLMProvider, OracleReply, ToolCall, Turn};
use sdk::{ParamSpec, ParamType, Tool, ToolArgs, ToolDescriptor, ToolError, ToolValue};

/// One recorded request to the scripted provider
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Turn>,
    pub tool_names: Vec<String>,
}

/// Provider that replays canned replies. The last reply repeats forever.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<OracleReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<OracleReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[Turn],
        tools: &[ToolDescriptor],
    ) -> Result<OracleReply, GatewayError> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });

        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        Ok(reply.unwrap_or_else(|| OracleReply::text("")))
    }
}

/// Provider that always rejects the credentials
pub struct RejectingProvider;

#[async_trait]
impl LLMProvider for RejectingProvider {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn generate(
        &self,
        _messages: &[Turn],
        _tools: &[ToolDescriptor],
    ) -> Result<OracleReply, GatewayError> {
        Err(GatewayError::AuthenticationFailed("bad key".to_string()))
    }
}

/// Tool that echoes its `text` argument and counts executions
#[derive(Default)]
pub struct EchoTool {
    pub executions: AtomicUsize,
}

impl EchoTool {
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("echo", "Repeat the given text").param(ParamSpec::required(
            "text",
            ParamType::String,
            "Text to repeat",
        ))
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolValue, ToolError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(ToolValue::text(args.param_str("text")?))
    }
}

pub fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall::new(id, name, arguments)
}
