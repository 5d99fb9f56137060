//! Tool Dispatcher
//!
//! Executes the tool requests of one assistant turn and turns every outcome,
//! good or bad, into a tool turn the model can read. Requests in a batch run
//! concurrently; results always come back in request order.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, warn};

use sdk::errors::EngineError;
use sdk::{ToolArgs, ToolError};

use super::Conversation;
use crate::llm::{ToolCall, Turn};
use crate::tools::ToolRegistry;

/// Why a tool request did not produce a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFailureKind {
    UnknownTool,
    InvalidArguments,
    ExecutionFailed,
}

impl fmt::Display for ToolFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool => write!(f, "unknown_tool"),
            Self::InvalidArguments => write!(f, "invalid_arguments"),
            Self::ExecutionFailed => write!(f, "execution_failed"),
        }
    }
}

/// Outcome of one tool request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Ok(String),
    Error {
        kind: ToolFailureKind,
        message: String,
    },
}

/// Result of one tool request, correlated by call id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub call_id: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    fn ok(call_id: &str, text: String) -> Self {
        Self {
            call_id: call_id.to_string(),
            outcome: ToolOutcome::Ok(text),
        }
    }

    fn error(call_id: &str, kind: ToolFailureKind, message: String) -> Self {
        Self {
            call_id: call_id.to_string(),
            outcome: ToolOutcome::Error { kind, message },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error { .. })
    }

    /// Text the model sees for this result
    pub fn text(&self) -> String {
        match &self.outcome {
            ToolOutcome::Ok(text) => text.clone(),
            ToolOutcome::Error { message, .. } => format!("ERROR: {}", message),
        }
    }

    /// Fold the result into a tool turn
    pub fn to_turn(&self) -> Turn {
        Turn::tool_result(self.text(), self.call_id.clone())
    }
}

/// Executes tool requests against a shared registry
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute every request, returning one result per request in order
    pub async fn dispatch(&self, requests: &[ToolCall]) -> Vec<ToolResult> {
        join_all(requests.iter().map(|call| self.dispatch_one(call))).await
    }

    /// Execute every request and append the resulting tool turns
    pub async fn dispatch_into(
        &self,
        requests: &[ToolCall],
        conversation: &mut Conversation,
    ) -> Result<Vec<ToolResult>, EngineError> {
        let results = self.dispatch(requests).await;
        for result in &results {
            conversation.append(result.to_turn())?;
        }
        Ok(results)
    }

    async fn dispatch_one(&self, call: &ToolCall) -> ToolResult {
        debug!("Dispatching tool '{}' ({})", call.name, call.id);

        let args = match ToolArgs::parse(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!("Bad arguments for tool '{}': {}", call.name, e);
                return ToolResult::error(
                    &call.id,
                    ToolFailureKind::InvalidArguments,
                    format!("Invalid JSON arguments for '{}': {}", call.name, e),
                );
            }
        };

        let executor = match self.registry.lookup(&call.name) {
            Ok(executor) => executor,
            Err(_) => {
                warn!("Unknown tool requested: {}", call.name);
                return ToolResult::error(
                    &call.id,
                    ToolFailureKind::UnknownTool,
                    format!(
                        "Tool '{}' not found. Available tools: {}",
                        call.name,
                        self.registry.names().join(", ")
                    ),
                );
            }
        };

        match AssertUnwindSafe(executor.execute(args)).catch_unwind().await {
            Ok(Ok(value)) => {
                let text = value.into_text();
                debug!("Tool '{}' returned {} bytes", call.name, text.len());
                ToolResult::ok(&call.id, text)
            }
            Ok(Err(e)) => {
                warn!("Tool '{}' failed: {}", call.name, e);
                let kind = if matches!(e, ToolError::ExecutionFailed(_)) {
                    ToolFailureKind::ExecutionFailed
                } else {
                    ToolFailureKind::InvalidArguments
                };
                ToolResult::error(&call.id, kind, format!("{} ({})", e, call.name))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!("Tool '{}' panicked: {}", call.name, reason);
                ToolResult::error(
                    &call.id,
                    ToolFailureKind::ExecutionFailed,
                    format!("Error executing tool '{}': {}", call.name, reason),
                )
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sdk::{ParamSpec, ParamType, Tool, ToolDescriptor, ToolValue};
    use serde_json::json;
    use std::time::Duration;

    /// Sleeps for `delay_ms` then echoes `text`
    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("echo", "Echo text after a delay")
                .param(ParamSpec::required("text", ParamType::String, "Text"))
                .param(ParamSpec::optional("delay_ms", ParamType::Integer, "Delay"))
        }

        async fn execute(&self, args: ToolArgs) -> Result<ToolValue, ToolError> {
            let delay = args.param_i64("delay_ms").unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            Ok(ToolValue::Text(args.param_str("text")?))
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("broken", "Always fails")
        }

        async fn execute(&self, args: ToolArgs) -> Result<ToolValue, ToolError> {
            if args.param_bool_opt("panic").unwrap_or(false) {
                panic!("boom");
            }
            Err(ToolError::ExecutionFailed("disk full".to_string()))
        }
    }

    struct Structured;

    #[async_trait]
    impl Tool for Structured {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("structured", "Returns JSON")
        }

        async fn execute(&self, _args: ToolArgs) -> Result<ToolValue, ToolError> {
            Ok(ToolValue::json(json!({"z": 1, "a": "x"})))
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let mut registry = ToolRegistry::empty();
        registry.register_tool(Arc::new(Echo)).unwrap();
        registry.register_tool(Arc::new(Broken)).unwrap();
        registry.register_tool(Arc::new(Structured)).unwrap();
        ToolDispatcher::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_results_keep_request_order() {
        let calls = vec![
            ToolCall::new("slow", "echo", r#"{"text": "first", "delay_ms": 50}"#),
            ToolCall::new("fast", "echo", r#"{"text": "second"}"#),
        ];

        let results = dispatcher().dispatch(&calls).await;

        assert_eq!(results[0], ToolResult::ok("slow", "first".to_string()));
        assert_eq!(results[1], ToolResult::ok("fast", "second".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_json_arguments() {
        let results = dispatcher()
            .dispatch(&[ToolCall::new("c1", "echo", "{not json")])
            .await;

        assert!(matches!(
            results[0].outcome,
            ToolOutcome::Error { kind: ToolFailureKind::InvalidArguments, .. }
        ));
        assert!(results[0].text().starts_with("ERROR: Invalid JSON arguments"));
    }

    #[tokio::test]
    async fn test_unknown_tool_lists_available() {
        let results = dispatcher()
            .dispatch(&[ToolCall::new("c1", "teleport", "{}")])
            .await;

        let text = results[0].text();
        assert!(matches!(
            results[0].outcome,
            ToolOutcome::Error { kind: ToolFailureKind::UnknownTool, .. }
        ));
        assert!(text.contains("'teleport' not found"));
        assert!(text.contains("broken, echo, structured"));
    }

    #[tokio::test]
    async fn test_missing_parameter_is_invalid_arguments() {
        let results = dispatcher()
            .dispatch(&[ToolCall::new("c1", "echo", "{}")])
            .await;

        assert!(matches!(
            results[0].outcome,
            ToolOutcome::Error { kind: ToolFailureKind::InvalidArguments, .. }
        ));
        assert!(results[0].text().contains("Missing parameter: text"));
    }

    #[tokio::test]
    async fn test_execution_failure_and_panic_are_data() {
        let results = dispatcher()
            .dispatch(&[
                ToolCall::new("c1", "broken", "{}"),
                ToolCall::new("c2", "broken", r#"{"panic": true}"#),
            ])
            .await;

        for result in &results {
            assert!(matches!(
                result.outcome,
                ToolOutcome::Error { kind: ToolFailureKind::ExecutionFailed, .. }
            ));
        }
        assert!(results[0].text().contains("disk full"));
        assert!(results[1].text().contains("boom"));
    }

    #[tokio::test]
    async fn test_structured_value_is_canonical_text() {
        let results = dispatcher()
            .dispatch(&[ToolCall::new("c1", "structured", "")])
            .await;
        assert_eq!(results[0].text(), r#"{"a":"x","z":1}"#);
    }

    #[tokio::test]
    async fn test_dispatch_into_appends_in_order() {
        let calls = vec![
            ToolCall::new("a", "echo", r#"{"text": "1", "delay_ms": 30}"#),
            ToolCall::new("b", "teleport", "{}"),
            ToolCall::new("c", "echo", r#"{"text": "3"}"#),
        ];
        let mut conv = Conversation::new("sys");
        conv.append(Turn::assistant_tool_calls(calls.clone())).unwrap();

        dispatcher().dispatch_into(&calls, &mut conv).await.unwrap();

        let ids: Vec<_> = conv.snapshot()[2..]
            .iter()
            .map(|t| t.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
