//! Agent Core
//!
//! This module implements the orchestration loop that turns one user query
//! into a final answer:
//!
//! 1. Recall relevant long-term memory (best effort)
//! 2. Route the query to planning, research or the direct tool loop
//! 3. Direct loop: call the model, run any requested tools, fold the results
//!    back into the conversation, repeat until the model answers
//! 4. Give up with a fixed saturation message after `max_turns` model calls
//!
//! The conversation persists across runs for the lifetime of the orchestrator.
//! Gateway failures end the run; tool failures never do.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use sdk::errors::EngineError;

use super::{
    Conversation, Destination, IntentClassifier, KeywordRouter, ModelGateway, ModelResponse,
    ToolDispatcher,
};
use crate::conductor::{MemoryStore, Planner, Researcher};
use crate::llm::{LLMProvider, Turn};
use crate::tools::ToolRegistry;

/// Model calls allowed in one direct run before giving up
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Memory facts injected per run
pub const DEFAULT_MEMORY_TOP_K: usize = 3;

/// Answer returned when the turn bound is hit
pub const SATURATION_MESSAGE: &str =
    "Error: Maximum turns exceeded. The agent got stuck in a loop.";

/// Built-in operating instructions
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../../prompts/system_prompt.md");

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_turns: usize,
    pub memory_top_k: usize,
    pub system_prompt: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            memory_top_k: DEFAULT_MEMORY_TOP_K,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Read the operating instructions from `path`, falling back to the
/// built-in prompt when the file cannot be read.
pub fn load_system_prompt(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return DEFAULT_SYSTEM_PROMPT.to_string();
    };

    match std::fs::read_to_string(path) {
        Ok(prompt) => {
            info!("System prompt loaded from {}", path.display());
            prompt
        }
        Err(e) => {
            error!("System prompt file not readable at {}: {}", path.display(), e);
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "answer", rename_all = "lowercase")]
pub enum RunOutcome {
    /// A destination produced an answer
    Answered(String),

    /// The direct loop hit its turn bound
    Exhausted(String),
}

impl RunOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Answered(text) | Self::Exhausted(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Answered(text) | Self::Exhausted(text) => text,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered(_))
    }
}

/// Bookkeeping for the most recent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub run_id: String,
    pub destination: Destination,
    pub model_calls: usize,
    pub tool_calls: usize,
    pub duration_ms: u64,
}

/// The orchestration engine
pub struct Orchestrator {
    gateway: ModelGateway,
    dispatcher: ToolDispatcher,
    router: Box<dyn IntentClassifier>,
    planner: Planner,
    researcher: Researcher,
    memory: Option<Arc<dyn MemoryStore>>,
    config: OrchestratorConfig,
    conversation: Conversation,
    last_run: Option<RunStats>,
}

impl Orchestrator {
    /// Create an orchestrator; the conversation is seeded with the system prompt
    pub fn new(
        gateway: ModelGateway,
        registry: Arc<ToolRegistry>,
        router: Box<dyn IntentClassifier>,
        planner: Planner,
        researcher: Researcher,
        memory: Option<Arc<dyn MemoryStore>>,
        config: OrchestratorConfig,
    ) -> Self {
        let conversation = Conversation::new(config.system_prompt.clone());
        Self {
            gateway,
            dispatcher: ToolDispatcher::new(registry),
            router,
            planner,
            researcher,
            memory,
            config,
            conversation,
            last_run: None,
        }
    }

    /// Orchestrator with the keyword router, no memory and default settings
    pub fn with_defaults(provider: Arc<dyn LLMProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self::new(
            ModelGateway::new(provider),
            registry,
            Box::new(KeywordRouter::new()),
            Planner::new(),
            Researcher::new(),
            None,
            OrchestratorConfig::default(),
        )
    }

    /// Read-only view of the conversation
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Stats of the most recent successful run
    pub fn last_run(&self) -> Option<&RunStats> {
        self.last_run.as_ref()
    }

    pub fn provider_name(&self) -> &str {
        self.gateway.provider_name()
    }

    /// Run one query through to an answer or saturation
    ///
    /// Errors are gateway failures, research backend failures and internal
    /// protocol violations. Tool faults and memory failures never surface here.
    pub async fn orchestrate(&mut self, query: &str) -> Result<RunOutcome, EngineError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);

        let result = self.run(query, &run_id).instrument(span.clone()).await;
        if let Err(e) = &result {
            span.in_scope(|| error!("Run failed: {}", e));
        }
        result
    }

    async fn run(&mut self, query: &str, run_id: &str) -> Result<RunOutcome, EngineError> {
        let start = Instant::now();
        info!("Starting run with query: {}", query);

        let facts = self.recall(query).await;
        let destination = self.router.classify(query, &facts);
        info!("Routed to {}", destination);

        self.conversation.append(Turn::user(query))?;

        let (outcome, model_calls, tool_calls) = match destination {
            Destination::Planning => {
                let plan = self
                    .planner
                    .create_plan(&self.gateway, &mut self.conversation, query)
                    .await?;
                (RunOutcome::Answered(plan.render()), 1, 0)
            }
            Destination::Research => {
                let answer = self.researcher.research(query).await?;
                (RunOutcome::Answered(answer), 0, 0)
            }
            Destination::Direct => self.direct_loop(&facts).await?,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Run finished ({}) after {} model calls and {} tool calls in {}ms",
            if outcome.is_answered() { "answered" } else { "exhausted" },
            model_calls,
            tool_calls,
            duration_ms
        );

        self.last_run = Some(RunStats {
            run_id: run_id.to_string(),
            destination,
            model_calls,
            tool_calls,
            duration_ms,
        });

        Ok(outcome)
    }

    /// Fetch relevant facts; failures are logged and treated as none
    async fn recall(&self, query: &str) -> Vec<String> {
        let Some(memory) = &self.memory else {
            return Vec::new();
        };

        match memory.search(query, self.config.memory_top_k).await {
            Ok(facts) => {
                debug!("Recalled {} memory facts", facts.len());
                facts
            }
            Err(e) => {
                warn!("Memory retrieval failed, continuing without context: {}", e);
                Vec::new()
            }
        }
    }

    async fn direct_loop(
        &mut self,
        facts: &[String],
    ) -> Result<(RunOutcome, usize, usize), EngineError> {
        if !facts.is_empty() {
            self.conversation.append(Turn::system(facts_turn(facts)))?;
        }

        let tools = self.dispatcher.registry().schemas();
        let max_turns = self.config.max_turns;
        let mut tool_calls = 0;

        for turn in 1..=max_turns {
            debug!("Turn {}/{}", turn, max_turns);

            match self.gateway.complete(&mut self.conversation, &tools).await? {
                ModelResponse::FinalAnswer(answer) => {
                    debug!("Final answer received");
                    return Ok((RunOutcome::Answered(answer), turn, tool_calls));
                }
                ModelResponse::ToolRequests(requests) => {
                    info!("Model requested {} tools", requests.len());
                    tool_calls += requests.len();
                    self.dispatcher
                        .dispatch_into(&requests, &mut self.conversation)
                        .await?;
                }
            }
        }

        warn!("Run exceeded max turns ({})", max_turns);
        Ok((
            RunOutcome::Exhausted(SATURATION_MESSAGE.to_string()),
            max_turns,
            tool_calls,
        ))
    }
}

/// System turn carrying recalled facts
fn facts_turn(facts: &[String]) -> String {
    let mut text = String::from("Relevant facts about the user:");
    for fact in facts {
        text.push_str("\n- ");
        text.push_str(fact);
    }
    text
}

/// Request timeout from whole seconds, never zero
pub fn request_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facts_turn_format() {
        let text = facts_turn(&["Likes mornings".to_string(), "Vegan".to_string()]);
        assert_eq!(text, "Relevant facts about the user:\n- Likes mornings\n- Vegan");
    }

    #[test]
    fn test_run_outcome_text() {
        let answered = RunOutcome::Answered("done".to_string());
        let exhausted = RunOutcome::Exhausted(SATURATION_MESSAGE.to_string());

        assert!(answered.is_answered());
        assert!(!exhausted.is_answered());
        assert_eq!(exhausted.text(), SATURATION_MESSAGE);
        assert_eq!(answered.into_text(), "done");
    }

    #[test]
    fn test_run_outcome_serializes_tagged() {
        let json = serde_json::to_value(RunOutcome::Answered("hi".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "answered", "answer": "hi"}));
    }

    #[test]
    fn test_load_system_prompt_fallback() {
        assert_eq!(load_system_prompt(None), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(
            load_system_prompt(Some(Path::new("/definitely/not/here.md"))),
            DEFAULT_SYSTEM_PROMPT
        );

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "Be terse.").unwrap();
        assert_eq!(load_system_prompt(Some(&path)), "Be terse.");
    }

    #[test]
    fn test_default_prompt_is_not_empty() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("Exa"));
        assert_eq!(OrchestratorConfig::default().max_turns, 10);
    }
}
