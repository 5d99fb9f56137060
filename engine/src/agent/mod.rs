//! Agent Orchestration
//!
//! The conversation log, the gateway to the language model, the tool
//! dispatcher, the intent router and the loop that ties them together.

pub mod conversation;
pub mod core;
pub mod dispatcher;
pub mod gateway;
pub mod router;

pub use conversation::Conversation;
pub use core::{
    load_system_prompt, Orchestrator, OrchestratorConfig, RunOutcome, RunStats,
    SATURATION_MESSAGE,
};
pub use dispatcher::{ToolDispatcher, ToolFailureKind, ToolOutcome, ToolResult};
pub use gateway::{ModelGateway, ModelResponse};
pub use router::{Destination, IntentClassifier, KeywordRouter};
