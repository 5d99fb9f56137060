//! Conversation State
//!
//! Ordered, append-only log of turns shared with the language model on every
//! call. The log is seeded with exactly one system turn and only ever grows:
//! there is no edit or removal operation. Summarization or eviction for long
//! sessions would hang off this type; none is performed today.

use std::collections::HashSet;

use sdk::errors::EngineError;

use crate::llm::{Role, Turn};

/// Append-only conversation log for one orchestrator
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,

    /// Tool-call ids requested by assistant turns and not yet answered
    outstanding: HashSet<String>,
}

impl Conversation {
    /// Create a conversation seeded with the operating instructions
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
            outstanding: HashSet::new(),
        }
    }

    /// Append a turn to the log
    ///
    /// Tool turns must answer a call id requested by an earlier assistant turn
    /// and not answered yet; otherwise this fails with `OrphanToolResult` and
    /// the log is left untouched.
    pub fn append(&mut self, turn: Turn) -> Result<(), EngineError> {
        match turn.role {
            Role::Tool => {
                let call_id = turn.tool_call_id.as_deref().unwrap_or_default();
                if !self.outstanding.remove(call_id) {
                    return Err(EngineError::OrphanToolResult(if call_id.is_empty() {
                        "<missing tool_call_id>".to_string()
                    } else {
                        call_id.to_string()
                    }));
                }
            }
            Role::Assistant => {
                self.outstanding
                    .extend(turn.tool_calls.iter().map(|call| call.id.clone()));
            }
            Role::System | Role::User => {}
        }

        self.turns.push(turn);
        Ok(())
    }

    /// Read-only view of every turn, oldest first
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns in the log
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Whether `call_id` was requested and still awaits its tool turn
    pub fn is_outstanding(&self, call_id: &str) -> bool {
        self.outstanding.contains(call_id)
    }
}
