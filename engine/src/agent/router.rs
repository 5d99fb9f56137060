//! Intent Router
//!
//! Chooses which sub-engine handles a query. The classification strategy is a
//! trait so the keyword heuristic below can be replaced by a model-based
//! classifier without touching the orchestration loop.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sub-engine selected for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Decompose a multi-step goal into ordered steps
    Planning,

    /// Look information up
    Research,

    /// Direct tool-use reasoning loop
    Direct,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Planning => write!(f, "planning"),
            Destination::Research => write!(f, "research"),
            Destination::Direct => write!(f, "direct"),
        }
    }
}

/// Query classification strategy
///
/// Implementations must be pure: the same query and memory context always
/// yield the same destination.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, query: &str, memory_context: &[String]) -> Destination;
}

/// Queries at or below this many characters never route to planning
const PLANNING_MIN_LEN: usize = 20;

/// Keyword-trigger classifier
pub struct KeywordRouter {
    planning: Regex,
    research: Regex,
}

impl KeywordRouter {
    pub fn new() -> Self {
        Self {
            planning: Regex::new(r"(?i)\b(plan|planning|schedule)\b")
                .expect("Invalid planning pattern"),
            research: Regex::new(r"(?i)\b(research|find out|look up|investigate)\b")
                .expect("Invalid research pattern"),
        }
    }
}

impl Default for KeywordRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier for KeywordRouter {
    fn classify(&self, query: &str, _memory_context: &[String]) -> Destination {
        let query = query.trim();

        if query.chars().count() > PLANNING_MIN_LEN && self.planning.is_match(query) {
            Destination::Planning
        } else if self.research.is_match(query) {
            Destination::Research
        } else {
            Destination::Direct
        }
    }
}
