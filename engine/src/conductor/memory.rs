//! Long-term Memory
//!
//! Facts about the user that outlive a session (preferences, habits). The
//! orchestrator pulls the most relevant ones into context before a direct
//! run; the `save_preference` tool writes new ones.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use sdk::errors::EngineError;

/// Words too common to say anything about relevance
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "all", "any", "can", "had", "her",
    "was", "one", "our", "out", "has", "him", "his", "how", "its", "may", "who", "did", "get",
    "let", "she", "too", "use", "with", "that", "this", "from", "they", "them", "then", "than",
    "what", "when", "where", "which", "will", "would", "about", "into", "have", "been", "like",
    "just", "some", "please", "me", "my",
];

/// Semantic store of facts about the user
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Up to `k` facts relevant to `query`, most relevant first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, EngineError>;

    /// Remember `text` with free-form metadata
    async fn add(&self, text: &str, metadata: Value) -> Result<(), EngineError>;
}

/// A stored fact, as the ranking sees it
#[derive(Debug, Clone)]
pub struct Fact {
    pub text: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Lowercase content words of `text`
pub(crate) fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Rank facts by how many query terms they share, newest first on ties.
/// Facts sharing no term are dropped.
pub(crate) fn rank_facts(query: &str, facts: &[Fact], k: usize) -> Vec<String> {
    let query_terms = terms(query);
    if query_terms.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &Fact)> = facts
        .iter()
        .map(|fact| (terms(&fact.text).intersection(&query_terms).count(), fact))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.created_at.cmp(&a.1.created_at)));

    scored
        .into_iter()
        .take(k)
        .map(|(_, fact)| fact.text.clone())
        .collect()
}

/// Process-local memory store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    facts: RwLock<Vec<Fact>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.facts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.facts.read().await.is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, EngineError> {
        let facts = self.facts.read().await;
        Ok(rank_facts(query, &facts, k))
    }

    async fn add(&self, text: &str, metadata: Value) -> Result<(), EngineError> {
        self.facts.write().await.push(Fact {
            text: text.to_string(),
            metadata,
            created_at: Utc::now(),
        });
        Ok(())
    }
}
