//! Researcher
//!
//! Answers information-seeking queries through a pluggable search backend.
//! Without one it reports that search is not configured instead of making
//! anything up.

use std::sync::Arc;

use async_trait::async_trait;

use sdk::errors::EngineError;

/// Web search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Findings for `query`, most relevant first
    async fn search(&self, query: &str) -> Result<Vec<String>, EngineError>;
}

#[derive(Clone, Default)]
pub struct Researcher {
    search: Option<Arc<dyn SearchProvider>>,
}

impl Researcher {
    /// Researcher with no search backend
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(search: Arc<dyn SearchProvider>) -> Self {
        Self {
            search: Some(search),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.search.is_some()
    }

    pub async fn research(&self, query: &str) -> Result<String, EngineError> {
        tracing::info!("Researcher received query: {}", query);

        let Some(search) = &self.search else {
            return Ok(not_configured(query));
        };

        let findings = search.search(query).await?;
        if findings.is_empty() {
            return Ok(format!("[Researcher] No results found for '{}'.", query));
        }

        let mut answer = format!("[Researcher] Findings for '{}':", query);
        for finding in findings {
            answer.push_str("\n- ");
            answer.push_str(finding.trim());
        }
        Ok(answer)
    }
}

fn not_configured(query: &str) -> String {
    format!(
        "[Researcher] I would normally search the web for '{}'. (Web Search API not yet configured).",
        query
    )
}
