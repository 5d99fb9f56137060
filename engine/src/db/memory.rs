//! Persistent Memory Store
//!
//! SQLite-backed [`MemoryStore`]. Every fact is mirrored into the
//! `memory_facts_fts` full-text table; search matches any content word of the
//! query and orders hits by FTS bm25 rank.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use sdk::errors::EngineError;

use crate::conductor::memory::{terms, Fact, MemoryStore};

/// Repository for long-term memory facts
pub struct SqliteMemoryStore {
    pool: SqlitePool,
}

impl SqliteMemoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load every stored fact, newest first
    pub async fn all(&self) -> Result<Vec<Fact>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT text, metadata, created_at
            FROM memory_facts
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::Database(format!("Failed to load memory facts: {}", e)))?;

        let mut facts = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata: String = row.get("metadata");
            let created_at: String = row.get("created_at");
            facts.push(Fact {
                text: row.get("text"),
                metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_default(),
            });
        }

        Ok(facts)
    }

    /// Number of stored facts
    pub async fn count(&self) -> Result<i64, EngineError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM memory_facts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EngineError::Database(format!("Failed to count memory facts: {}", e)))
    }
}

/// FTS5 query matching any of the content words of `query`
///
/// Each word is quoted so that FTS operators in user text stay literal.
/// `None` when the query has no content words.
fn match_expression(query: &str) -> Option<String> {
    let mut words: Vec<String> = terms(query).into_iter().collect();
    if words.is_empty() {
        return None;
    }
    words.sort();

    Some(
        words
            .iter()
            .map(|w| format!("\"{}\"", w.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, EngineError> {
        let Some(expression) = match_expression(query) else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT f.text
            FROM memory_facts_fts
            JOIN memory_facts f ON f.id = memory_facts_fts.fact_id
            WHERE memory_facts_fts MATCH ?
            ORDER BY memory_facts_fts.rank, f.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(&expression)
        .bind(i64::try_from(k).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::Database(format!("Failed to search memory facts: {}", e)))?;

        tracing::debug!("Memory search '{}' matched {} facts", expression, hits.len());
        Ok(hits)
    }

    async fn add(&self, text: &str, metadata: Value) -> Result<(), EngineError> {
        let id = uuid::Uuid::new_v4().to_string();
        let store_err = |e: sqlx::Error| {
            EngineError::Database(format!("Failed to store memory fact: {}", e))
        };

        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query(
            r#"
            INSERT INTO memory_facts (id, text, metadata, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(text)
        .bind(metadata.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        sqlx::query("INSERT INTO memory_facts_fts (text, fact_id) VALUES (?, ?)")
            .bind(text)
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;

        tracing::debug!("Stored memory fact ({} chars)", text.len());
        Ok(())
    }
}
