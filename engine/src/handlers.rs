//! Command handlers for CLI operations
//!
//! This module wires configuration into a ready orchestrator and implements
//! the handlers for all CLI commands:
//! - run: Answer a single request
//! - chat: Interactive session sharing one conversation
//! - doctor: Validate configuration and check the provider
//! - serve: Expose the chat endpoint over HTTP

use anyhow::{Context, Result};
use serde_json::json;
use std::io::Write;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use sdk::errors::{EngineError, ExaErrorExt};

use crate::agent::core::request_timeout;
use crate::agent::{
    load_system_prompt, KeywordRouter, ModelGateway, Orchestrator, OrchestratorConfig,
    RunOutcome,
};
use crate::conductor::{MemoryStore, Planner, Researcher};
use crate::config::Config;
use crate::db::Database;
use crate::llm::ollama::OllamaProvider;
use crate::llm::openai::OpenAIProvider;
use crate::llm::retry::{RetryPolicy, RetryingProvider};
use crate::llm::LLMProvider;
use crate::server;
use crate::tools::{
    CalendarTool, EmailTool, RemindersTool, SavePreferenceTool, ToolRegistry,
};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Retry policy from configuration; every attempt is bounded by the
/// configured request timeout.
pub fn retry_policy(config: &Config) -> RetryPolicy {
    let retry = &config.agent.retry;
    RetryPolicy::new(retry.max_attempts, Duration::from_millis(retry.backoff_ms))
        .with_attempt_timeout(request_timeout(config.llm.request_timeout_secs))
}

/// Build the configured provider, wrapped in the retry layer
pub fn build_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let inner: Arc<dyn LLMProvider> = match config.llm.default_provider.as_str() {
        "openai" => {
            let provider = OpenAIProvider::from_env(config.llm.openai.clone());
            if std::env::var(&config.llm.openai.api_key_env).is_err() {
                tracing::warn!(
                    "{} is not set; OpenAI requests will fail",
                    config.llm.openai.api_key_env
                );
            }
            Arc::new(provider)
        }
        "ollama" => Arc::new(OllamaProvider::new(
            config.llm.ollama.base_url.clone(),
            config.llm.ollama.model.clone(),
        )),
        other => anyhow::bail!("Unsupported provider '{}'", other),
    };

    Ok(Arc::new(RetryingProvider::new(inner, retry_policy(config))))
}

/// Open the long-term memory store; a store that cannot be opened is
/// reported and skipped.
pub async fn open_memory(config: &Config) -> Option<Arc<dyn MemoryStore>> {
    if !config.memory.enabled {
        return None;
    }

    match Database::new(&config.memory_db_path()).await {
        Ok(db) => Some(Arc::new(db.memory())),
        Err(e) => {
            tracing::warn!("Long-term memory unavailable: {:#}", e);
            None
        }
    }
}

/// Build the registry from the enabled tools
pub fn build_registry(
    config: &Config,
    memory: Option<Arc<dyn MemoryStore>>,
) -> std::result::Result<ToolRegistry, EngineError> {
    let data_dir = &config.core.data_dir;
    let mut registry = ToolRegistry::empty();

    if config.tools.calendar {
        registry.register_tool(Arc::new(CalendarTool::default()))?;
    }
    if config.tools.reminders {
        registry.register_tool(Arc::new(RemindersTool::new(data_dir.join("reminders.json"))))?;
    }
    if config.tools.email {
        registry.register_tool(Arc::new(EmailTool::new(data_dir.join("email_outbox.log"))))?;
    }
    if config.tools.save_preference {
        if let Some(memory) = memory {
            registry.register_tool(Arc::new(SavePreferenceTool::new(memory)))?;
        }
    }

    Ok(registry)
}

/// Assemble an orchestrator from configuration
pub async fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let provider = build_provider(config)?;
    let memory = open_memory(config).await;
    let registry = build_registry(config, memory.clone()).context("Failed to register tools")?;

    tracing::info!(
        "Using provider {} with tools: {}",
        provider.name(),
        registry.names().join(", ")
    );

    let orchestrator_config = OrchestratorConfig {
        max_turns: config.agent.max_turns,
        memory_top_k: config.agent.memory_top_k,
        system_prompt: load_system_prompt(config.agent.system_prompt_path.as_deref()),
    };

    // Attempts time out inside the retry layer; the gateway only bounds the
    // whole retried call.
    let budget = retry_policy(config)
        .total_budget()
        .unwrap_or_else(|| request_timeout(config.llm.request_timeout_secs));
    let gateway = ModelGateway::new(provider).with_timeout(budget);

    Ok(Orchestrator::new(
        gateway,
        Arc::new(registry),
        Box::new(KeywordRouter::new()),
        Planner::new(),
        Researcher::new(),
        memory,
        orchestrator_config,
    ))
}

fn print_outcome(orchestrator: &Orchestrator, outcome: &RunOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{}", outcome.text());
        }
        OutputFormat::Json => {
            let mut output = serde_json::to_value(outcome)?;
            if let Some(stats) = orchestrator.last_run() {
                output["run_id"] = json!(stats.run_id);
                output["destination"] = json!(stats.destination);
                output["model_calls"] = json!(stats.model_calls);
                output["tool_calls"] = json!(stats.tool_calls);
                output["duration_ms"] = json!(stats.duration_ms);
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_error(error: &EngineError, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            eprintln!("✗ {}", error);
            eprintln!("  Hint: {}", error.user_hint());
        }
        OutputFormat::Json => {
            let output = json!({
                "outcome": "failed",
                "error": error.to_string(),
                "hint": error.user_hint(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Answer a single request
///
/// A failed run is reported once, here, and turned into a failing exit code.
pub async fn handle_run(query: String, config: &Config, format: OutputFormat) -> Result<ExitCode> {
    let mut orchestrator = build_orchestrator(config).await?;

    match orchestrator.orchestrate(&query).await {
        Ok(outcome) => {
            print_outcome(&orchestrator, &outcome, format)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::debug!("Run failed: {}", e);
            print_error(&e, format)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Interactive session
///
/// Every line is one run against the same conversation. `exit` or `quit`
/// ends the session; blank lines are skipped; failed runs are reported and
/// the session continues.
pub async fn handle_chat(config: &Config, format: OutputFormat) -> Result<()> {
    let mut orchestrator = build_orchestrator(config).await?;

    if let OutputFormat::Text = format {
        println!("Exa is ready ({}). Type 'exit' to quit.", orchestrator.provider_name());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if let OutputFormat::Text = format {
            print!("\nYou: ");
            std::io::stdout().flush()?;
        }

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let query = line.trim();

        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }

        match orchestrator.orchestrate(query).await {
            Ok(outcome) => {
                if let OutputFormat::Text = format {
                    print!("Exa: ");
                }
                print_outcome(&orchestrator, &outcome, format)?;
            }
            Err(e) => print_error(&e, format)?,
        }
    }

    if let OutputFormat::Text = format {
        println!("Goodbye!");
    }
    Ok(())
}

/// Serve the HTTP API until interrupted
pub async fn handle_serve(bind: &str, config: &Config) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", bind))?;
    let orchestrator = build_orchestrator(config).await?;

    server::serve(orchestrator, addr).await
}

/// Validate configuration and check dependencies
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(&str, String)> = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration", "Valid".to_string()));

    if config.core.data_dir.is_dir() {
        checks.push(("Data directory", "Exists".to_string()));
    } else {
        checks.push(("Data directory", "Missing".to_string()));
        issues.push(format!(
            "Data directory does not exist: {}",
            config.core.data_dir.display()
        ));
    }

    if let Some(path) = &config.agent.system_prompt_path {
        if path.is_file() {
            checks.push(("System prompt", "Custom".to_string()));
        } else {
            checks.push(("System prompt", "Missing (built-in used)".to_string()));
            issues.push(format!("System prompt file not found: {}", path.display()));
        }
    } else {
        checks.push(("System prompt", "Built-in".to_string()));
    }

    let provider = build_provider(config)?;
    if provider.check_health().await {
        checks.push(("Provider", format!("{} available", provider.name())));
    } else {
        checks.push(("Provider", format!("{} unavailable", provider.name())));
        issues.push(match config.llm.default_provider.as_str() {
            "openai" => format!("Set {} to your OpenAI API key", config.llm.openai.api_key_env),
            _ => format!(
                "Cannot reach Ollama at {}. Is it running?",
                config.llm.ollama.base_url
            ),
        });
    }

    if config.memory.enabled {
        match Database::new(&config.memory_db_path()).await {
            Ok(db) => {
                let facts = db.memory().count().await.unwrap_or(0);
                checks.push(("Long-term memory", format!("{} facts", facts)));
                db.close().await.ok();
            }
            Err(e) => {
                checks.push(("Long-term memory", "Unavailable".to_string()));
                issues.push(format!("Cannot open memory database: {:#}", e));
            }
        }
    } else {
        checks.push(("Long-term memory", "Disabled".to_string()));
    }

    match format {
        OutputFormat::Text => {
            println!("Exa System Diagnostics");
            println!("======================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<20} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.core.data_dir = dir.path().to_path_buf();
        config.llm.default_provider = "ollama".to_string();
        config
    }

    #[tokio::test]
    async fn test_registry_follows_tool_flags() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.tools.email = false;

        let memory = open_memory(&config).await;
        assert!(memory.is_some());

        let registry = build_registry(&config, memory).unwrap();
        assert_eq!(
            registry.names(),
            vec!["calendar_tool", "reminders", "save_preference"]
        );
    }

    #[tokio::test]
    async fn test_save_preference_needs_memory() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.memory.enabled = false;

        assert!(open_memory(&config).await.is_none());
        let registry = build_registry(&config, None).unwrap();
        assert!(!registry.names().contains(&"save_preference"));
    }

    #[tokio::test]
    async fn test_build_orchestrator_seeds_prompt() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let orchestrator = build_orchestrator(&config).await.unwrap();
        assert_eq!(orchestrator.provider_name(), "ollama");
        assert_eq!(orchestrator.conversation().len(), 1);
    }

    #[tokio::test]
    async fn test_serve_rejects_bad_bind_address() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let err = handle_serve("not-an-address", &config).await.unwrap_err();
        assert!(err.to_string().contains("Invalid bind address"));
    }

    #[test]
    fn test_retry_policy_bounds_each_attempt() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.llm.request_timeout_secs = 10;
        config.agent.retry.max_attempts = 2;
        config.agent.retry.backoff_ms = 0;

        let policy = retry_policy(&config);
        assert_eq!(policy.attempt_timeout, Some(Duration::from_secs(10)));
        assert_eq!(policy.total_budget(), Some(Duration::from_secs(20)));
    }

    #[tokio::test]
    async fn test_failed_run_exits_non_zero() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        // Nothing listens on the discard port
        config.llm.ollama.base_url = "http://127.0.0.1:9".to_string();
        config.agent.retry.max_attempts = 1;
        config.memory.enabled = false;

        let code = handle_run("hello".to_string(), &config, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }
}
