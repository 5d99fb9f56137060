//! Exa Engine Library
//!
//! This library provides the agent orchestration engine behind the `exa`
//! binary. It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// Orchestration loop and its components
pub mod agent;

/// Planning, research and long-term memory
pub mod conductor;

/// Built-in scheduler tools and the tool registry
pub mod tools;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

/// HTTP API server
pub mod server;
