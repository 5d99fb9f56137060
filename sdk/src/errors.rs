//! Error types and handling
//!
//! This module provides the error types used throughout the Exa engine.
//! Engine errors implement the `ExaErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! Two layers are kept apart:
//!
//! - [`GatewayError`]: failures talking to the language-model service. Fatal to
//!   the current run, never retried by the orchestration loop itself.
//! - [`EngineError`]: everything the engine can surface to its caller, including
//!   registry and conversation protocol violations.
//!
//! Tool faults are deliberately absent from `EngineError`'s run-failure path:
//! they are folded into the conversation as text (see [`crate::types::ToolError`]).

use thiserror::Error;

/// Trait for Exa error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait ExaErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors signal a bug or a configuration that must be fixed by hand.
    fn is_recoverable(&self) -> bool;
}

/// Errors raised while exchanging a request with the language-model service
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl GatewayError {
    /// Whether a retry wrapper may try the same request again.
    ///
    /// Authentication, request-shape and parse failures will fail identically
    /// on every attempt, so only transport-level conditions qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_)
                | Self::RateLimitExceeded
                | Self::NetworkError(_)
                | Self::Timeout
        )
    }
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Gateway**: The language-model service failed (fatal to the run)
/// - **Registry**: Duplicate or unknown tool names
/// - **Conversation**: Tool results that reference no outstanding call
/// - **Memory / Database**: Long-term memory store failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ExaErrorExt};
///
/// let error = EngineError::UnknownTool("teleport".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::OrphanToolResult("call_9".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Language-model errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // Tool registry errors
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    // Conversation protocol errors
    #[error("Tool result references no outstanding tool call: {0}")]
    OrphanToolResult(String),

    // Memory store errors
    #[error("Memory store error: {0}")]
    Memory(String),

    #[error("Database error: {0}")]
    Database(String),

    // Research collaborator errors
    #[error("Search error: {0}")]
    Search(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExaErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Gateway(GatewayError::AuthenticationFailed(_)) => {
                "The language model rejected the credentials. Check your API key"
            }
            Self::Gateway(_) => "Language model unavailable. Check your network and provider",
            Self::DuplicateTool(_) => "Two tools were registered under the same name",
            Self::UnknownTool(_) => "The requested tool is not available",
            Self::OrphanToolResult(_) => "Internal protocol error. Please report this bug",
            Self::Memory(_) => "Long-term memory is unavailable. Answers may lack context",
            Self::Database(_) => "Database operation failed. Check the data directory",
            Self::Search(_) => "Web search failed. Try again later",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Gateway(e) => e.is_retryable(),
            Self::OrphanToolResult(_) | Self::DuplicateTool(_) | Self::Config(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_retryable() {
        assert!(GatewayError::Timeout.is_retryable());
        assert!(GatewayError::RateLimitExceeded.is_retryable());
        assert!(GatewayError::NetworkError("reset".into()).is_retryable());
        assert!(!GatewayError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!GatewayError::ParseError("no choices".into()).is_retryable());
        assert!(!GatewayError::InvalidRequest("400".into()).is_retryable());
    }

    #[test]
    fn test_gateway_error_converts_into_engine_error() {
        let err: EngineError = GatewayError::Timeout.into();
        assert!(matches!(err, EngineError::Gateway(GatewayError::Timeout)));
        assert_eq!(err.to_string(), "Gateway error: Timeout");
    }

    #[test]
    fn test_orphan_tool_result_is_fatal() {
        let err = EngineError::OrphanToolResult("call_1".into());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("call_1"));
    }

    #[test]
    fn test_user_hints_distinguish_auth_failures() {
        let auth = EngineError::Gateway(GatewayError::AuthenticationFailed("401".into()));
        let net = EngineError::Gateway(GatewayError::NetworkError("dns".into()));
        assert_ne!(auth.user_hint(), net.user_hint());
        assert!(auth.user_hint().contains("API key"));
    }
}
