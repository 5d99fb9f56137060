//! Exa SDK
//!
//! Shared library providing traits, types, and error definitions used by the
//! engine and by every tool implementation.

/// Tool trait and declared parameter schemas
pub mod tool;

/// Error types and handling
pub mod errors;

/// Tool input/output types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ExaErrorExt, GatewayError};
pub use tool::{ParamSpec, ParamType, Tool, ToolDescriptor};
pub use types::{ToolArgs, ToolError, ToolValue};
