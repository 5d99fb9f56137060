pub mod calendar;
pub mod email;
pub mod preference;
pub mod reminders;

pub use calendar::{CalendarEvent, CalendarStore, CalendarTool};
pub use email::EmailTool;
pub use preference::SavePreferenceTool;
pub use reminders::RemindersTool;

use std::collections::BTreeMap;
use std::sync::Arc;

use sdk::errors::EngineError;
use sdk::{Tool, ToolDescriptor};
use tracing::debug;

/// A descriptor paired with the executor it was registered with
#[derive(Clone)]
struct RegisteredTool {
    descriptor: ToolDescriptor,
    executor: Arc<dyn Tool>,
}

/// Registry of available tools that can be dispatched by the agent.
///
/// Keyed by tool name. Membership is fixed once the registry is handed to an
/// orchestrator; lookups take `&self` and are safe to share across runs.
/// Schemas come back in name order, so every run presents tools identically.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create an empty registry with no tools enabled.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register an executor under the given descriptor.
    ///
    /// Fails with `DuplicateTool` if the name is taken; the registry is left
    /// unchanged in that case.
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        executor: Arc<dyn Tool>,
    ) -> Result<(), EngineError> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(EngineError::DuplicateTool(descriptor.name));
        }

        debug!("Registered tool '{}'", descriptor.name);
        self.tools.insert(
            descriptor.name.clone(),
            RegisteredTool {
                descriptor,
                executor,
            },
        );
        Ok(())
    }

    /// Register a tool under its own descriptor.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> Result<(), EngineError> {
        let descriptor = tool.descriptor();
        self.register(descriptor, tool)
    }

    /// Find the executor registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, EngineError> {
        self.tools
            .get(name)
            .map(|t| Arc::clone(&t.executor))
            .ok_or_else(|| EngineError::UnknownTool(name.to_string()))
    }

    /// Descriptors of every registered tool, ordered by name.
    pub fn schemas(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor.clone()).collect()
    }

    /// Names of every registered tool, ordered.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
