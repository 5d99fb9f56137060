//! Save Preference Tool
//!
//! Writes a user preference into long-term memory so later runs can recall it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use sdk::{ParamSpec, ParamType, Tool, ToolArgs, ToolDescriptor, ToolError, ToolValue};

use crate::conductor::MemoryStore;

pub struct SavePreferenceTool {
    memory: Arc<dyn MemoryStore>,
}

impl SavePreferenceTool {
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for SavePreferenceTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "save_preference",
            "Save a user preference or fact to long-term memory for future reference.",
        )
        .param(ParamSpec::required(
            "preference",
            ParamType::String,
            "The user preference or fact to save (e.g., 'User prefers lunch at 1pm').",
        ))
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolValue, ToolError> {
        let preference = args
            .param_str_opt("preference")
            .ok_or_else(|| ToolError::MissingParameter("preference".to_string()))?;

        self.memory
            .add(
                &preference,
                json!({"source": "user_interaction", "type": "preference"}),
            )
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        tracing::info!("Preference saved");
        Ok(ToolValue::Text(format!("Preference saved: '{}'", preference)))
    }
}
