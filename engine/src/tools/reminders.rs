//! Reminders Tool
//!
//! Adds and lists reminders persisted as a JSON array in a file owned by the
//! tool instance.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use sdk::{ParamSpec, ParamType, Tool, ToolArgs, ToolDescriptor, ToolError, ToolValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub task: String,
    pub due: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

pub struct RemindersTool {
    path: PathBuf,

    /// Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl RemindersTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every reminder; a missing file counts as empty
    ///
    /// An unreadable or malformed file is an error so that a later save
    /// never overwrites reminders it could not parse.
    pub async fn load(&self) -> Result<Vec<Reminder>, ToolError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                return Err(ToolError::ExecutionFailed(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&raw).map_err(|e| {
            warn!("Malformed reminders file {}: {}", self.path.display(), e);
            ToolError::ExecutionFailed(format!(
                "Reminders file {} is corrupt and was left untouched: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn save(&self, reminders: &[Reminder]) -> Result<(), ToolError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("Failed to create data dir: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(reminders)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        fs::write(&self.path, json).await.map_err(|e| {
            ToolError::ExecutionFailed(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }

    async fn add(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let task = args
            .param_str_opt("task")
            .ok_or_else(|| ToolError::MissingParameter("task is required for 'add'".to_string()))?;

        let _guard = self.lock.lock().await;
        let mut reminders = self.load().await?;
        reminders.push(Reminder {
            task: task.clone(),
            due: args.param_str_opt("due"),
            completed: false,
        });
        self.save(&reminders).await?;

        info!("Reminder added: {}", task);
        Ok(format!("Reminder '{}' added successfully.", task))
    }

    async fn list(&self) -> Result<String, ToolError> {
        let _guard = self.lock.lock().await;
        let reminders = self.load().await?;
        if reminders.is_empty() {
            return Ok("No reminders found.".to_string());
        }

        let incomplete: Vec<&Reminder> = reminders.iter().filter(|r| !r.completed).collect();
        serde_json::to_string_pretty(&incomplete).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

#[async_trait]
impl Tool for RemindersTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "reminders",
            "Manage reminders. Actions: 'add', 'list'. Args: task, due (ISO8601).",
        )
        .param(
            ParamSpec::required("action", ParamType::String, "Action to perform: 'add' or 'list'")
                .one_of(["add", "list"]),
        )
        .param(ParamSpec::optional(
            "task",
            ParamType::String,
            "Task description (required for 'add')",
        ))
        .param(ParamSpec::optional(
            "due",
            ParamType::String,
            "Due date/time ISO8601 (optional for 'add')",
        ))
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolValue, ToolError> {
        let text = match args.param_str("action")?.as_str() {
            "add" => self.add(&args).await?,
            "list" => self.list().await?,
            other => {
                return Err(ToolError::InvalidParameter(format!(
                    "Unknown action '{}'. Use add or list",
                    other
                )))
            }
        };
        Ok(ToolValue::Text(text))
    }
}
