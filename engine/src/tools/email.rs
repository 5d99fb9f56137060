//! Email Tool
//!
//! "Sends" email by appending it to an outbox log owned by the tool instance.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use sdk::{ParamSpec, ParamType, Tool, ToolArgs, ToolDescriptor, ToolError, ToolValue};

#[derive(Debug, Deserialize)]
struct EmailArgs {
    to: String,
    subject: String,
    body: String,
}

pub struct EmailTool {
    outbox: PathBuf,
}

impl EmailTool {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
        }
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }
}

#[async_trait]
impl Tool for EmailTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("email", "Draft and send emails.")
            .param(ParamSpec::required(
                "to",
                ParamType::String,
                "Recipient email address",
            ))
            .param(ParamSpec::required("subject", ParamType::String, "Email subject"))
            .param(ParamSpec::required("body", ParamType::String, "Email body content"))
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolValue, ToolError> {
        let email: EmailArgs = args.deserialize()?;
        if !email.to.contains('@') {
            return Err(ToolError::InvalidParameter(format!(
                "'{}' is not an email address",
                email.to
            )));
        }

        if let Some(parent) = self.outbox.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("Failed to create data dir: {}", e)))?;
        }

        let entry = format!(
            "[{}] TO: {} | SUBJECT: {} | BODY: {}\n",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
            email.to,
            email.subject,
            email.body
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.outbox)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to open outbox: {}", e)))?;
        file.write_all(entry.as_bytes())
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to write outbox: {}", e)))?;

        info!("Email queued to {}", email.to);
        Ok(ToolValue::Text(format!("Email sent to {}.", email.to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_send_appends_to_outbox() {
        let dir = TempDir::new().unwrap();
        let tool = EmailTool::new(dir.path().join("email_outbox.log"));

        for subject in ["Hello", "Again"] {
            let args = ToolArgs::parse(
                &json!({"to": "sam@example.com", "subject": subject, "body": "See you"}).to_string(),
            )
            .unwrap();
            let out = tool.execute(args).await.unwrap();
            assert_eq!(out.into_text(), "Email sent to sam@example.com.");
        }

        let log = std::fs::read_to_string(tool.outbox()).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("TO: sam@example.com | SUBJECT: Hello | BODY: See you"));
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let dir = TempDir::new().unwrap();
        let tool = EmailTool::new(dir.path().join("email_outbox.log"));

        let err = tool
            .execute(ToolArgs::parse(r#"{"to": "sam@example.com"}"#).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_argument_error());
        assert!(!tool.outbox().exists());
    }

    #[tokio::test]
    async fn test_bad_address_rejected() {
        let dir = TempDir::new().unwrap();
        let tool = EmailTool::new(dir.path().join("email_outbox.log"));

        let err = tool
            .execute(
                ToolArgs::parse(r#"{"to": "sam", "subject": "s", "body": "b"}"#).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter(_)));
    }
}
