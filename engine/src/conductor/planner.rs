//! Conductor Planner
//!
//! Asks the LLM to decompose a goal into ordered steps and normalizes the
//! reply into a numbered list. The steps are returned, never executed.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::agent::{Conversation, ModelGateway};
use crate::llm::GatewayError;

/// Ordered steps for one goal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<String>,
}

impl Plan {
    /// Numbered-list rendering (`1. ...`), one step per line
    pub fn render(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Step objects some models emit instead of plain strings
#[derive(Debug, Deserialize)]
struct RawPlanStep {
    #[serde(alias = "step", alias = "title")]
    description: String,
}

pub struct Planner {
    list_item: Regex,
}

impl Planner {
    pub fn new() -> Self {
        Self {
            list_item: Regex::new(r"^\s*(?:(?:step\s*)?\d+\s*[.):\-]|[-*•])\s*(.+)$")
                .expect("Invalid list item pattern"),
        }
    }

    /// Prompt sent to the model for `goal`
    pub fn prompt(&self, goal: &str) -> String {
        format!(
            "You are an expert Strategic Planner.\n\
             The user has a complex goal: \"{}\".\n\n\
             Analyze this goal and break it down into a numbered list of executable steps.\n\
             Focus on facts, logistics, and sequence. Do not execute the steps, just list them.",
            goal
        )
    }

    /// Generate a plan for `goal` through the gateway
    ///
    /// The prompt and the model's reply are appended to `conversation`. An
    /// empty or unusable reply yields the default three-step plan.
    pub async fn create_plan(
        &self,
        gateway: &ModelGateway,
        conversation: &mut Conversation,
        goal: &str,
    ) -> Result<Plan, GatewayError> {
        tracing::info!("Planner received goal: {}", goal);

        let reply = gateway.complete_once(conversation, self.prompt(goal)).await?;
        let steps = self.parse_steps(&reply);

        if steps.is_empty() {
            tracing::warn!("Planner reply had no usable steps, using default plan");
            return Ok(self.default_plan(goal));
        }

        Ok(Plan {
            goal: goal.to_string(),
            steps,
        })
    }

    /// Extract steps from a model reply
    ///
    /// Accepts a JSON array (of strings or `{description}` objects), a
    /// numbered or bulleted list, or failing both, plain non-empty lines.
    pub fn parse_steps(&self, content: &str) -> Vec<String> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        if let Some(steps) = parse_json_steps(trimmed) {
            return steps;
        }

        let items: Vec<String> = trimmed
            .lines()
            .filter_map(|line| self.list_item.captures(line))
            .filter_map(|caps| caps.get(1))
            .map(|m| clean_step(m.as_str()))
            .filter(|s| !s.is_empty())
            .collect();

        if !items.is_empty() {
            return items;
        }

        trimmed
            .lines()
            .map(clean_step)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Deterministic fallback when the model gives nothing usable
    pub fn default_plan(&self, goal: &str) -> Plan {
        Plan {
            goal: goal.to_string(),
            steps: vec![
                format!("Clarify what is needed to achieve: {}", goal),
                "Break the work into scheduled tasks with owners and dates".to_string(),
                "Review progress and confirm the goal is met".to_string(),
            ],
        }
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_json_steps(content: &str) -> Option<Vec<String>> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end <= start {
        return None;
    }

    let items: Vec<Value> = serde_json::from_str(&content[start..=end]).ok()?;
    let steps: Vec<String> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            other => serde_json::from_value::<RawPlanStep>(other)
                .ok()
                .map(|raw| raw.description),
        })
        .map(|s| clean_step(&s))
        .filter(|s| !s.is_empty())
        .collect();

    (!steps.is_empty()).then_some(steps)
}

fn clean_step(step: &str) -> String {
    step.trim().trim_matches('*').trim().to_string()
}
