//! Calendar Tool
//!
//! Lists, adds and deletes events in a calendar store owned by the tool
//! instance. Times are ISO-8601 local date-times.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use sdk::{ParamSpec, ParamType, Tool, ToolArgs, ToolDescriptor, ToolError, ToolValue};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One calendar entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl CalendarEvent {
    fn line(&self) -> String {
        format!(
            "- [{}] {}: {} to {}",
            self.id,
            self.title,
            self.start.format(TIME_FORMAT),
            self.end.format(TIME_FORMAT)
        )
    }
}

/// Event storage with a monotonic id counter
#[derive(Debug, Clone, Default)]
pub struct CalendarStore {
    events: Vec<CalendarEvent>,
    next_id: u64,
}

impl CalendarStore {
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Store pre-loaded with the two demo events
    pub fn seeded() -> Self {
        let mut store = Self::empty();
        for (title, start, end) in [
            ("Weekly Sync", "2025-12-07T09:00:00", "2025-12-07T10:00:00"),
            ("Lunch with Sarah", "2025-12-07T12:00:00", "2025-12-07T13:00:00"),
        ] {
            // Static demo data always parses
            if let (Ok(start), Ok(end)) = (parse_time(start), parse_time(end)) {
                store.insert(title, start, end);
            }
        }
        store
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    /// Add an event and return its id
    pub fn insert(&mut self, title: &str, start: NaiveDateTime, end: NaiveDateTime) -> String {
        let id = format!("evt_{}", self.next_id.max(1));
        self.next_id = self.next_id.max(1) + 1;
        self.events.push(CalendarEvent {
            id: id.clone(),
            title: title.to_string(),
            start,
            end,
        });
        id
    }

    /// Remove an event; false when no event has that id
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        self.events.len() < before
    }
}

/// Parse an ISO-8601 date-time, with or without seconds or a UTC offset
fn parse_time(raw: &str) -> Result<NaiveDateTime, ToolError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|t| t.naive_local()))
        .map_err(|_| {
            ToolError::InvalidParameter(format!(
                "Invalid date format '{}'. Use ISO 8601 (e.g., 2025-12-07T10:00:00)",
                raw
            ))
        })
}

pub struct CalendarTool {
    store: Mutex<CalendarStore>,
}

impl CalendarTool {
    pub fn new(store: CalendarStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Copy of the current events
    pub fn snapshot(&self) -> Vec<CalendarEvent> {
        self.store
            .lock()
            .map(|s| s.events().to_vec())
            .unwrap_or_default()
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut CalendarStore) -> T) -> Result<T, ToolError> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| ToolError::ExecutionFailed("calendar store is unavailable".to_string()))?;
        Ok(f(&mut store))
    }

    fn list(&self) -> Result<String, ToolError> {
        self.with_store(|store| {
            if store.events().is_empty() {
                return "No upcoming events found.".to_string();
            }
            let mut output = String::from("Upcoming Events:");
            for event in store.events() {
                output.push('\n');
                output.push_str(&event.line());
            }
            output
        })
    }

    fn add(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let (Some(title), Some(start)) = (args.param_str_opt("title"), args.param_str_opt("start_time"))
        else {
            return Err(ToolError::MissingParameter(
                "'title' and 'start_time' are required for adding an event".to_string(),
            ));
        };

        let start = parse_time(&start)?;
        let end = match args.param_str_opt("end_time") {
            Some(end) => parse_time(&end)?,
            None => start + Duration::hours(1),
        };
        if end <= start {
            return Err(ToolError::InvalidParameter(
                "'end_time' must be after 'start_time'".to_string(),
            ));
        }

        let id = self.with_store(|store| store.insert(&title, start, end))?;
        info!("Calendar event {} added: {}", id, title);
        Ok(format!("Success: Event '{}' added with ID {}.", title, id))
    }

    fn delete(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let id = args.param_str_opt("event_id").ok_or_else(|| {
            ToolError::MissingParameter("'event_id' is required for deletion".to_string())
        })?;

        if self.with_store(|store| store.remove(&id))? {
            info!("Calendar event {} deleted", id);
            Ok(format!("Success: Event {} deleted.", id))
        } else {
            Err(ToolError::ExecutionFailed(format!("Event ID {} not found", id)))
        }
    }
}

impl Default for CalendarTool {
    fn default() -> Self {
        Self::new(CalendarStore::seeded())
    }
}

#[async_trait]
impl Tool for CalendarTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "calendar_tool",
            "Use this tool to manage the user's calendar. You can list upcoming events, \
             add new events, or delete them. Always check existing events before adding \
             to avoid double-booking.",
        )
        .param(
            ParamSpec::required(
                "action",
                ParamType::String,
                "The action to perform on the calendar.",
            )
            .one_of(["list", "add", "delete"]),
        )
        .param(ParamSpec::optional(
            "title",
            ParamType::String,
            "Title of the event (required for 'add').",
        ))
        .param(ParamSpec::optional(
            "start_time",
            ParamType::String,
            "ISO 8601 start time (e.g., '2025-12-07T10:00:00'). Required for 'add'.",
        ))
        .param(ParamSpec::optional(
            "end_time",
            ParamType::String,
            "ISO 8601 end time. If not provided, defaults to 1 hour after start.",
        ))
        .param(ParamSpec::optional(
            "event_id",
            ParamType::String,
            "The ID of the event to delete (required for 'delete').",
        ))
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolValue, ToolError> {
        let action = args.param_str("action")?;
        let text = match action.as_str() {
            "list" => self.list()?,
            "add" => self.add(&args)?,
            "delete" => self.delete(&args)?,
            other => {
                return Err(ToolError::InvalidParameter(format!(
                    "Unknown action '{}'. Use list, add or delete",
                    other
                )))
            }
        };
        Ok(ToolValue::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: serde_json::Value) -> ToolArgs {
        ToolArgs::parse(&value.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_list_seeded_events() {
        let tool = CalendarTool::default();
        let out = tool
            .execute(args(json!({"action": "list"})))
            .await
            .unwrap()
            .into_text();

        assert_eq!(
            out,
            "Upcoming Events:\n\
             - [evt_1] Weekly Sync: 2025-12-07T09:00:00 to 2025-12-07T10:00:00\n\
             - [evt_2] Lunch with Sarah: 2025-12-07T12:00:00 to 2025-12-07T13:00:00"
        );
    }

    #[tokio::test]
    async fn test_add_defaults_end_to_one_hour() {
        let tool = CalendarTool::default();
        let out = tool
            .execute(args(json!({
                "action": "add",
                "title": "Dentist",
                "start_time": "2025-12-08T14:30:00"
            })))
            .await
            .unwrap()
            .into_text();

        assert_eq!(out, "Success: Event 'Dentist' added with ID evt_3.");
        let added = tool.snapshot().pop().unwrap();
        assert_eq!(added.end.format(TIME_FORMAT).to_string(), "2025-12-08T15:30:00");
    }

    #[tokio::test]
    async fn test_ids_never_reused_after_delete() {
        let tool = CalendarTool::default();
        tool.execute(args(json!({"action": "delete", "event_id": "evt_2"})))
            .await
            .unwrap();

        let out = tool
            .execute(args(json!({
                "action": "add",
                "title": "Gym",
                "start_time": "2025-12-09T07:00"
            })))
            .await
            .unwrap()
            .into_text();
        assert!(out.ends_with("ID evt_3."));
        assert_eq!(tool.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_add_validation() {
        let tool = CalendarTool::new(CalendarStore::empty());

        let missing = tool
            .execute(args(json!({"action": "add", "title": "X"})))
            .await
            .unwrap_err();
        assert!(matches!(missing, ToolError::MissingParameter(_)));

        let bad_date = tool
            .execute(args(json!({"action": "add", "title": "X", "start_time": "tomorrow"})))
            .await
            .unwrap_err();
        assert!(bad_date.to_string().contains("Invalid date format"));

        let backwards = tool
            .execute(args(json!({
                "action": "add",
                "title": "X",
                "start_time": "2025-12-08T10:00:00",
                "end_time": "2025-12-08T09:00:00"
            })))
            .await
            .unwrap_err();
        assert!(backwards.to_string().contains("after"));
        assert!(tool.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_event() {
        let tool = CalendarTool::default();
        let err = tool
            .execute(args(json!({"action": "delete", "event_id": "evt_99"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
        assert!(err.to_string().contains("Event ID evt_99 not found"));
    }

    #[tokio::test]
    async fn test_empty_calendar_and_unknown_action() {
        let tool = CalendarTool::new(CalendarStore::empty());
        let out = tool
            .execute(args(json!({"action": "list"})))
            .await
            .unwrap()
            .into_text();
        assert_eq!(out, "No upcoming events found.");

        assert!(tool.execute(args(json!({"action": "move"}))).await.is_err());
    }

    #[test]
    fn test_parse_time_accepts_offsets() {
        let t = parse_time("2025-12-07T10:00:00+02:00").unwrap();
        assert_eq!(t.format(TIME_FORMAT).to_string(), "2025-12-07T10:00:00");
    }
}
