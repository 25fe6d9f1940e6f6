//! Audit event records (`events.jsonl`).

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed vocabulary of lifecycle event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionComplete,
    NodeStart,
    NodeComplete,
    IterationStart,
    IterationComplete,
    Error,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::SessionStart => "session_start",
            EventType::SessionComplete => "session_complete",
            EventType::NodeStart => "node_start",
            EventType::NodeComplete => "node_complete",
            EventType::IterationStart => "iteration_start",
            EventType::IterationComplete => "iteration_complete",
            EventType::Error => "error",
        }
    }

    /// Parse a wire name back into a type.
    pub fn parse(value: &str) -> Option<Self> {
        [
            EventType::SessionStart,
            EventType::SessionComplete,
            EventType::NodeStart,
            EventType::NodeComplete,
            EventType::IterationStart,
            EventType::IterationComplete,
            EventType::Error,
        ]
        .into_iter()
        .find(|ty| ty.as_str() == value.trim())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position within a session. Empty and zero fields are left out on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cursor {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node_path: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub node_run: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub iteration: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provider: String,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl Cursor {
    pub fn node(node_path: impl Into<String>, node_run: u32, provider: impl Into<String>) -> Self {
        Self {
            node_path: node_path.into(),
            node_run,
            iteration: 0,
            provider: provider.into(),
        }
    }

    /// Copy of this cursor positioned at `iteration`.
    pub fn at_iteration(&self, iteration: u32) -> Self {
        Self {
            iteration,
            ..self.clone()
        }
    }
}

/// One line of the audit log.
///
/// `event_type` stays a string on the wire so logs written by other tools can
/// be read back; [`EventType`] names the values this crate emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "ts", default)]
    pub timestamp: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub session: String,
    #[serde(default)]
    pub cursor: Option<Cursor>,
    #[serde(default, deserialize_with = "null_as_empty_map")]
    pub data: Map<String, Value>,
}

impl Event {
    /// Build an event stamped with the current UTC time.
    pub fn new(
        event_type: EventType,
        session: impl Into<String>,
        cursor: Option<Cursor>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp: now_timestamp(),
            event_type: event_type.as_str().to_string(),
            session: session.into(),
            cursor,
            data,
        }
    }

    pub fn session_start(session: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::new(EventType::SessionStart, session, None, data)
    }

    pub fn session_complete(session: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::new(EventType::SessionComplete, session, None, data)
    }

    pub fn node_start(session: impl Into<String>, cursor: Cursor) -> Self {
        Self::new(EventType::NodeStart, session, Some(cursor), Map::new())
    }

    pub fn node_complete(
        session: impl Into<String>,
        cursor: Cursor,
        data: Map<String, Value>,
    ) -> Self {
        Self::new(EventType::NodeComplete, session, Some(cursor), data)
    }

    pub fn iteration_start(session: impl Into<String>, cursor: Cursor) -> Self {
        Self::new(EventType::IterationStart, session, Some(cursor), Map::new())
    }

    pub fn iteration_complete(
        session: impl Into<String>,
        cursor: Cursor,
        data: Map<String, Value>,
    ) -> Self {
        Self::new(EventType::IterationComplete, session, Some(cursor), data)
    }

    /// Failure record; `cursor` is `None` for session-level failures.
    pub fn error(
        session: impl Into<String>,
        cursor: Option<Cursor>,
        data: Map<String, Value>,
    ) -> Self {
        Self::new(EventType::Error, session, cursor, data)
    }

    /// Known type of this event, if it is part of the vocabulary.
    pub fn kind(&self) -> Option<EventType> {
        EventType::parse(&self.event_type)
    }
}

/// Current UTC time in the audit log's timestamp format (`2026-10-19T08:15:00Z`).
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn null_as_empty_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}
