//! Result payload schemas written by the agent.
//!
//! Two generations exist on disk: the current `result.json` schema
//! ([`AgentResult`]) and the legacy `status.json` schema ([`LegacyStatus`]).
//! Field names and nesting are a compatibility contract with the agent process,
//! so they must not change.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Risk level assumed when the agent does not report one.
pub const DEFAULT_RISK: &str = "low";

/// Canonical per-iteration result snapshot (`result.json`).
///
/// Deserialization accepts absent or `null` fields; [`AgentResult::normalize`]
/// brings the value into canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub work: WorkInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artifacts: ArtifactInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub signals: SignalInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub decision: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub reason: String,
}

/// Work completed by the agent during an iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items_completed: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files_touched: Vec<String>,
}

/// Outputs produced by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub paths: Vec<String>,
}

/// Advisory signals consulted only when no explicit decision is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub plateau_suspected: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risk: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
}

/// Legacy `status.json` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub decision: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub work: WorkInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<String>,
}

/// Which file a reconciled result was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Result,
    Status,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Result => "result",
            Source::Status => "status",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treat an explicit JSON `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_read_as_empty() {
        let raw = r#"{"summary":null,"work":{"items_completed":null},"signals":null,"errors":null}"#;
        let parsed: AgentResult = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed, AgentResult::default());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let raw = r#"{"summary":"s","extra":{"nested":true}}"#;
        let parsed: AgentResult = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.summary, "s");
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let raw = r#"{"work":{"items_completed":"not a list"}}"#;
        assert!(serde_json::from_str::<AgentResult>(raw).is_err());
    }

    /// Decision and reason are dropped from output when empty; lists never are.
    #[test]
    fn serialization_field_order_is_stable() {
        let encoded = serde_json::to_string(&AgentResult::default()).expect("encode");
        assert_eq!(
            encoded,
            concat!(
                r#"{"summary":"","work":{"items_completed":[],"files_touched":[]},"#,
                r#""artifacts":{"outputs":[],"paths":[]},"#,
                r#""signals":{"plateau_suspected":false,"risk":"","notes":""},"errors":[]}"#
            )
        );
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Source::Status).expect("encode"),
            "\"status\""
        );
        assert_eq!(Source::Result.to_string(), "result");
    }
}
