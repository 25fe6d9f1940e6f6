//! Error taxonomy for the pipeline core.
//!
//! Every fallible operation in the library returns [`PipelineError`]. The CLI
//! wraps these with `anyhow` context at the edge.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Neither the result file nor the status file exists.
    #[error("result missing: no result or status file found")]
    ResultMissing,

    /// The result file exists but does not parse as the result schema.
    #[error("result invalid: {}: {source}", .path.display())]
    ResultInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The status file exists but does not parse as the legacy status schema.
    #[error("status invalid: {}: {source}", .path.display())]
    StatusInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A file exists but could not be read.
    #[error("read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    /// A directory or file could not be written.
    #[error("write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    /// The exclusive file lock could not be acquired.
    #[error("lock {}: {source}", .path.display())]
    Lock { path: PathBuf, source: io::Error },

    /// An append wrote fewer bytes than the encoded event.
    #[error(
        "short write to {}: wrote {written} of {expected} bytes{}",
        .path.display(),
        truncate_note(.truncate)
    )]
    ShortWrite {
        path: PathBuf,
        written: usize,
        expected: usize,
        truncate: Option<io::Error>,
    },

    /// An append failed part-way through the write.
    #[error("append to {}: {source}{}", .path.display(), truncate_note(.truncate))]
    Append {
        path: PathBuf,
        source: io::Error,
        truncate: Option<io::Error>,
    },

    /// An event failed validation before any I/O took place.
    #[error("invalid event: {0}")]
    InvalidEvent(&'static str),

    /// A required path argument was empty.
    #[error("{0} path is empty")]
    InvalidPath(&'static str),

    #[error("encode {what}: {source}")]
    Encode {
        what: &'static str,
        source: serde_json::Error,
    },

    #[error("config: {0}")]
    Config(String),

    /// The provider failed to run for an iteration.
    #[error("provider {name}: {message}")]
    Provider { name: String, message: String },

    /// The validator refused a provider request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl PipelineError {
    /// True when neither input file was available.
    pub fn is_missing_input(&self) -> bool {
        matches!(self, Self::ResultMissing)
    }

    /// True when a result or status file exists but is malformed.
    pub fn is_schema_invalid(&self) -> bool {
        matches!(self, Self::ResultInvalid { .. } | Self::StatusInvalid { .. })
    }
}

fn truncate_note(truncate: &Option<io::Error>) -> String {
    match truncate {
        Some(err) => format!(" (truncate failed: {err})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_missing_message() {
        let err = PipelineError::ResultMissing;
        assert_eq!(
            err.to_string(),
            "result missing: no result or status file found"
        );
        assert!(err.is_missing_input());
        assert!(!err.is_schema_invalid());
    }

    #[test]
    fn schema_errors_name_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err = PipelineError::StatusInvalid {
            path: PathBuf::from("iter/status.json"),
            source,
        };
        assert!(err.to_string().starts_with("status invalid: iter/status.json: "));
        assert!(err.is_schema_invalid());
    }

    #[test]
    fn short_write_reports_failed_truncate() {
        let err = PipelineError::ShortWrite {
            path: PathBuf::from("events.jsonl"),
            written: 3,
            expected: 10,
            truncate: Some(io::Error::other("disk gone")),
        };
        assert_eq!(
            err.to_string(),
            "short write to events.jsonl: wrote 3 of 10 bytes (truncate failed: disk gone)"
        );
    }

    #[test]
    fn append_without_truncate_failure_has_no_note() {
        let err = PipelineError::Append {
            path: PathBuf::from("events.jsonl"),
            source: io::Error::other("no space"),
            truncate: None,
        };
        assert_eq!(err.to_string(), "append to events.jsonl: no space");
    }
}
