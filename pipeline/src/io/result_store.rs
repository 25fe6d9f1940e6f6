//! Loading and writing per-iteration result payloads.
//!
//! The agent writes either `result.json` (current schema) or `status.json`
//! (legacy schema). `result.json` always wins when it exists. A malformed
//! `result.json` is an error even if a readable `status.json` sits next to it;
//! only a missing `result.json` falls back to the status file.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::core::types::{AgentResult, LegacyStatus, Source};
use crate::error::{PipelineError, Result};
use crate::io::layout::is_blank;

/// A reconciled result plus the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedResult {
    pub result: AgentResult,
    pub source: Source,
}

/// Load and normalize the result for one iteration.
///
/// Empty or whitespace-only paths are treated like `None`.
#[instrument(skip_all, fields(result = ?result_path, status = ?status_path))]
pub fn load_result(result_path: Option<&Path>, status_path: Option<&Path>) -> Result<LoadedResult> {
    if let Some(path) = usable(result_path) {
        match read_payload::<AgentResult>(path) {
            Ok(Some(result)) => {
                debug!("loaded result file");
                return Ok(LoadedResult {
                    result: result.normalize(),
                    source: Source::Result,
                });
            }
            Ok(None) => debug!("result file absent, trying status file"),
            Err(Payload::Read(source)) => {
                return Err(PipelineError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Err(Payload::Parse(source)) => {
                return Err(PipelineError::ResultInvalid {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }

    let path = usable(status_path).ok_or(PipelineError::ResultMissing)?;
    match read_payload::<LegacyStatus>(path) {
        Ok(Some(status)) => {
            debug!("loaded legacy status file");
            Ok(LoadedResult {
                result: AgentResult::from_status(status),
                source: Source::Status,
            })
        }
        Ok(None) => Err(PipelineError::ResultMissing),
        Err(Payload::Read(source)) => Err(PipelineError::Read {
            path: path.to_path_buf(),
            source,
        }),
        Err(Payload::Parse(source)) => Err(PipelineError::StatusInvalid {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Load, normalize, and write the canonical form back to `result_path`.
///
/// A legacy status file is thereby migrated to `result.json` on first read.
#[instrument(skip_all, fields(result = ?result_path, status = ?status_path))]
pub fn normalize_files(
    result_path: Option<&Path>,
    status_path: Option<&Path>,
) -> Result<LoadedResult> {
    let loaded = load_result(result_path, status_path)?;
    if let Some(path) = usable(result_path) {
        write_result(path, &loaded.result)?;
        debug!(source = %loaded.source, "wrote canonical result");
    }
    Ok(loaded)
}

/// Write `result` in canonical form: pretty JSON, two-space indent, trailing newline.
///
/// Parent directories are created as needed and the file is replaced atomically.
pub fn write_result(path: &Path, result: &AgentResult) -> Result<()> {
    if is_blank(path) {
        return Err(PipelineError::InvalidPath("result"));
    }
    let canonical = result.clone().normalize();
    let mut buf = serde_json::to_string_pretty(&canonical).map_err(|source| {
        PipelineError::Encode {
            what: "result",
            source,
        }
    })?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PipelineError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents).map_err(|source| PipelineError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| {
        if let Err(err) = fs::remove_file(&tmp_path) {
            warn!(path = %tmp_path.display(), error = %err, "could not remove temp result");
        }
        PipelineError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

enum Payload {
    Read(std::io::Error),
    Parse(serde_json::Error),
}

/// Read and parse a JSON file. `Ok(None)` means the file does not exist.
fn read_payload<T: DeserializeOwned>(path: &Path) -> std::result::Result<Option<T>, Payload> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Payload::Read(err)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(Payload::Parse)
}

fn usable(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !is_blank(p))
}
