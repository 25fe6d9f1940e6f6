//! Test-only helpers: scripted providers and result builders.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::types::{AgentResult, LegacyStatus};
use crate::error::{PipelineError, Result};
use crate::io::provider::{Provider, ProviderRequest};

/// What a scripted provider does on one call.
#[derive(Debug, Clone)]
pub enum ScriptedPayload {
    /// Write `result.json`.
    Result(AgentResult),
    /// Write the legacy `status.json`.
    Status(LegacyStatus),
    /// Write raw text to `result.json` (useful for malformed payloads).
    RawResult(String),
    /// Write raw text to `status.json`.
    RawStatus(String),
    /// Succeed without writing anything.
    Nothing,
    /// Fail with a provider error.
    Fail(String),
}

/// Provider that replays a fixed script, one payload per call.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<ScriptedPayload>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ScriptedPayload>) -> Self {
        Self::named("scripted", script)
    }

    pub fn named(name: &str, script: Vec<ScriptedPayload>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `execute` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, request: &ProviderRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        let fail = |message: String| PipelineError::Provider {
            name: self.name.clone(),
            message,
        };
        match next.ok_or_else(|| fail("script exhausted".to_string()))? {
            ScriptedPayload::Result(result) => write_json(&request.result_path, &result),
            ScriptedPayload::Status(status) => write_json(&request.status_path, &status),
            ScriptedPayload::RawResult(raw) => write_text(&request.result_path, &raw),
            ScriptedPayload::RawStatus(raw) => write_text(&request.status_path, &raw),
            ScriptedPayload::Nothing => Ok(()),
            ScriptedPayload::Fail(message) => Err(fail(message)),
        }
    }
}

/// Validator that accepts every request.
pub fn accept_all(_request: &ProviderRequest) -> Result<()> {
    Ok(())
}

/// Result whose only populated field is `decision`.
pub fn result_with_decision(decision: &str) -> AgentResult {
    AgentResult {
        decision: decision.to_string(),
        ..AgentResult::default()
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).map_err(|source| PipelineError::Encode {
        what: "scripted payload",
        source,
    })?;
    buf.push('\n');
    write_text(path, &buf)
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PipelineError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })
}
