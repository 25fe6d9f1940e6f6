//! Provider and validator seams.
//!
//! The [`Provider`] trait decouples the session driver from whatever launches
//! the agent binary. Tests use scripted providers that write predetermined
//! payloads without spawning processes. A [`Validator`] screens every request
//! before it reaches a provider.

use std::path::PathBuf;

use crate::error::Result;
use crate::io::layout::IterationPaths;

/// Parameters for one provider invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    /// Prompt text to feed to the agent.
    pub prompt: String,
    /// Model override; `None` uses the provider default.
    pub model: Option<String>,
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Where the agent may write the legacy `status.json`.
    pub status_path: PathBuf,
    /// Where the agent should write `result.json`.
    pub result_path: PathBuf,
}

impl ProviderRequest {
    pub fn for_iteration(
        prompt: &str,
        model: Option<&str>,
        workdir: impl Into<PathBuf>,
        paths: &IterationPaths,
    ) -> Self {
        Self {
            prompt: prompt.to_string(),
            model: model.map(str::to_string),
            workdir: workdir.into(),
            status_path: paths.status_path.clone(),
            result_path: paths.result_path.clone(),
        }
    }
}

/// Agent execution backend.
pub trait Provider {
    /// Canonical provider name, recorded in event cursors.
    fn name(&self) -> &str;

    /// Run the agent once. The agent reports back only through the files named
    /// in `request`.
    fn execute(&self, request: &ProviderRequest) -> Result<()>;
}

/// Screens requests before they reach a provider.
pub trait Validator {
    /// Return `PipelineError::Rejected` to refuse the request.
    fn check(&self, request: &ProviderRequest) -> Result<()>;
}

impl<F> Validator for F
where
    F: Fn(&ProviderRequest) -> Result<()>,
{
    fn check(&self, request: &ProviderRequest) -> Result<()> {
        self(request)
    }
}
