//! Session configuration stored at `.pipeline/<session>/config.toml`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::termination::FixedConfig;
use crate::error::{PipelineError, Result};

/// Per-session configuration (TOML).
///
/// Missing fields take defaults, so an absent file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Backend this session runs; the driver refuses a provider with another name.
    pub provider: String,

    /// Model passed through to the provider; `None` uses the provider default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub termination: FixedConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_string(),
            model: None,
            termination: FixedConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.provider.trim().is_empty() {
            return Err(PipelineError::Config("provider must be non-empty".to_string()));
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(PipelineError::Config(
                "model must be non-empty when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: PipelineConfig = toml::from_str(&contents)
        .map_err(|err| PipelineError::Config(format!("parse {}: {err}", path.display())))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg)
        .map_err(|err| PipelineError::Config(format!("serialize config: {err}")))?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        PipelineError::Config(format!("config path missing parent {}", path.display()))
    })?;
    fs::create_dir_all(parent).map_err(|source| PipelineError::Write {
        path: parent.to_path_buf(),
        source,
    })?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents).map_err(|source| PipelineError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| {
        if let Err(err) = fs::remove_file(&tmp_path) {
            warn!(path = %tmp_path.display(), error = %err, "could not remove temp config");
        }
        PipelineError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}
