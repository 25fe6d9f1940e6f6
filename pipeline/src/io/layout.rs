//! On-disk layout of a session under `.pipeline/`.

use std::path::{Path, PathBuf};

/// Canonical paths for one session.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub root: PathBuf,
    pub session_dir: PathBuf,
    pub config_path: PathBuf,
    pub events_path: PathBuf,
    pub iterations_dir: PathBuf,
}

impl SessionPaths {
    pub fn new(root: impl Into<PathBuf>, session: &str) -> Self {
        let root = root.into();
        let session_dir = root.join(".pipeline").join(session);
        Self {
            root,
            config_path: session_dir.join("config.toml"),
            events_path: session_dir.join("events.jsonl"),
            iterations_dir: session_dir.join("iterations"),
            session_dir,
        }
    }

    pub fn iteration(&self, iteration: u32) -> IterationPaths {
        IterationPaths::new(&self.iterations_dir, iteration)
    }
}

/// Where the agent writes its payload for one iteration.
#[derive(Debug, Clone)]
pub struct IterationPaths {
    pub dir: PathBuf,
    pub result_path: PathBuf,
    pub status_path: PathBuf,
}

impl IterationPaths {
    pub fn new(iterations_dir: &Path, iteration: u32) -> Self {
        let dir = iterations_dir.join(format!("{iteration:03}"));
        Self {
            result_path: dir.join("result.json"),
            status_path: dir.join("status.json"),
            dir,
        }
    }
}

/// True for an empty or whitespace-only path.
pub(crate) fn is_blank(path: &Path) -> bool {
    path.to_string_lossy().trim().is_empty()
}
