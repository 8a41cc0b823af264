//! Artifact storage: where the sandbox writes output workbooks.
//!
//! The orchestrator only ever checks existence at a deterministic,
//! task-derived path; artifact content is downstream's business.

use std::path::{Path, PathBuf};

/// Filesystem-like store consulted by the revision loop and the driver
pub trait ArtifactStore: Send + Sync {
    /// Deterministic output location for a task
    fn output_path(&self, task_id: &str) -> PathBuf;

    /// Whether the artifact currently exists in storage
    fn exists(&self, path: &Path) -> bool;
}

/// Store rooted at a local output directory
pub struct FsArtifactStore {
    output_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn output_path(&self, task_id: &str) -> PathBuf {
        self.output_dir.join(format!("{}_output.xlsx", task_id))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
