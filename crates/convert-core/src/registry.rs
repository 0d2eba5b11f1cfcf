//! Downloadable artifacts
//!
//! Artifacts are registered when a job finishes and unregistered when
//! retention deletes them. Lookups fall back to the converted root so that
//! files placed there directly still resolve.

use crate::error::JobError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub path: PathBuf,
    /// Name offered to the client in Content-Disposition
    pub download_name: String,
}

#[derive(Clone)]
pub struct ArtifactRegistry {
    converted_root: PathBuf,
    entries: Arc<RwLock<HashMap<String, ArtifactRecord>>>,
}

impl ArtifactRegistry {
    pub fn new(converted_root: impl Into<PathBuf>) -> Self {
        Self {
            converted_root: converted_root.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, name: impl Into<String>, record: ArtifactRecord) {
        let name = name.into();
        tracing::debug!("Registered artifact {} -> {}", name, record.path.display());
        self.entries.write().await.insert(name, record);
    }

    pub async fn unregister(&self, name: &str) {
        self.entries.write().await.remove(name);
    }

    /// Resolve a client-supplied artifact name: registry first, then the
    /// converted root, then its immediate subdirectories. A subdirectory
    /// only serves names scoped to it (containing the directory's job id),
    /// never a job's intermediate outputs.
    pub async fn resolve(&self, name: &str) -> Result<ArtifactRecord, JobError> {
        if !is_safe_name(name) {
            return Err(JobError::ArtifactExpiredOrMissing);
        }

        if let Some(record) = self.entries.read().await.get(name) {
            if record.path.is_file() {
                return Ok(record.clone());
            }
        }

        let direct = self.converted_root.join(name);
        if is_file(&direct).await {
            return Ok(ArtifactRecord {
                path: direct,
                download_name: name.to_string(),
            });
        }

        let mut dirs = match tokio::fs::read_dir(&self.converted_root).await {
            Ok(dirs) => dirs,
            Err(_) => return Err(JobError::ArtifactExpiredOrMissing),
        };
        while let Ok(Some(entry)) = dirs.next_entry().await {
            let job_id = entry.file_name().to_string_lossy().into_owned();
            if !is_scoped_to(name, &job_id) {
                continue;
            }
            let candidate = entry.path().join(name);
            if is_file(&candidate).await {
                return Ok(ArtifactRecord {
                    path: candidate,
                    download_name: name.to_string(),
                });
            }
        }

        Err(JobError::ArtifactExpiredOrMissing)
    }
}

/// A single plain path component
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
        && name != "."
}

/// `<job_id>_<file>` or `<prefix>_<job_id>.<ext>`
fn is_scoped_to(name: &str, job_id: &str) -> bool {
    !job_id.is_empty()
        && (name.starts_with(&format!("{}_", job_id)) || name.contains(&format!("_{}.", job_id)))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
