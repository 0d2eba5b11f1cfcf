//! Jobs and their owned paths

use crate::config::ServiceConfig;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Convert,
    Merge,
    Split,
    Compress,
    Rotate,
    Watermark,
    Protect,
    Unlock,
    ExportImages,
    ExportJpg,
    ToSpreadsheet,
    Preview,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Convert => "convert",
            JobKind::Merge => "merge",
            JobKind::Split => "split",
            JobKind::Compress => "compress",
            JobKind::Rotate => "rotate",
            JobKind::Watermark => "watermark",
            JobKind::Protect => "protect",
            JobKind::Unlock => "unlock",
            JobKind::ExportImages => "export-images",
            JobKind::ExportJpg => "export-jpg",
            JobKind::ToSpreadsheet => "to-spreadsheet",
            JobKind::Preview => "preview",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Accepted,
    Processing,
    Completed,
    Failed,
}

/// One user-initiated operation. Every path the job creates is recorded
/// here so that retention can remove all of it.
#[derive(Debug)]
pub struct Job {
    id: String,
    kind: JobKind,
    status: JobStatus,
    staging_dir: PathBuf,
    output_dir: PathBuf,
    owned: Vec<PathBuf>,
    artifacts: Vec<String>,
}

impl Job {
    pub fn new(kind: JobKind, config: &ServiceConfig) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            staging_dir: config.upload_root.join(&id),
            output_dir: config.converted_root.join(&id),
            id,
            kind,
            status: JobStatus::Accepted,
            owned: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn set_status(&mut self, status: JobStatus) {
        tracing::debug!("Job {} ({}) -> {:?}", self.id, self.kind, status);
        self.status = status;
    }

    /// `<upload_root>/<job_id>`
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// `<converted_root>/<job_id>`
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the staging and output directories (idempotent) and take
    /// ownership of them.
    pub async fn ensure_dirs(&mut self) -> std::io::Result<()> {
        for dir in [self.staging_dir.clone(), self.output_dir.clone()] {
            tokio::fs::create_dir_all(&dir).await?;
            self.own(dir);
        }
        Ok(())
    }

    /// Record a path as belonging to this job. Order of first insertion is
    /// kept; duplicates are ignored.
    pub fn own(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.owned.contains(&path) {
            self.owned.push(path);
        }
    }

    pub fn owned_paths(&self) -> &[PathBuf] {
        &self.owned
    }

    pub fn record_artifact(&mut self, name: impl Into<String>) {
        self.artifacts.push(name.into());
    }

    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }
}
