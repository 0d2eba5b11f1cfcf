//! Final artifact assembly: a single file is handed out directly, several
//! files are zipped.

use crate::error::JobError;
use crate::job::Job;
use crate::registry::{ArtifactRecord, ArtifactRegistry};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

#[derive(Debug, Clone)]
pub struct PackageSpec {
    /// Archive name prefix, `<prefix>_<job_id>.zip`
    pub archive_prefix: String,
    /// Friendly name for the download; defaults to the artifact's file name
    pub download_name: Option<String>,
    /// Archive even a single output (split, page images)
    pub always_archive: bool,
}

impl PackageSpec {
    pub fn new(archive_prefix: impl Into<String>) -> Self {
        Self {
            archive_prefix: archive_prefix.into(),
            download_name: None,
            always_archive: false,
        }
    }

    pub fn download_name(mut self, name: impl Into<String>) -> Self {
        self.download_name = Some(name.into());
        self
    }

    pub fn always_archive(mut self) -> Self {
        self.always_archive = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalArtifact {
    pub artifact_name: String,
    pub path: PathBuf,
    pub download_name: String,
    pub file_count: usize,
}

#[derive(Clone)]
pub struct ResultPackager {
    converted_root: PathBuf,
    registry: ArtifactRegistry,
}

impl ResultPackager {
    pub fn new(converted_root: impl Into<PathBuf>, registry: ArtifactRegistry) -> Self {
        Self {
            converted_root: converted_root.into(),
            registry,
        }
    }

    pub async fn package(
        &self,
        job: &mut Job,
        outputs: &[PathBuf],
        spec: &PackageSpec,
    ) -> Result<FinalArtifact, JobError> {
        let artifact = match outputs {
            [] => {
                return Err(JobError::Validation(
                    "No convertible files were produced".into(),
                ))
            }
            [single] if !spec.always_archive => self.publish_single(job, single, spec).await?,
            _ => self.publish_archive(job, outputs, spec).await?,
        };

        self.registry
            .register(
                artifact.artifact_name.clone(),
                ArtifactRecord {
                    path: artifact.path.clone(),
                    download_name: artifact.download_name.clone(),
                },
            )
            .await;
        job.record_artifact(artifact.artifact_name.clone());

        tracing::info!(
            "Job {} packaged {} file(s) as {}",
            job.id(),
            artifact.file_count,
            artifact.artifact_name
        );
        Ok(artifact)
    }

    /// Move the output to `<converted_root>/<job_id>_<file_name>`
    async fn publish_single(
        &self,
        job: &mut Job,
        output: &Path,
        spec: &PackageSpec,
    ) -> Result<FinalArtifact, JobError> {
        let file_name = file_name_of(output);
        let artifact_name = format!("{}_{}", job.id(), file_name);
        let path = self.converted_root.join(&artifact_name);

        job.own(path.clone());
        if tokio::fs::rename(output, &path).await.is_err() {
            // Different filesystem
            tokio::fs::copy(output, &path).await?;
            tokio::fs::remove_file(output).await?;
        }

        Ok(FinalArtifact {
            artifact_name,
            path,
            download_name: spec.download_name.clone().unwrap_or(file_name),
            file_count: 1,
        })
    }

    /// Zip every output under its base name, in order
    async fn publish_archive(
        &self,
        job: &mut Job,
        outputs: &[PathBuf],
        spec: &PackageSpec,
    ) -> Result<FinalArtifact, JobError> {
        let artifact_name = format!("{}_{}.zip", spec.archive_prefix, job.id());
        let path = self.converted_root.join(&artifact_name);
        job.own(path.clone());

        let archive_path = path.clone();
        let entries = outputs.to_vec();
        tokio::task::spawn_blocking(move || write_archive(&archive_path, &entries))
            .await
            .map_err(|e| JobError::ConversionFailure(format!("Archive task failed: {}", e)))??;

        Ok(FinalArtifact {
            download_name: spec
                .download_name
                .clone()
                .unwrap_or_else(|| artifact_name.clone()),
            artifact_name,
            path,
            file_count: outputs.len(),
        })
    }
}

fn write_archive(path: &Path, entries: &[PathBuf]) -> Result<(), JobError> {
    let file = std::fs::File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for entry in entries {
        let name = file_name_of(entry);
        zip.start_file(name.as_str(), options)
            .map_err(|e| JobError::ConversionFailure(format!("Failed to add {} to archive: {}", name, e)))?;
        zip.write_all(&std::fs::read(entry)?)?;
    }

    zip.finish()
        .map_err(|e| JobError::ConversionFailure(format!("Failed to finalize archive: {}", e)))?;
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}
