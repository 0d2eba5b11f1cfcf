//! Input validation and staging
//!
//! Every upload of a request is validated before any of them is written,
//! so a rejected batch leaves nothing behind but the job directories.

use crate::error::JobError;
use crate::job::Job;
use crate::sniff::{self, MimeSniffer};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One uploaded file as received from the transport
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Per-endpoint acceptance rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePolicy {
    pub max_bytes: u64,
    pub require_pdf: bool,
}

impl StagePolicy {
    pub fn any(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            require_pdf: false,
        }
    }

    pub fn pdf(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            require_pdf: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub original_name: String,
    /// Lower-case, with the leading dot; empty when the name has none
    pub extension: String,
    pub byte_size: u64,
    pub detected_mime: String,
    pub stored_path: PathBuf,
}

impl StagedFile {
    /// Sanitized stem of the original name
    pub fn stem(&self) -> String {
        sanitize_stem(&self.original_name)
    }
}

pub struct InputStager {
    sniffer: Arc<dyn MimeSniffer>,
}

impl InputStager {
    pub fn new(sniffer: Arc<dyn MimeSniffer>) -> Self {
        Self { sniffer }
    }

    /// Check one upload against `policy`, returning the detected MIME type.
    pub fn validate(&self, upload: &Upload, policy: &StagePolicy) -> Result<String, JobError> {
        if policy.require_pdf && extension_of(&upload.file_name) != ".pdf" {
            return Err(JobError::Validation(format!(
                "'{}' is not a PDF file; only .pdf files are accepted",
                upload.file_name
            )));
        }

        if upload.bytes.len() as u64 > policy.max_bytes {
            return Err(JobError::PayloadTooLarge {
                file_name: upload.file_name.clone(),
                limit: policy.max_bytes,
            });
        }

        let mime = self.sniffer.classify(&upload.bytes);
        if sniff::is_blocked(&mime) {
            tracing::warn!("Rejected '{}' detected as {}", upload.file_name, mime);
            return Err(JobError::UnsafeFileType {
                file_name: upload.file_name.clone(),
                mime,
            });
        }

        if policy.require_pdf && !mime.to_ascii_lowercase().contains("pdf") {
            return Err(JobError::NotAPdf {
                file_name: upload.file_name.clone(),
            });
        }

        Ok(mime)
    }

    /// Validate every upload, then write each to
    /// `<upload_root>/<job_id>/<index>_<stem><ext>`.
    pub async fn stage_all(
        &self,
        job: &mut Job,
        uploads: &[Upload],
        policy: &StagePolicy,
    ) -> Result<Vec<StagedFile>, JobError> {
        if uploads.is_empty() {
            return Err(JobError::Validation("No file was uploaded".into()));
        }

        let mimes = uploads
            .iter()
            .map(|upload| self.validate(upload, policy))
            .collect::<Result<Vec<_>, _>>()?;

        job.ensure_dirs().await?;

        let mut staged = Vec::with_capacity(uploads.len());
        for (index, (upload, mime)) in uploads.iter().zip(mimes).enumerate() {
            let extension = extension_of(&upload.file_name);
            let stored_path = job.staging_dir().join(format!(
                "{}_{}{}",
                index,
                sanitize_stem(&upload.file_name),
                extension
            ));

            job.own(stored_path.clone());
            tokio::fs::write(&stored_path, &upload.bytes).await?;

            staged.push(StagedFile {
                original_name: upload.file_name.clone(),
                extension,
                byte_size: upload.bytes.len() as u64,
                detected_mime: mime,
                stored_path,
            });
        }

        tracing::debug!("Job {} staged {} file(s)", job.id(), staged.len());
        Ok(staged)
    }

    pub async fn stage_one(
        &self,
        job: &mut Job,
        upload: &Upload,
        policy: &StagePolicy,
    ) -> Result<StagedFile, JobError> {
        let mut staged = self
            .stage_all(job, std::slice::from_ref(upload), policy)
            .await?;
        staged
            .pop()
            .ok_or_else(|| JobError::Validation("No file was uploaded".into()))
    }
}

/// Final path component of a client-supplied name, accepting either
/// separator style
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Lower-case extension with its dot, or empty
pub fn extension_of(name: &str) -> String {
    Path::new(base_name(name))
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// File stem reduced to `[A-Za-z0-9._-]`, never empty and never hidden
pub fn sanitize_stem(name: &str) -> String {
    let stem = Path::new(base_name(name))
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("");

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
