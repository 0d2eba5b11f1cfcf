//! One method per service operation
//!
//! Every operation follows the same lifecycle: create a job, stage its
//! input, run the conversion, package the result, then hand the job's paths
//! to the retention scheduler (full window on success, immediately on
//! failure).

use crate::batch::{self, BatchOrchestrator};
use crate::capability::{CapabilityId, CapabilityOptions, CapabilityRegistry};
use crate::config::ServiceConfig;
use crate::error::JobError;
use crate::job::{Job, JobKind, JobStatus};
use crate::packager::{FinalArtifact, PackageSpec, ResultPackager};
use crate::registry::{ArtifactRecord, ArtifactRegistry};
use crate::retention::RetentionScheduler;
use crate::sniff::{MagicSniffer, MimeSniffer};
use crate::stager::{InputStager, StagePolicy, StagedFile, Upload};
use base64::{engine::general_purpose::STANDARD, Engine};
use pdf_tools::{CompressionLevel, PdfToolsError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Result of a successful job, rendered as the API response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub message: String,
    pub artifact_name: String,
    pub original_filename: String,
    pub converted_filename: String,
}

impl JobOutcome {
    pub fn download_url(&self) -> String {
        format!("/download/{}", self.artifact_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// `data:image/jpeg;base64,...`
    Thumbnail(String),
    /// The document needs a password
    Locked,
    Failed,
}

pub struct JobService {
    config: Arc<ServiceConfig>,
    stager: InputStager,
    batch: BatchOrchestrator,
    packager: ResultPackager,
    registry: ArtifactRegistry,
    retention: RetentionScheduler,
}

impl JobService {
    /// Service with the magic-number sniffer and the converters named in
    /// `config`.
    pub fn new(config: ServiceConfig) -> Self {
        let capabilities = CapabilityRegistry::from_config(&config.converters);
        Self::with_components(config, Arc::new(MagicSniffer), capabilities)
    }

    pub fn with_components(
        config: ServiceConfig,
        sniffer: Arc<dyn MimeSniffer>,
        capabilities: CapabilityRegistry,
    ) -> Self {
        let registry = ArtifactRegistry::new(&config.converted_root);
        Self {
            stager: InputStager::new(sniffer),
            batch: BatchOrchestrator::new(Arc::new(capabilities), config.conversion_timeout),
            packager: ResultPackager::new(&config.converted_root, registry.clone()),
            retention: RetentionScheduler::new(registry.clone()),
            registry,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn retention(&self) -> &RetentionScheduler {
        &self.retention
    }

    /// Create the upload and converted roots.
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config.upload_root).await?;
        tokio::fs::create_dir_all(&self.config.converted_root).await
    }

    /// Convert a batch of office documents, PDFs and images. All files are
    /// routed before any converter runs.
    pub async fn convert(
        &self,
        uploads: Vec<Upload>,
        target: Option<String>,
    ) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::Convert, &self.config);
        let result = self.run_convert(&mut job, &uploads, target.as_deref()).await;
        self.finish(job, result)
    }

    async fn run_convert(
        &self,
        job: &mut Job,
        uploads: &[Upload],
        target: Option<&str>,
    ) -> Result<JobOutcome, JobError> {
        let staged = self
            .stager
            .stage_all(job, uploads, &StagePolicy::any(self.config.max_file_size))
            .await?;
        let plan = batch::plan(staged, target)?;

        job.set_status(JobStatus::Processing);
        let result = self.batch.run(job, plan).await?;
        if result.outputs.is_empty() {
            return Err(JobError::Validation(
                "None of the uploaded files can be converted".into(),
            ));
        }

        let artifact = self
            .packager
            .package(job, &result.outputs, &PackageSpec::new("converted_batch"))
            .await?;

        Ok(JobOutcome {
            message: format!("{} file(s) converted successfully", artifact.file_count),
            original_filename: format!("{} file(s) processed", uploads.len()),
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    pub async fn merge(&self, uploads: Vec<Upload>) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::Merge, &self.config);
        let result = self.run_merge(&mut job, &uploads).await;
        self.finish(job, result)
    }

    async fn run_merge(&self, job: &mut Job, uploads: &[Upload]) -> Result<JobOutcome, JobError> {
        if uploads.len() < 2 {
            return Err(JobError::Validation(
                "At least two PDF files are required to merge".into(),
            ));
        }

        let staged = self.stager.stage_all(job, uploads, &self.pdf_policy()).await?;
        job.set_status(JobStatus::Processing);

        let inputs: Vec<PathBuf> = staged.iter().map(|f| f.stored_path.clone()).collect();
        let output = job.output_dir().join("merged.pdf");
        job.own(output.clone());
        let target = output.clone();
        self.run_pdf(move || pdf_tools::merge_files(&inputs, &target))
            .await?;

        let artifact = self
            .packager
            .package(job, &[output], &PackageSpec::new("merged"))
            .await?;

        Ok(JobOutcome {
            message: format!("{} PDFs merged successfully", staged.len()),
            original_filename: format!("{} files merged", staged.len()),
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    /// Every page as its own PDF, zipped
    pub async fn split(&self, upload: Upload) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::Split, &self.config);
        let result = self.run_split(&mut job, &upload).await;
        self.finish(job, result)
    }

    async fn run_split(&self, job: &mut Job, upload: &Upload) -> Result<JobOutcome, JobError> {
        let staged = self.stager.stage_one(job, upload, &self.pdf_policy()).await?;
        job.set_status(JobStatus::Processing);

        let stem = staged.stem();
        let input = staged.stored_path.clone();
        let output_dir = job.output_dir().to_path_buf();
        let base_name = stem.clone();
        let pages = self
            .run_blocking(move || pdf_tools::split_into_pages(&input, &output_dir, &base_name))
            .await?;
        for page in &pages {
            job.own(page.clone());
        }

        let spec = PackageSpec::new("split")
            .always_archive()
            .download_name(format!("{}_split.zip", stem));
        let artifact = self.packager.package(job, &pages, &spec).await?;

        Ok(JobOutcome {
            message: format!("PDF split into {} pages", artifact.file_count),
            original_filename: staged.original_name,
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    /// `level` is low, medium or high; medium when absent.
    pub async fn compress(
        &self,
        upload: Upload,
        level: Option<String>,
    ) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::Compress, &self.config);
        let result = self.run_compress(&mut job, &upload, level.as_deref()).await;
        self.finish(job, result)
    }

    async fn run_compress(
        &self,
        job: &mut Job,
        upload: &Upload,
        level: Option<&str>,
    ) -> Result<JobOutcome, JobError> {
        let level = match level.map(str::trim).filter(|l| !l.is_empty()) {
            Some(level) => level.parse::<CompressionLevel>()?,
            None => CompressionLevel::default(),
        };

        let policy = StagePolicy::pdf(self.config.max_compress_size);
        let (staged, artifact) = self
            .transform_pdf(job, upload, policy, "compressed", move |input, output| {
                pdf_tools::compress_file(&input, &output, level)
            })
            .await?;

        let before = staged.byte_size;
        let after = tokio::fs::metadata(&artifact.path).await?.len();
        Ok(JobOutcome {
            message: format!(
                "PDF compressed successfully ({} KB -> {} KB)",
                before / 1024,
                after / 1024
            ),
            original_filename: staged.original_name,
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    pub async fn rotate(&self, upload: Upload, degrees: i64) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::Rotate, &self.config);
        let result = self.run_rotate(&mut job, &upload, degrees).await;
        self.finish(job, result)
    }

    async fn run_rotate(
        &self,
        job: &mut Job,
        upload: &Upload,
        degrees: i64,
    ) -> Result<JobOutcome, JobError> {
        if degrees % 90 != 0 {
            return Err(JobError::Validation(format!(
                "Rotation must be a multiple of 90 degrees, got {}",
                degrees
            )));
        }

        let (staged, artifact) = self
            .transform_pdf(job, upload, self.pdf_policy(), "rotated", move |input, output| {
                pdf_tools::rotate_file(&input, &output, degrees)
            })
            .await?;

        Ok(JobOutcome {
            message: format!("PDF rotated by {} degrees", degrees),
            original_filename: staged.original_name,
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    pub async fn watermark(&self, upload: Upload, text: String) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::Watermark, &self.config);
        let result = self.run_watermark(&mut job, &upload, text).await;
        self.finish(job, result)
    }

    async fn run_watermark(
        &self,
        job: &mut Job,
        upload: &Upload,
        text: String,
    ) -> Result<JobOutcome, JobError> {
        if text.trim().is_empty() {
            return Err(JobError::Validation("Watermark text must not be empty".into()));
        }

        let (staged, artifact) = self
            .transform_pdf(job, upload, self.pdf_policy(), "watermarked", move |input, output| {
                pdf_tools::watermark_file(&input, &output, &text)
            })
            .await?;

        Ok(JobOutcome {
            message: "Watermark added successfully".into(),
            original_filename: staged.original_name,
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    pub async fn protect(&self, upload: Upload, password: String) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::Protect, &self.config);
        let result = self.run_protect(&mut job, &upload, password).await;
        self.finish(job, result)
    }

    async fn run_protect(
        &self,
        job: &mut Job,
        upload: &Upload,
        password: String,
    ) -> Result<JobOutcome, JobError> {
        require_password(&password)?;

        let (staged, artifact) = self
            .transform_pdf(job, upload, self.pdf_policy(), "protected", move |input, output| {
                pdf_tools::encrypt_file(&input, &output, &password)
            })
            .await?;

        Ok(JobOutcome {
            message: "PDF protected with a password".into(),
            original_filename: staged.original_name,
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    pub async fn unlock(&self, upload: Upload, password: String) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::Unlock, &self.config);
        let result = self.run_unlock(&mut job, &upload, password).await;
        self.finish(job, result)
    }

    async fn run_unlock(
        &self,
        job: &mut Job,
        upload: &Upload,
        password: String,
    ) -> Result<JobOutcome, JobError> {
        require_password(&password)?;

        let (staged, artifact) = self
            .transform_pdf(job, upload, self.pdf_policy(), "unlocked", move |input, output| {
                pdf_tools::decrypt_file(&input, &output, &password)
            })
            .await?;

        Ok(JobOutcome {
            message: "PDF password removed".into(),
            original_filename: staged.original_name,
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    /// Page images for the /pdf-to-image endpoint
    pub async fn export_images(&self, upload: Upload) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::ExportImages, &self.config);
        let result = self.run_page_images(&mut job, &upload, "images").await;
        self.finish(job, result)
    }

    /// Page images for the /convert/jpg endpoint
    pub async fn export_jpg(&self, upload: Upload) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::ExportJpg, &self.config);
        let result = self.run_page_images(&mut job, &upload, "jpgs").await;
        self.finish(job, result)
    }

    async fn run_page_images(
        &self,
        job: &mut Job,
        upload: &Upload,
        label: &str,
    ) -> Result<JobOutcome, JobError> {
        let staged = self.stager.stage_one(job, upload, &self.pdf_policy()).await?;
        job.set_status(JobStatus::Processing);

        let stem = staged.stem();
        let pages_dir = job.output_dir().join("pages");
        tokio::fs::create_dir_all(&pages_dir).await?;
        job.own(pages_dir.clone());

        let mut options = CapabilityOptions::new();
        options.insert("base_name".into(), stem.clone());
        self.batch
            .invoke(CapabilityId::PdfToJpg, &staged.stored_path, &pages_dir, &options)
            .await?;

        let images = collect_page_images(&pages_dir).await?;
        if images.is_empty() {
            return Err(JobError::ConversionFailure(
                "No page images were produced".into(),
            ));
        }
        for image in &images {
            job.own(image.clone());
        }

        let spec = PackageSpec::new(label)
            .always_archive()
            .download_name(format!("{}_{}.zip", stem, label));
        let artifact = self.packager.package(job, &images, &spec).await?;

        Ok(JobOutcome {
            message: format!("PDF converted to {} JPG image(s)", artifact.file_count),
            original_filename: staged.original_name,
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    pub async fn to_spreadsheet(&self, upload: Upload) -> Result<JobOutcome, JobError> {
        let mut job = Job::new(JobKind::ToSpreadsheet, &self.config);
        let result = self.run_to_spreadsheet(&mut job, &upload).await;
        self.finish(job, result)
    }

    async fn run_to_spreadsheet(
        &self,
        job: &mut Job,
        upload: &Upload,
    ) -> Result<JobOutcome, JobError> {
        let staged = self.stager.stage_one(job, upload, &self.pdf_policy()).await?;
        job.set_status(JobStatus::Processing);

        let output = job.output_dir().join(format!("{}.xlsx", staged.stem()));
        job.own(output.clone());
        self.batch
            .invoke(
                CapabilityId::PdfToSpreadsheet,
                &staged.stored_path,
                &output,
                &CapabilityOptions::new(),
            )
            .await?;
        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(JobError::ConversionFailure(
                "Spreadsheet converter produced no output".into(),
            ));
        }

        let artifact = self
            .packager
            .package(job, &[output], &PackageSpec::new("spreadsheet"))
            .await?;

        Ok(JobOutcome {
            message: "PDF converted to Excel".into(),
            original_filename: staged.original_name,
            artifact_name: artifact.artifact_name,
            converted_filename: artifact.download_name,
        })
    }

    /// First-page thumbnail. Working files are removed right away.
    pub async fn preview(&self, upload: Upload) -> Result<PreviewOutcome, JobError> {
        let mut job = Job::new(JobKind::Preview, &self.config);
        let result = self.run_preview(&mut job, &upload).await;
        job.set_status(match &result {
            Ok(PreviewOutcome::Thumbnail(_)) => JobStatus::Completed,
            _ => JobStatus::Failed,
        });
        self.retention.schedule_job(&job, Duration::ZERO);
        result
    }

    async fn run_preview(&self, job: &mut Job, upload: &Upload) -> Result<PreviewOutcome, JobError> {
        let staged = self.stager.stage_one(job, upload, &self.pdf_policy()).await?;
        job.set_status(JobStatus::Processing);

        let bytes = upload.bytes.clone();
        match self.run_blocking(move || pdf_tools::is_encrypted(&bytes)).await {
            Ok(true) => return Ok(PreviewOutcome::Locked),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Preview of '{}' failed: {}", staged.original_name, e);
                return Ok(PreviewOutcome::Failed);
            }
        }

        let thumbnail = job.output_dir().join("thumbnail.jpg");
        job.own(thumbnail.clone());
        let rendered = self
            .batch
            .invoke(
                CapabilityId::PdfThumbnail,
                &staged.stored_path,
                &thumbnail,
                &CapabilityOptions::new(),
            )
            .await;
        if let Err(e) = rendered {
            tracing::warn!("Preview of '{}' failed: {}", staged.original_name, e);
            return Ok(PreviewOutcome::Failed);
        }

        match tokio::fs::read(&thumbnail).await {
            Ok(jpeg) => Ok(PreviewOutcome::Thumbnail(format!(
                "data:image/jpeg;base64,{}",
                STANDARD.encode(jpeg)
            ))),
            Err(e) => {
                tracing::warn!("Thumbnail missing for '{}': {}", staged.original_name, e);
                Ok(PreviewOutcome::Failed)
            }
        }
    }

    pub async fn resolve_download(&self, name: &str) -> Result<ArtifactRecord, JobError> {
        self.registry.resolve(name).await
    }

    fn pdf_policy(&self) -> StagePolicy {
        StagePolicy::pdf(self.config.max_file_size)
    }

    /// Stage one PDF, run `op(input, output)` into
    /// `<output_dir>/<stem>_<suffix>.pdf` and package the result.
    async fn transform_pdf<F>(
        &self,
        job: &mut Job,
        upload: &Upload,
        policy: StagePolicy,
        suffix: &str,
        op: F,
    ) -> Result<(StagedFile, FinalArtifact), JobError>
    where
        F: FnOnce(PathBuf, PathBuf) -> Result<(), PdfToolsError> + Send + 'static,
    {
        let staged = self.stager.stage_one(job, upload, &policy).await?;
        job.set_status(JobStatus::Processing);

        let output = job
            .output_dir()
            .join(format!("{}_{}.pdf", staged.stem(), suffix));
        job.own(output.clone());

        let input = staged.stored_path.clone();
        let target = output.clone();
        self.run_pdf(move || op(input, target)).await?;

        let artifact = self
            .packager
            .package(job, &[output], &PackageSpec::new(suffix))
            .await?;
        Ok((staged, artifact))
    }

    async fn run_pdf<F>(&self, op: F) -> Result<(), JobError>
    where
        F: FnOnce() -> Result<(), PdfToolsError> + Send + 'static,
    {
        self.run_blocking(op).await
    }

    /// Run PDF work on a blocking thread, bounded by the conversion timeout
    async fn run_blocking<T, F>(&self, op: F) -> Result<T, JobError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, PdfToolsError> + Send + 'static,
    {
        let timeout = self.config.conversion_timeout;
        match tokio::time::timeout(timeout, tokio::task::spawn_blocking(op)).await {
            Ok(Ok(result)) => result.map_err(JobError::from),
            Ok(Err(e)) => Err(JobError::ConversionFailure(format!("Task join error: {}", e))),
            Err(_) => Err(JobError::ConversionTimeout(timeout.as_secs())),
        }
    }

    /// Hand the job to retention: the full window on success, now on failure.
    fn finish(
        &self,
        mut job: Job,
        result: Result<JobOutcome, JobError>,
    ) -> Result<JobOutcome, JobError> {
        match &result {
            Ok(outcome) => {
                job.set_status(JobStatus::Completed);
                tracing::info!("Job {} ({}) ready: {}", job.id(), job.kind(), outcome.artifact_name);
                self.retention.schedule_job(&job, self.config.retention);
            }
            Err(e) => {
                job.set_status(JobStatus::Failed);
                tracing::warn!("Job {} ({}) failed: {}", job.id(), job.kind(), e);
                self.retention.schedule_job(&job, Duration::ZERO);
            }
        }
        result
    }
}

fn require_password(password: &str) -> Result<(), JobError> {
    if password.is_empty() {
        return Err(JobError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// JPEGs in `dir`, ordered by the page number at the end of their stem
async fn collect_page_images(dir: &Path) -> Result<Vec<PathBuf>, JobError> {
    let mut images = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_jpeg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg"));
        if is_jpeg {
            images.push(path);
        }
    }

    images.sort_by_key(|path| (page_number(path), path.clone()));
    Ok(images)
}

fn page_number(path: &Path) -> u32 {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, CapabilityError};
    use crate::config::DEFAULT_MAX_FILE_SIZE;
    use async_trait::async_trait;
    use pdf_tools::fixtures;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Copies input to output; fails on inputs containing "broken"
    #[derive(Default)]
    struct CopyConverter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Capability for CopyConverter {
        async fn invoke(
            &self,
            input: &Path,
            output: &Path,
            _options: &CapabilityOptions,
        ) -> Result<(), CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if input.to_string_lossy().contains("broken") {
                return Err(CapabilityError::Failed("corrupt document".into()));
            }
            tokio::fs::copy(input, output)
                .await
                .map_err(|e| CapabilityError::Failed(e.to_string()))?;
            Ok(())
        }
    }

    /// Writes three page images named after `base_name`, out of order
    struct FakePageRenderer;

    #[async_trait]
    impl Capability for FakePageRenderer {
        async fn invoke(
            &self,
            _input: &Path,
            output: &Path,
            options: &CapabilityOptions,
        ) -> Result<(), CapabilityError> {
            let base = options.get("base_name").cloned().unwrap_or_default();
            for page in [10, 2, 1] {
                let path = output.join(format!("{}_page-{}.jpg", base, page));
                tokio::fs::write(path, fixtures::jpeg(4, 4)).await.unwrap();
            }
            Ok(())
        }
    }

    struct FakeThumbnail;

    #[async_trait]
    impl Capability for FakeThumbnail {
        async fn invoke(
            &self,
            _input: &Path,
            output: &Path,
            _options: &CapabilityOptions,
        ) -> Result<(), CapabilityError> {
            tokio::fs::write(output, b"\xFF\xD8\xFFthumb").await.unwrap();
            Ok(())
        }
    }

    fn service(root: &Path, converter: Arc<CopyConverter>) -> JobService {
        let config = ServiceConfig::with_roots(root.join("uploads"), root.join("converted"));
        let mut capabilities = CapabilityRegistry::new();
        capabilities.register(CapabilityId::DocumentToPdf, converter.clone());
        capabilities.register(CapabilityId::PdfToSpreadsheet, converter);
        capabilities.register(CapabilityId::PdfToJpg, Arc::new(FakePageRenderer));
        capabilities.register(CapabilityId::PdfThumbnail, Arc::new(FakeThumbnail));
        JobService::with_components(config, Arc::new(MagicSniffer), capabilities)
    }

    fn pdf(name: &str, pages: u32) -> Upload {
        Upload::new(name, fixtures::document(pages, "Doc"))
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_convert_single_document_is_downloadable() {
        let root = tempfile::tempdir().unwrap();
        let converter = Arc::new(CopyConverter::default());
        let service = service(root.path(), converter.clone());

        let outcome = service
            .convert(vec![Upload::new("report.docx", "quarterly numbers")], None)
            .await
            .unwrap();

        assert_eq!(outcome.message, "1 file(s) converted successfully");
        assert_eq!(outcome.original_filename, "1 file(s) processed");
        assert_eq!(outcome.converted_filename, "report.pdf");
        assert_eq!(outcome.download_url(), format!("/download/{}", outcome.artifact_name));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);

        let record = service.resolve_download(&outcome.artifact_name).await.unwrap();
        assert_eq!(std::fs::read(record.path).unwrap(), b"quarterly numbers");
    }

    #[tokio::test]
    async fn test_oversized_upload_never_reaches_a_converter() {
        let root = tempfile::tempdir().unwrap();
        let converter = Arc::new(CopyConverter::default());
        let service = service(root.path(), converter.clone());

        let big = vec![b'a'; (DEFAULT_MAX_FILE_SIZE + 1) as usize];
        let err = service
            .convert(
                vec![Upload::new("small.docx", "ok"), Upload::new("big.docx", big)],
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::PayloadTooLarge { .. }));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
        service.retention().drain().await;
        assert_eq!(entries(&root.path().join("uploads")), 0);
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_nothing_behind() {
        let root = tempfile::tempdir().unwrap();
        let converter = Arc::new(CopyConverter::default());
        let service = service(root.path(), converter.clone());

        let err = service
            .convert(
                vec![
                    Upload::new("first.docx", "one"),
                    Upload::new("broken.docx", "two"),
                    Upload::new("third.docx", "three"),
                ],
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::ConversionFailure(_)));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 2);

        service.retention().drain().await;
        assert_eq!(entries(&root.path().join("uploads")), 0);
        assert_eq!(entries(&root.path().join("converted")), 0);
    }

    #[tokio::test]
    async fn test_pdf_to_pdf_is_reported_as_a_gap() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let err = service
            .convert(vec![pdf("a.pdf", 1)], Some("pdf".into()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_IMPLEMENTED");
    }

    #[tokio::test]
    async fn test_merge_requires_two_files_and_combines_pages() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let err = service.merge(vec![pdf("a.pdf", 1)]).await.unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));

        let outcome = service
            .merge(vec![pdf("a.pdf", 2), pdf("b.pdf", 3)])
            .await
            .unwrap();
        assert_eq!(outcome.converted_filename, "merged.pdf");

        let record = service.resolve_download(&outcome.artifact_name).await.unwrap();
        let merged = std::fs::read(record.path).unwrap();
        assert_eq!(pdf_tools::page_count(&merged).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_merge_rejects_non_pdf_before_staging() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let err = service
            .merge(vec![pdf("a.pdf", 1), Upload::new("b.docx", "text")])
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }

    #[tokio::test]
    async fn test_split_always_archives_pages() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let outcome = service.split(pdf("book.pdf", 3)).await.unwrap();
        assert_eq!(outcome.converted_filename, "book_split.zip");
        assert_eq!(outcome.message, "PDF split into 3 pages");
        assert!(outcome.artifact_name.ends_with(".zip"));
    }

    #[tokio::test]
    async fn test_rotate_names_output_after_input() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let err = service.rotate(pdf("scan.pdf", 1), 45).await.unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));

        let outcome = service.rotate(pdf("scan.pdf", 1), 90).await.unwrap();
        assert_eq!(outcome.converted_filename, "scan_rotated.pdf");
        assert_eq!(outcome.original_filename, "scan.pdf");
    }

    #[tokio::test]
    async fn test_compress_rejects_unknown_level() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let err = service
            .compress(pdf("big.pdf", 1), Some("extreme".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));

        let outcome = service.compress(pdf("big.pdf", 1), None).await.unwrap();
        assert_eq!(outcome.converted_filename, "big_compressed.pdf");
    }

    #[tokio::test]
    async fn test_watermark_requires_text() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let err = service
            .watermark(pdf("a.pdf", 1), "   ".into())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));

        let outcome = service
            .watermark(pdf("a.pdf", 1), "DRAFT".into())
            .await
            .unwrap();
        assert_eq!(outcome.converted_filename, "a_watermarked.pdf");
    }

    #[tokio::test]
    async fn test_protect_then_unlock() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let protected = service
            .protect(pdf("secret.pdf", 2), "hunter2".into())
            .await
            .unwrap();
        let record = service.resolve_download(&protected.artifact_name).await.unwrap();
        let locked = std::fs::read(&record.path).unwrap();
        assert!(pdf_tools::is_encrypted(&locked).unwrap());

        let err = service
            .unlock(Upload::new("secret.pdf", locked.clone()), "wrong".into())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::WrongPassword));

        let unlocked = service
            .unlock(Upload::new("secret.pdf", locked), "hunter2".into())
            .await
            .unwrap();
        let record = service.resolve_download(&unlocked.artifact_name).await.unwrap();
        let plain = std::fs::read(&record.path).unwrap();
        assert!(!pdf_tools::is_encrypted(&plain).unwrap());
        assert_eq!(pdf_tools::page_count(&plain).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unlock_plain_pdf_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let err = service
            .unlock(pdf("open.pdf", 1), "pw".into())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NotEncrypted));

        let err = service.protect(pdf("open.pdf", 1), String::new()).await.unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }

    #[tokio::test]
    async fn test_export_jpg_archives_pages_in_order() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let outcome = service.export_jpg(pdf("deck.pdf", 3)).await.unwrap();
        assert_eq!(outcome.converted_filename, "deck_jpgs.zip");

        let record = service.resolve_download(&outcome.artifact_name).await.unwrap();
        let mut archive = zip::ZipArchive::new(std::fs::File::open(record.path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["deck_page-1.jpg", "deck_page-2.jpg", "deck_page-10.jpg"]
        );
    }

    #[tokio::test]
    async fn test_export_images_uses_its_own_label() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let outcome = service.export_images(pdf("deck.pdf", 1)).await.unwrap();
        assert_eq!(outcome.converted_filename, "deck_images.zip");
        assert!(outcome.artifact_name.starts_with("images_"));
    }

    #[tokio::test]
    async fn test_to_spreadsheet_produces_xlsx() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let outcome = service.to_spreadsheet(pdf("table.pdf", 1)).await.unwrap();
        assert_eq!(outcome.converted_filename, "table.xlsx");
    }

    #[tokio::test]
    async fn test_preview_reports_locked_documents() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let locked = pdf_tools::encrypt_document(&fixtures::document(1, "L"), "pw", None).unwrap();
        let outcome = service
            .preview(Upload::new("locked.pdf", locked))
            .await
            .unwrap();
        assert_eq!(outcome, PreviewOutcome::Locked);

        service.retention().drain().await;
        assert_eq!(entries(&root.path().join("uploads")), 0);
    }

    #[tokio::test]
    async fn test_preview_returns_data_url_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));

        let outcome = service.preview(pdf("cover.pdf", 2)).await.unwrap();
        match outcome {
            PreviewOutcome::Thumbnail(url) => {
                assert!(url.starts_with("data:image/jpeg;base64,"));
                let payload = url.trim_start_matches("data:image/jpeg;base64,");
                assert_eq!(STANDARD.decode(payload).unwrap(), b"\xFF\xD8\xFFthumb");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        service.retention().drain().await;
        assert_eq!(entries(&root.path().join("uploads")), 0);
        assert_eq!(entries(&root.path().join("converted")), 0);
    }

    #[tokio::test]
    async fn test_unknown_download_is_missing() {
        let root = tempfile::tempdir().unwrap();
        let service = service(root.path(), Arc::new(CopyConverter::default()));
        service.prepare().await.unwrap();

        assert!(matches!(
            service.resolve_download("nope.pdf").await,
            Err(JobError::ArtifactExpiredOrMissing)
        ));
    }

    #[test]
    fn test_page_number_reads_trailing_digits() {
        assert_eq!(page_number(Path::new("deck_page-12.jpg")), 12);
        assert_eq!(page_number(Path::new("cover.jpg")), 0);
    }
}
