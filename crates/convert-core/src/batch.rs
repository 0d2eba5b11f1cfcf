//! Sequential, all-or-nothing conversion of a batch of staged files

use crate::capability::{CapabilityError, CapabilityId, CapabilityOptions, CapabilityRegistry};
use crate::error::JobError;
use crate::job::Job;
use crate::router::{self, Route, TargetFormat};
use crate::stager::StagedFile;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A staged file with its resolved converter
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub source: StagedFile,
    pub capability: CapabilityId,
    pub target: TargetFormat,
}

/// Routed batch, ready to run
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    pub tasks: Vec<ConversionTask>,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// In processing order
    pub outputs: Vec<PathBuf>,
    pub skipped: usize,
}

/// Route every file before anything runs; the first rejection fails the
/// whole batch.
pub fn plan(files: Vec<StagedFile>, target: Option<&str>) -> Result<BatchPlan, JobError> {
    let mut plan = BatchPlan::default();
    for file in files {
        match router::route(&file.extension, target)? {
            Route::Convert { capability, target } => plan.tasks.push(ConversionTask {
                source: file,
                capability,
                target,
            }),
            Route::Skip => {
                tracing::debug!("Skipping '{}': no conversion for {}", file.original_name, file.extension);
                plan.skipped += 1;
            }
        }
    }
    Ok(plan)
}

pub struct BatchOrchestrator {
    capabilities: Arc<CapabilityRegistry>,
    timeout: Duration,
}

impl BatchOrchestrator {
    pub fn new(capabilities: Arc<CapabilityRegistry>, timeout: Duration) -> Self {
        Self {
            capabilities,
            timeout,
        }
    }

    /// Run `plan` in order, writing outputs into the job's output directory.
    /// Stops at the first failure; outputs written so far stay owned by the
    /// job and are removed with it.
    pub async fn run(&self, job: &mut Job, plan: BatchPlan) -> Result<BatchResult, JobError> {
        let mut used_names = HashSet::new();
        let mut outputs = Vec::with_capacity(plan.tasks.len());

        for (index, task) in plan.tasks.iter().enumerate() {
            let file_name = unique_output_name(
                &mut used_names,
                &task.source.stem(),
                task.target.extension(),
                index,
            );
            let output = job.output_dir().join(file_name);
            job.own(output.clone());

            tracing::info!(
                "Job {}: {} '{}'",
                job.id(),
                task.capability,
                task.source.original_name
            );
            self.invoke(
                task.capability,
                &task.source.stored_path,
                &output,
                &CapabilityOptions::new(),
            )
            .await
            .map_err(|e| describe(e, &task.source.original_name))?;

            if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
                return Err(JobError::ConversionFailure(format!(
                    "'{}' produced no output",
                    task.source.original_name
                )));
            }
            outputs.push(output);
        }

        Ok(BatchResult {
            outputs,
            skipped: plan.skipped,
        })
    }

    /// One capability call bounded by the conversion timeout
    pub async fn invoke(
        &self,
        id: CapabilityId,
        input: &Path,
        output: &Path,
        options: &CapabilityOptions,
    ) -> Result<(), JobError> {
        let capability = self.capabilities.get(id);
        match tokio::time::timeout(self.timeout, capability.invoke(input, output, options)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(CapabilityError::Unavailable(reason))) => {
                Err(JobError::ConversionFailure(format!("{} is unavailable: {}", id, reason)))
            }
            Ok(Err(CapabilityError::Failed(cause))) => Err(JobError::ConversionFailure(cause)),
            Err(_) => Err(JobError::ConversionTimeout(self.timeout.as_secs())),
        }
    }
}

/// `<stem><ext>` unless taken, else `<stem>_<index><ext>`, counting the
/// suffix up until the name is free. The chosen name is reserved.
fn unique_output_name(
    used: &mut HashSet<String>,
    stem: &str,
    extension: &str,
    index: usize,
) -> String {
    let mut name = format!("{}{}", stem, extension);
    let mut suffix = index;
    while used.contains(&name) {
        name = format!("{}_{}{}", stem, suffix, extension);
        suffix += 1;
    }
    used.insert(name.clone());
    name
}

/// Prefix a failure with the file it happened on
fn describe(err: JobError, file_name: &str) -> JobError {
    match err {
        JobError::ConversionFailure(cause) => {
            JobError::ConversionFailure(format!("'{}': {}", file_name, cause))
        }
        other => other,
    }
}
