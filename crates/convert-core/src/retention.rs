//! Deferred, best-effort deletion of job artifacts
//!
//! Each scheduled deletion is its own task with a deadline fixed when it is
//! scheduled. Deletions can be cancelled individually, and on shutdown every
//! pending deletion runs immediately.

use crate::job::Job;
use crate::registry::ArtifactRegistry;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Handle to one scheduled deletion
#[derive(Debug, Clone)]
pub struct RetentionHandle {
    cancel: CancellationToken,
}

impl RetentionHandle {
    /// Abandon the deletion, keeping the files.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
pub struct RetentionScheduler {
    registry: ArtifactRegistry,
    tracker: TaskTracker,
    flush: CancellationToken,
}

impl RetentionScheduler {
    pub fn new(registry: ArtifactRegistry) -> Self {
        Self {
            registry,
            tracker: TaskTracker::new(),
            flush: CancellationToken::new(),
        }
    }

    /// Delete every path the job owns after `delay`, and unregister its
    /// artifacts.
    pub fn schedule_job(&self, job: &Job, delay: Duration) -> RetentionHandle {
        self.schedule(
            job.owned_paths().to_vec(),
            job.artifacts().to_vec(),
            delay,
        )
    }

    pub fn schedule(
        &self,
        paths: Vec<PathBuf>,
        artifacts: Vec<String>,
        delay: Duration,
    ) -> RetentionHandle {
        let deadline = Instant::now() + delay;
        let cancel = CancellationToken::new();
        let handle = RetentionHandle {
            cancel: cancel.clone(),
        };
        let flush = self.flush.clone();
        let registry = self.registry.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Retention cancelled for {} path(s)", paths.len());
                    return;
                }
                _ = flush.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }

            for name in &artifacts {
                registry.unregister(name).await;
            }
            purge(&paths).await;
        });

        handle
    }

    /// Wait for every deletion that is currently scheduled.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Run all pending deletions now and wait for them.
    pub async fn shutdown(&self) {
        tracing::info!("Flushing {} pending deletion(s)", self.tracker.len());
        self.flush.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }
}

/// Remove paths newest first; directories recursively. Missing paths are
/// fine, other failures are only logged.
async fn purge(paths: &[PathBuf]) {
    for path in paths.iter().rev() {
        let result = match tokio::fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
            Ok(_) => tokio::fs::remove_file(path).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tracing::debug!("Deleted {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to delete {}: {}", path.display(), e),
        }
    }
}
