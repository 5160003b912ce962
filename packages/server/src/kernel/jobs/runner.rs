//! Job runner service for processing background jobs.
//!
//! The `JobRunner` is a background service that:
//! - Polls the queue for ready jobs
//! - Deserializes and executes jobs using the registry
//! - Sends heartbeats while a job runs
//! - Handles status updates (succeeded/failed)
//!
//! # Architecture
//!
//! ```text
//! JobRunner
//!     │
//!     ├─► Poll queue (claim jobs via JobQueue)
//!     ├─► Execute via JobRegistry (deserialize + call handler)
//!     └─► Mark succeeded/failed (JobQueue handles retries)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(build_job_registry());
//! let runner = JobRunner::new(deps.job_queue.clone(), registry, deps.clone());
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(runner.run(shutdown.clone()));
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::queue::{ClaimedJob, JobQueue};
use super::registry::{DispatchError, SharedJobRegistry};
use super::ErrorKind;
use crate::common::ForumError;
use crate::kernel::ServerDeps;

/// Configuration for the job runner.
#[derive(Debug, Clone)]
pub struct JobRunnerConfig {
    /// Maximum number of jobs to claim at once
    pub batch_size: i64,
    /// How long to wait when no jobs are available
    pub poll_interval: Duration,
    /// How often to send heartbeats for running jobs
    pub heartbeat_interval: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            worker_id: format!("runner-{}", Uuid::new_v4()),
        }
    }
}

impl JobRunnerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Background service that processes jobs from the queue.
///
/// Retries are handled by the job queue's `mark_failed` implementation.
pub struct JobRunner {
    job_queue: Arc<dyn JobQueue>,
    registry: SharedJobRegistry,
    deps: Arc<ServerDeps>,
    config: JobRunnerConfig,
}

impl JobRunner {
    /// Create a new job runner.
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<ServerDeps>,
    ) -> Self {
        Self::with_config(job_queue, registry, deps, JobRunnerConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(
        job_queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<ServerDeps>,
        config: JobRunnerConfig,
    ) -> Self {
        Self {
            job_queue,
            registry,
            deps,
            config,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Jobs already claimed when shutdown starts are allowed to finish.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "job runner starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let processed = match self.process_batch(&shutdown).await {
                Ok(processed) => processed,
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                    continue;
                }
            };

            if processed == 0 {
                // No jobs available, sleep until next poll
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "job runner stopped");
        Ok(())
    }

    /// Claim and execute a single batch. Returns the number of jobs processed.
    pub async fn run_once(&self) -> Result<usize> {
        self.process_batch(&CancellationToken::new()).await
    }

    async fn process_batch(&self, shutdown: &CancellationToken) -> Result<usize> {
        let jobs = self
            .job_queue
            .claim(&self.config.worker_id, self.config.batch_size)
            .await?;

        if jobs.is_empty() {
            return Ok(0);
        }

        debug!(count = jobs.len(), "claimed jobs");
        let count = jobs.len();

        // Process jobs concurrently
        let handles = jobs.into_iter().map(|job| self.process_job(job, shutdown));
        futures::future::join_all(handles).await;

        Ok(count)
    }

    async fn process_job(&self, job: ClaimedJob, shutdown: &CancellationToken) {
        let job_id = job.id;
        let worker_id = self.config.worker_id.as_str();
        let job_type = job.command_type().to_string();

        debug!(job_id = %job_id, job_type = %job_type, "executing job");

        let result = self.execute_with_heartbeat(job).await;

        match result {
            Ok(()) => {
                info!(job_id = %job_id, job_type = %job_type, "job succeeded");
                match self.job_queue.mark_succeeded(job_id, worker_id).await {
                    Ok(true) => {}
                    Ok(false) => lost_lease(job_id),
                    Err(e) => error!(job_id = %job_id, error = %e, "failed to mark job as succeeded"),
                }
            }
            Err(e) => {
                let error_kind = if shutdown.is_cancelled() {
                    ErrorKind::Shutdown
                } else {
                    classify_error(&e)
                };
                warn!(job_id = %job_id, job_type = %job_type, error = %e, ?error_kind, "job failed");

                match self
                    .job_queue
                    .mark_failed(job_id, worker_id, &e.to_string(), error_kind)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => lost_lease(job_id),
                    Err(mark_err) => {
                        error!(job_id = %job_id, error = %mark_err, "failed to mark job as failed")
                    }
                }
            }
        }
    }

    /// Execute a job on its own task with periodic heartbeats.
    ///
    /// A panicking handler is reported as a failed job.
    async fn execute_with_heartbeat(&self, job: ClaimedJob) -> Result<()> {
        let job_id = job.id;
        let queue = self.job_queue.clone();
        let worker_id = self.config.worker_id.clone();
        let heartbeat_interval = self.config.heartbeat_interval;

        let done = CancellationToken::new();
        let heartbeat_done = done.clone();
        let heartbeat_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat_interval);
            interval.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    _ = heartbeat_done.cancelled() => break,
                    _ = interval.tick() => {
                        match queue.heartbeat(job_id, &worker_id).await {
                            Ok(true) => {}
                            Ok(false) => {
                                lost_lease(job_id);
                                break;
                            }
                            Err(e) => warn!(job_id = %job_id, error = %e, "heartbeat failed"),
                        }
                    }
                }
            }
        });

        let registry = self.registry.clone();
        let deps = self.deps.clone();
        let handle = tokio::spawn(async move { registry.execute(&job, deps).await });

        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(JobPanicked(join_err.to_string()).into()),
        };

        // Stop heartbeat
        done.cancel();
        let _ = heartbeat_handle.await;

        result
    }
}

/// The job was reclaimed by another worker after our lease ran out; its
/// outcome is theirs to record.
fn lost_lease(job_id: Uuid) {
    warn!(job_id = %job_id, "lease lost to another worker, result discarded");
}

#[derive(Debug, thiserror::Error)]
#[error("job panicked: {0}")]
struct JobPanicked(String);

/// Classify an error to determine retry behavior.
///
/// Dispatch failures, panics and domain rejections are permanent. Everything
/// else (database hiccups, timeouts) is retried.
fn classify_error(error: &anyhow::Error) -> ErrorKind {
    if error.downcast_ref::<DispatchError>().is_some() || error.downcast_ref::<JobPanicked>().is_some()
    {
        return ErrorKind::NonRetryable;
    }

    match error.downcast_ref::<ForumError>() {
        Some(ForumError::Internal(_)) | None => ErrorKind::Retryable,
        Some(_) => ErrorKind::NonRetryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = JobRunnerConfig::default();
        assert_eq!(config.batch_size, 10);
        assert!(config.worker_id.starts_with("runner-"));
    }

    #[test]
    fn test_config_with_worker_id() {
        let config = JobRunnerConfig::with_worker_id("my-runner");
        assert_eq!(config.worker_id, "my-runner");
    }

    #[test]
    fn test_classify_error_retryable() {
        let error = anyhow::anyhow!("connection timeout");
        assert_eq!(classify_error(&error), ErrorKind::Retryable);
    }

    #[test]
    fn test_classify_error_unknown_type() {
        let error: anyhow::Error = DispatchError::UnknownJobType("nope".into()).into();
        assert_eq!(classify_error(&error), ErrorKind::NonRetryable);
    }

    #[test]
    fn test_classify_error_domain_rejection() {
        let error: anyhow::Error = ForumError::not_found("post").into();
        assert_eq!(classify_error(&error), ErrorKind::NonRetryable);
    }

    #[test]
    fn test_classify_error_panic() {
        let error: anyhow::Error = JobPanicked("boom".into()).into();
        assert_eq!(classify_error(&error), ErrorKind::NonRetryable);
    }
}
