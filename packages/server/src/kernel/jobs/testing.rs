//! Job testing utilities.
//!
//! An in-memory [`JobQueue`] with the same idempotency, retry and
//! dead-letter rules as the Postgres queue. Backoff is zero by default so
//! tests can drain retries immediately.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::job::{ErrorKind, Job, JobStatus};
use super::queue::{ClaimedJob, EnqueueResult, JobQueue, NewJob};

#[derive(Clone, Default)]
pub struct InMemoryJobQueue {
    jobs: Arc<Mutex<Vec<Job>>>,
    exponential_backoff: bool,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule retries with the production backoff instead of immediately.
    pub fn with_backoff(mut self) -> Self {
        self.exponential_backoff = true;
        self
    }

    /// Snapshot of every job, in enqueue order.
    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.clone()
    }

    pub async fn jobs_with_status(&self, status: JobStatus) -> Vec<Job> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|j| j.status == status)
            .cloned()
            .collect()
    }

    pub async fn pending_count(&self) -> usize {
        self.jobs_with_status(JobStatus::Pending).await.len()
    }

    /// Let every running lease lapse, as if its worker had stalled.
    pub async fn expire_leases(&self) {
        let past = Utc::now() - chrono::Duration::seconds(1);
        for job in self.jobs.lock().await.iter_mut() {
            if job.status == JobStatus::Running {
                job.lease_expires_at = Some(past);
            }
        }
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, new_job: NewJob) -> Result<EnqueueResult> {
        let mut jobs = self.jobs.lock().await;

        if let Some(key) = &new_job.idempotency_key {
            let existing = jobs.iter().find(|j| {
                j.idempotency_key.as_deref() == Some(key.as_str())
                    && matches!(j.status, JobStatus::Pending | JobStatus::Running)
            });
            if let Some(existing) = existing {
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let job = new_job.into_job();
        let id = job.id;
        jobs.push(job);
        Ok(EnqueueResult::Created(id))
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;

        let claimed = jobs
            .iter_mut()
            .filter(|j| match j.status {
                JobStatus::Pending => j.next_run_at <= now,
                JobStatus::Running => j.lease_expires_at.is_some_and(|lease| lease < now),
                _ => false,
            })
            .take(limit.max(0) as usize)
            .map(|job| {
                job.status = JobStatus::Running;
                job.worker_id = Some(worker_id.to_string());
                job.lease_expires_at = Some(now + chrono::Duration::minutes(1));
                job.updated_at = now;
                ClaimedJob {
                    id: job.id,
                    job: job.clone(),
                }
            })
            .collect();

        Ok(claimed)
    }

    async fn mark_succeeded(&self, job_id: Uuid, worker_id: &str) -> Result<bool> {
        let mut jobs = self.jobs.lock().await;
        let job = find_mut(&mut jobs, job_id)?;
        if !held_by(job, worker_id) {
            return Ok(false);
        }
        job.status = JobStatus::Succeeded;
        job.lease_expires_at = None;
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        kind: ErrorKind,
    ) -> Result<bool> {
        let backoff = self.exponential_backoff;
        let mut jobs = self.jobs.lock().await;
        let job = find_mut(&mut jobs, job_id)?;
        if !held_by(job, worker_id) {
            return Ok(false);
        }
        let now = Utc::now();

        job.error_message = Some(error.to_string());
        job.error_kind = Some(kind);
        job.lease_expires_at = None;
        job.updated_at = now;

        if kind.should_retry() && job.has_retries_left() {
            job.next_run_at = if backoff {
                now + chrono::Duration::seconds(job.backoff_secs())
            } else {
                now
            };
            job.retry_count += 1;
            job.status = JobStatus::Pending;
            job.worker_id = None;
        } else if kind.should_retry() {
            job.status = JobStatus::DeadLetter;
        } else {
            job.status = JobStatus::Failed;
        }

        Ok(true)
    }

    async fn heartbeat(&self, job_id: Uuid, worker_id: &str) -> Result<bool> {
        let mut jobs = self.jobs.lock().await;
        let job = find_mut(&mut jobs, job_id)?;
        if !held_by(job, worker_id) {
            return Ok(false);
        }
        job.lease_expires_at = Some(Utc::now() + chrono::Duration::minutes(1));
        Ok(true)
    }

    async fn find_by_reference(&self, reference_id: Uuid) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().await;
        let mut found: Vec<Job> = jobs
            .iter()
            .filter(|j| j.reference_id == Some(reference_id))
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }
}

fn held_by(job: &Job, worker_id: &str) -> bool {
    job.status == JobStatus::Running && job.worker_id.as_deref() == Some(worker_id)
}

fn find_mut(jobs: &mut [Job], job_id: Uuid) -> Result<&mut Job> {
    jobs.iter_mut()
        .find(|j| j.id == job_id)
        .ok_or_else(|| anyhow!("job {} not found", job_id))
}
