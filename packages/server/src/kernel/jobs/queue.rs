//! PostgreSQL-backed job queue implementation.
//!
//! This module provides the core job queue functionality for storing
//! and retrieving jobs from PostgreSQL.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::job::{ErrorKind, Job};

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Command was enqueued, returns new job ID
    Created(Uuid),
    /// Command already exists (idempotency hit), returns existing job ID
    Duplicate(Uuid),
}

impl EnqueueResult {
    /// Get the job ID regardless of whether it was created or duplicate
    pub fn job_id(&self) -> Uuid {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    /// Returns true if this was a newly created job
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

/// A claimed job ready for execution.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    /// The job ID
    pub id: Uuid,
    /// The raw job record
    pub job: Job,
}

impl ClaimedJob {
    /// Deserialize the command payload.
    pub fn deserialize<C: DeserializeOwned>(&self) -> Result<C> {
        serde_json::from_value(self.job.args.clone())
            .map_err(|e| anyhow!("failed to deserialize command: {}", e))
    }

    /// Get the command type (job_type)
    pub fn command_type(&self) -> &str {
        &self.job.job_type
    }
}

/// Metadata for command serialization.
///
/// Commands should implement this trait to provide type information
/// and optional idempotency keys.
pub trait CommandMeta {
    /// The command type name (used as job_type).
    fn command_type(&self) -> &'static str;

    /// Optional idempotency key.
    ///
    /// If provided, ensures only one pending/running job exists with this key.
    fn idempotency_key(&self) -> Option<String> {
        None
    }

    /// Optional reference ID for the job.
    fn reference_id(&self) -> Option<Uuid> {
        None
    }

    /// Maximum retries for this command.
    fn max_retries(&self) -> i32 {
        3
    }
}

/// A serialized command ready to be stored.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub args: serde_json::Value,
    pub reference_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub max_retries: i32,
}

impl NewJob {
    pub fn from_command<C>(command: &C) -> Result<Self>
    where
        C: Serialize + CommandMeta,
    {
        Ok(Self {
            job_type: command.command_type().to_string(),
            args: serde_json::to_value(command)?,
            reference_id: command.reference_id(),
            idempotency_key: command.idempotency_key(),
            max_retries: command.max_retries(),
        })
    }

    pub fn into_job(self) -> Job {
        let mut job = Job::builder()
            .job_type(self.job_type)
            .args(self.args)
            .max_retries(self.max_retries)
            .build();
        job.reference_id = self.reference_id;
        job.idempotency_key = self.idempotency_key;
        job
    }
}

/// Trait for job queue operations.
///
/// Implementations provide the storage and retrieval of serialized Commands
/// for background execution.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a command for immediate execution.
    ///
    /// If the command provides an idempotency key and a matching pending/running
    /// job exists, returns `EnqueueResult::Duplicate` with the existing job ID.
    async fn enqueue(&self, job: NewJob) -> Result<EnqueueResult>;

    /// Claim up to `limit` jobs for processing.
    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>>;

    /// Mark a job as successfully completed.
    ///
    /// Only the worker currently holding the job may finish it. Returns false
    /// when the job is no longer running under `worker_id` (its lease expired
    /// and another worker reclaimed it) and nothing was changed.
    async fn mark_succeeded(&self, job_id: Uuid, worker_id: &str) -> Result<bool>;

    /// Mark a job as failed with an error.
    ///
    /// If retries remain, the job will be re-queued for retry.
    /// Otherwise, it will be moved to dead letter. Same ownership rule as
    /// [`JobQueue::mark_succeeded`].
    async fn mark_failed(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        kind: ErrorKind,
    ) -> Result<bool>;

    /// Extend the lease for a running job (heartbeat). False once the job
    /// belongs to someone else.
    async fn heartbeat(&self, job_id: Uuid, worker_id: &str) -> Result<bool>;

    /// Every job recorded for a reference, newest first.
    async fn find_by_reference(&self, reference_id: Uuid) -> Result<Vec<Job>>;
}

/// Serialize and enqueue a typed command.
pub async fn enqueue_command<C>(queue: &dyn JobQueue, command: &C) -> Result<EnqueueResult>
where
    C: Serialize + CommandMeta,
{
    queue.enqueue(NewJob::from_command(command)?).await
}

/// PostgreSQL-backed job queue implementation.
pub struct PostgresJobQueue {
    pool: PgPool,
    default_lease_ms: i64,
}

impl PostgresJobQueue {
    /// Create a new PostgreSQL job queue.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            default_lease_ms: 60_000, // 1 minute
        }
    }

    /// Create with a custom lease duration.
    pub fn with_lease_duration(pool: PgPool, lease_ms: i64) -> Self {
        Self {
            pool,
            default_lease_ms: lease_ms,
        }
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue(&self, new_job: NewJob) -> Result<EnqueueResult> {
        // Check idempotency first
        if let Some(key) = &new_job.idempotency_key {
            if let Some(existing) = Job::find_active_by_idempotency_key(key, &self.pool).await? {
                debug!(job_id = %existing.id, key = %key, "job already queued");
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let key = new_job.idempotency_key.clone();
        let job = new_job.into_job();

        // The partial unique index catches a concurrent enqueue of the same key
        match job.insert(&self.pool).await {
            Ok(inserted) => {
                info!(job_id = %inserted.id, job_type = %inserted.job_type, "job enqueued");
                Ok(EnqueueResult::Created(inserted.id))
            }
            Err(e) if is_unique_violation(&e) => {
                let key = key.ok_or(e)?;
                let existing = Job::find_active_by_idempotency_key(&key, &self.pool)
                    .await?
                    .ok_or_else(|| anyhow!("job with key {} vanished after conflict", key))?;
                Ok(EnqueueResult::Duplicate(existing.id))
            }
            Err(e) => Err(e),
        }
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>> {
        let jobs = Job::claim_jobs(limit, worker_id, self.default_lease_ms, &self.pool).await?;

        Ok(jobs
            .into_iter()
            .map(|job| ClaimedJob { id: job.id, job })
            .collect())
    }

    async fn mark_succeeded(&self, job_id: Uuid, worker_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND worker_id = $2 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        kind: ErrorKind,
    ) -> Result<bool> {
        let job = Job::find_by_id(job_id, &self.pool)
            .await?
            .ok_or_else(|| anyhow!("job {} not found", job_id))?;

        let updated = if kind.should_retry() && job.has_retries_left() {
            // Schedule retry with exponential backoff
            let retry_at = Utc::now() + chrono::Duration::seconds(job.backoff_secs());

            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'pending',
                    retry_count = retry_count + 1,
                    next_run_at = $1,
                    lease_expires_at = NULL,
                    worker_id = NULL,
                    error_message = $2,
                    error_kind = $3,
                    updated_at = NOW()
                WHERE id = $4 AND worker_id = $5 AND status = 'running'
                "#,
            )
            .bind(retry_at)
            .bind(error)
            .bind(kind)
            .bind(job_id)
            .bind(worker_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                info!(job_id = %job_id, retry_at = %retry_at, "job scheduled for retry");
            }
            result.rows_affected() > 0
        } else {
            // Permanent failures stop here; exhausted retries go to dead letter
            let status = if kind.should_retry() {
                "dead_letter"
            } else {
                "failed"
            };

            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET status = $1::job_status,
                    lease_expires_at = NULL,
                    error_message = $2,
                    error_kind = $3,
                    updated_at = NOW()
                WHERE id = $4 AND worker_id = $5 AND status = 'running'
                "#,
            )
            .bind(status)
            .bind(error)
            .bind(kind)
            .bind(job_id)
            .bind(worker_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                warn!(job_id = %job_id, status, error, "job gave up");
            }
            result.rows_affected() > 0
        };

        Ok(updated)
    }

    async fn heartbeat(&self, job_id: Uuid, worker_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET lease_expires_at = NOW() + ($1 || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id = $2 AND worker_id = $3 AND status = 'running'
            "#,
        )
        .bind(self.default_lease_ms.to_string())
        .bind(job_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_reference(&self, reference_id: Uuid) -> Result<Vec<Job>> {
        Job::find_by_reference(reference_id, &self.pool).await
    }
}

fn is_unique_violation(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        target: Uuid,
    }

    impl CommandMeta for Ping {
        fn command_type(&self) -> &'static str {
            "test:ping"
        }

        fn idempotency_key(&self) -> Option<String> {
            Some(format!("ping:{}", self.target))
        }

        fn reference_id(&self) -> Option<Uuid> {
            Some(self.target)
        }
    }

    #[test]
    fn test_enqueue_result_helpers() {
        let created = EnqueueResult::Created(Uuid::new_v4());
        assert!(created.is_created());

        let duplicate = EnqueueResult::Duplicate(Uuid::new_v4());
        assert!(!duplicate.is_created());
    }

    #[test]
    fn test_new_job_carries_command_meta() {
        let target = Uuid::new_v4();
        let new_job = NewJob::from_command(&Ping { target }).unwrap();

        assert_eq!(new_job.job_type, "test:ping");
        assert_eq!(new_job.reference_id, Some(target));
        assert_eq!(new_job.idempotency_key, Some(format!("ping:{}", target)));

        let claimed = ClaimedJob {
            id: Uuid::new_v4(),
            job: new_job.into_job(),
        };
        assert_eq!(claimed.deserialize::<Ping>().unwrap(), Ping { target });
    }
}
