//! Job model for background command execution.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    DeadLetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "error_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
    /// Job was interrupted by graceful shutdown - will retry
    Shutdown,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable | ErrorKind::Shutdown)
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::now_v7())]
    pub id: Uuid,

    pub job_type: String,
    #[builder(default = serde_json::Value::Object(Default::default()))]
    pub args: serde_json::Value,
    #[builder(default)]
    pub status: JobStatus,

    // What the job is about (e.g. a pending post id), for lookups
    #[builder(default, setter(strip_option))]
    pub reference_id: Option<Uuid>,
    #[builder(default, setter(strip_option))]
    pub idempotency_key: Option<String>,

    // Retries
    #[builder(default = 3)]
    pub max_retries: i32,
    #[builder(default = 0)]
    pub retry_count: i32,
    #[builder(default = Utc::now())]
    pub next_run_at: DateTime<Utc>,

    // Lease management
    #[builder(default, setter(strip_option))]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub worker_id: Option<String>,

    // Error tracking
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,
    #[builder(default, setter(strip_option))]
    pub error_kind: Option<ErrorKind>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

pub(crate) const JOB_COLUMNS: &str = "id, job_type, args, status, reference_id, idempotency_key, \
     max_retries, retry_count, next_run_at, lease_expires_at, worker_id, error_message, \
     error_kind, created_at, updated_at";

impl Job {
    /// Retries left after the current attempt fails.
    pub fn has_retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Seconds to wait before the next attempt: 2^retry_count, capped at an hour.
    pub fn backoff_secs(&self) -> i64 {
        2i64.pow(self.retry_count.clamp(0, 12) as u32).min(3600)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO jobs (id, job_type, args, status, reference_id, idempotency_key,
                              max_retries, retry_count, next_run_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(&self.job_type)
        .bind(&self.args)
        .bind(self.status)
        .bind(self.reference_id)
        .bind(&self.idempotency_key)
        .bind(self.max_retries)
        .bind(self.retry_count)
        .bind(self.next_run_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await?;

        Ok(job)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    /// A pending or running job holding `key`.
    pub async fn find_active_by_idempotency_key(key: &str, pool: &PgPool) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE idempotency_key = $1
              AND status IN ('pending', 'running')
            LIMIT 1
            "#
        ))
        .bind(key)
        .fetch_optional(pool)
        .await?;
        Ok(job)
    }

    /// Newest first.
    pub async fn find_by_reference(reference_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE reference_id = $1 ORDER BY created_at DESC"
        ))
        .bind(reference_id)
        .fetch_all(pool)
        .await?;
        Ok(jobs)
    }

    /// Claim ready jobs, plus running jobs whose lease expired.
    pub async fn claim_jobs(
        limit: i64,
        worker_id: &str,
        lease_duration_ms: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE
                    (status = 'pending' AND next_run_at <= NOW())
                    OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY next_run_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                status = 'running',
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                worker_id = $3,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(limit)
        .bind(lease_duration_ms.to_string())
        .bind(worker_id)
        .fetch_all(pool)
        .await?;

        Ok(jobs)
    }
}
