use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::common::{AnalysisId, PostId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "moderation_decision", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl std::fmt::Display for ModerationDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModerationDecision::Approve => write!(f, "approve"),
            ModerationDecision::Reject => write!(f, "reject"),
        }
    }
}

/// What the content analyzer concluded about one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub decision: ModerationDecision,
    /// In [0, 1]
    pub confidence: f64,
    /// Rationale for moderators
    pub analysis: String,
    /// Message addressed to the author
    pub feedback: String,
    pub processing_time_ms: i64,
}

/// Stored verdict for one pending post. At most one per post; a re-analysis
/// overwrites the previous record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    pub pending_post_id: PostId,
    pub decision: ModerationDecision,
    pub confidence: f64,
    pub analysis: String,
    pub feedback: String,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn from_verdict(pending_post_id: PostId, verdict: Verdict) -> Self {
        Self {
            id: AnalysisId::new(),
            pending_post_id,
            decision: verdict.decision,
            confidence: verdict.confidence,
            analysis: verdict.analysis,
            feedback: verdict.feedback,
            processing_time_ms: verdict.processing_time_ms,
            created_at: Utc::now(),
        }
    }

    /// Insert, or supersede the existing record for the same pending post.
    pub async fn upsert(&self, pool: &PgPool) -> Result<Self> {
        let record = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO ai_analyses (id, pending_post_id, decision, confidence, analysis, feedback, processing_time_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (pending_post_id) DO UPDATE
            SET id = EXCLUDED.id,
                decision = EXCLUDED.decision,
                confidence = EXCLUDED.confidence,
                analysis = EXCLUDED.analysis,
                feedback = EXCLUDED.feedback,
                processing_time_ms = EXCLUDED.processing_time_ms,
                created_at = EXCLUDED.created_at
            RETURNING id, pending_post_id, decision, confidence, analysis, feedback, processing_time_ms, created_at
            "#,
        )
        .bind(self.id)
        .bind(self.pending_post_id)
        .bind(self.decision)
        .bind(self.confidence)
        .bind(&self.analysis)
        .bind(&self.feedback)
        .bind(self.processing_time_ms)
        .bind(self.created_at)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    pub async fn find_for_pending_post(pending_post_id: PostId, pool: &PgPool) -> Result<Option<Self>> {
        let record = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, pending_post_id, decision, confidence, analysis, feedback, processing_time_ms, created_at
            FROM ai_analyses
            WHERE pending_post_id = $1
            "#,
        )
        .bind(pending_post_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    pub async fn find_for_pending_posts(ids: &[PostId], pool: &PgPool) -> Result<Vec<Self>> {
        let records = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, pending_post_id, decision, confidence, analysis, feedback, processing_time_ms, created_at
            FROM ai_analyses
            WHERE pending_post_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }
}
