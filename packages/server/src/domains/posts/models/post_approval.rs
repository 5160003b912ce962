use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};

use crate::common::{ApprovalId, PostId, UserId};

/// Domain event recorded when a pending post is published.
///
/// Links the identity a submission had while pending to the identity of the
/// published post it became.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PostApproval {
    pub id: ApprovalId,
    pub pending_post_id: PostId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl PostApproval {
    pub fn new(pending_post_id: PostId, post_id: PostId, author_id: UserId) -> Self {
        Self {
            id: ApprovalId::new(),
            pending_post_id,
            post_id,
            author_id,
            created_at: Utc::now(),
        }
    }

    pub async fn insert<'e, E>(&self, executor: E) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO post_approvals (id, pending_post_id, post_id, author_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(self.id)
        .bind(self.pending_post_id)
        .bind(self.post_id)
        .bind(self.author_id)
        .bind(self.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_pending_post(pending_post_id: PostId, pool: &PgPool) -> Result<Option<Self>> {
        let approval = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, pending_post_id, post_id, author_id, created_at
            FROM post_approvals
            WHERE pending_post_id = $1
            "#,
        )
        .bind(pending_post_id)
        .fetch_optional(pool)
        .await?;

        Ok(approval)
    }
}
