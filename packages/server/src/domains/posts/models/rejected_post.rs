use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};

use crate::common::{PostId, TopicId, UserId};
use crate::domains::posts::models::{Post, PostState};

/// Row in `rejected_posts`.
#[derive(Debug, Clone, FromRow)]
pub struct RejectedPostRow {
    pub id: PostId,
    pub author_id: UserId,
    pub topic_id: TopicId,
    pub parent_post_id: Option<PostId>,
    pub content: String,
    pub moderation_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RejectedPostRow> for Post {
    fn from(row: RejectedPostRow) -> Self {
        Post {
            id: row.id,
            author_id: row.author_id,
            topic_id: row.topic_id,
            parent_post_id: row.parent_post_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            state: PostState::Rejected {
                moderation_reason: row.moderation_reason,
            },
        }
    }
}

const COLUMNS: &str =
    "id, author_id, topic_id, parent_post_id, content, moderation_reason, created_at, updated_at";

impl RejectedPostRow {
    pub async fn insert<'e, E>(post: &Post, executor: E) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        let reason = post
            .moderation_reason()
            .ok_or_else(|| anyhow!("post {} is not in the rejected state", post.id))?;

        sqlx::query(
            r#"
            INSERT INTO rejected_posts (id, author_id, topic_id, parent_post_id, content, moderation_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(post.topic_id)
        .bind(post.parent_post_id)
        .bind(&post.content)
        .bind(reason)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(id: PostId, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLUMNS} FROM rejected_posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    pub async fn list_by_author(author_id: UserId, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLUMNS} FROM rejected_posts WHERE author_id = $1 ORDER BY created_at DESC"
        ))
        .bind(author_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
